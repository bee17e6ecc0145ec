// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

//! Action selection for simulation episodes.

use crate::error::{Error, Result};
use crate::jani::{Action, State, Type, Value, Variable};
use crate::rules::SymbolicModel;
use crate::sim::SimRng;
use rand::seq::SliceRandom;
use std::collections::HashMap;

/// Turns a numeric state into the truth values of boolean atoms.
pub trait AtomEncoder {
    fn atoms(&self) -> Vec<&str>;
    fn encode(&self, state: &State) -> Result<HashMap<String, bool>>;
}

/// Picks one of the applicable actions of a state.
pub trait Policy {
    fn act(&mut self, state: &State, applicable: &[&Action]) -> Result<Action>;
}

#[derive(Debug, Clone)]
struct EncodedInput {
    name: String,
    lower: i64,
    /// atom names for the values `lower + 1 ..= upper`
    atoms: Vec<String>,
}

/// One-hot encoding of bounded integer and boolean variables. For the input at interface
/// position `i` with bounds `[lo, hi]`, the atoms `{i}_{v}` with `lo < v <= hi` are created.
/// The atom of the current value is true, all others are false, so the lower bound is
/// encoded by all atoms being false. Constants do not produce atoms.
#[derive(Debug, Clone)]
pub struct BoundedAtomEncoder {
    inputs: Vec<EncodedInput>,
}

impl BoundedAtomEncoder {
    /// `declarations` are the constants and variables of a model, their index is the
    /// position in the interface input list.
    pub fn new(declarations: &[Variable]) -> Result<Self> {
        let mut sorted: Vec<&Variable> = declarations.iter().filter(|v| !v.constant).collect();
        sorted.sort_by_key(|v| v.index);
        let inputs = sorted
            .into_iter()
            .map(|v| {
                let (lower, upper) = integer_bounds(v)?;
                let atoms = (lower + 1..=upper)
                    .map(|value| format!("{}_{}", v.index, value))
                    .collect();
                Ok(EncodedInput {
                    name: v.name.clone(),
                    lower,
                    atoms,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { inputs })
    }
}

fn integer_bounds(v: &Variable) -> Result<(i64, i64)> {
    match v.tpe {
        Type::Bool => Ok((0, 1)),
        Type::Int => match (v.lower_bound, v.upper_bound) {
            (Some(Value::Int(lo)), Some(Value::Int(hi))) => Ok((lo, hi)),
            _ => Err(Error::UnboundedSymbol(v.name.clone())),
        },
        Type::Real => Err(Error::UnsupportedType {
            name: v.name.clone(),
            tpe: v.tpe.to_string(),
        }),
    }
}

impl AtomEncoder for BoundedAtomEncoder {
    fn atoms(&self) -> Vec<&str> {
        self.inputs
            .iter()
            .flat_map(|i| i.atoms.iter().map(|a| a.as_str()))
            .collect()
    }

    fn encode(&self, state: &State) -> Result<HashMap<String, bool>> {
        let mut out = HashMap::new();
        for input in self.inputs.iter() {
            let value = state
                .value(&input.name)
                .ok_or_else(|| Error::UnknownVariable(input.name.clone()))?;
            let value = match value {
                Value::Bool(b) => b as i64,
                Value::Int(i) => i,
                Value::Real(_) => {
                    return Err(Error::TypeMismatch {
                        expr: input.name.clone(),
                        expected: "int or bool",
                    })
                }
            };
            let offset = value - input.lower;
            if offset < 0 || offset > input.atoms.len() as i64 {
                return Err(Error::InvalidValue {
                    name: input.name.clone(),
                    msg: format!("{value} is outside of the encoded range"),
                });
            }
            for (ii, atom) in input.atoms.iter().enumerate() {
                out.insert(atom.clone(), ii as i64 + 1 == offset);
            }
        }
        Ok(out)
    }
}

/// Greedy policy over the class scores of a [`SymbolicModel`]. Class `class_k` stands for
/// the `k`-th interface output.
pub struct RulePolicy<E: AtomEncoder> {
    model: SymbolicModel,
    encoder: E,
    /// ordered by index
    outputs: Vec<Action>,
}

impl<E: AtomEncoder> RulePolicy<E> {
    pub fn new(model: SymbolicModel, encoder: E, outputs: &[Action]) -> Self {
        let mut outputs = outputs.to_vec();
        outputs.sort_by_key(|a| a.index);
        Self {
            model,
            encoder,
            outputs,
        }
    }

    pub fn model(&self) -> &SymbolicModel {
        &self.model
    }

    fn decode(&self, class: &str) -> Result<&Action> {
        class
            .strip_prefix("class_")
            .and_then(|k| k.parse::<usize>().ok())
            .and_then(|k| self.outputs.get(k))
            .ok_or_else(|| Error::UnknownClass(class.to_string()))
    }

    /// Tries classes from the highest to the lowest score and returns the first action that
    /// is applicable. Falls back to the first applicable action.
    pub fn act(&self, state: &State, applicable: &[&Action]) -> Result<Action> {
        let atoms = self.encoder.encode(state)?;
        let forward = self.model.forward(&atoms)?;
        let mut ranked: Vec<(&String, f64)> =
            forward.class_scores.iter().map(|(c, s)| (c, *s)).collect();
        // stable, ties keep the declaration order of the classes
        ranked.sort_by(|(_, a), (_, b)| b.total_cmp(a));
        for (class, _) in ranked {
            let action = self.decode(class)?;
            if applicable.iter().any(|a| *a == action) {
                return Ok(action.clone());
            }
        }
        applicable
            .first()
            .map(|a| (*a).clone())
            .ok_or_else(|| Error::NoApplicableAction(state.to_string()))
    }
}

impl<E: AtomEncoder> Policy for RulePolicy<E> {
    fn act(&mut self, state: &State, applicable: &[&Action]) -> Result<Action> {
        RulePolicy::act(self, state, applicable)
    }
}

/// Picks an applicable action uniformly at random.
pub struct RandomPolicy {
    rng: SimRng,
}

impl RandomPolicy {
    pub fn new(rng: SimRng) -> Self {
        Self { rng }
    }
}

impl Policy for RandomPolicy {
    fn act(&mut self, state: &State, applicable: &[&Action]) -> Result<Action> {
        applicable
            .choose(&mut self.rng)
            .map(|a| (*a).clone())
            .ok_or_else(|| Error::NoApplicableAction(state.to_string()))
    }
}
