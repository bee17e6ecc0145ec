// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::error::{Error, Result};
use crate::jani::{Action, Expr, State, Type, Value};
use crate::SimRng;
use indexmap::IndexMap;
use rand::distributions::{Distribution, WeightedIndex};
use smallvec::SmallVec;

/// Tolerance when checking that the destination probabilities of an edge sum up to one.
pub const PROBABILITY_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub target: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Destination {
    pub assignments: Vec<Assignment>,
    pub probability: f64,
}

impl Destination {
    /// Copies `state` and applies all assignments. Right hand sides are evaluated
    /// against the original `state`, never against partially updated values.
    pub fn apply(&self, state: &State) -> Result<State> {
        let values = self
            .assignments
            .iter()
            .map(|a| a.value.evaluate(state))
            .collect::<Result<SmallVec<[_; 4]>>>()?;
        let mut next = state.clone();
        for (assignment, value) in self.assignments.iter().zip(values) {
            let tpe = state
                .get(&assignment.target)
                .map(|v| v.tpe)
                .ok_or_else(|| Error::UnknownVariable(assignment.target.clone()))?;
            next.set(&assignment.target, assigned_value(assignment, tpe, value)?)?;
        }
        Ok(next)
    }
}

/// Integers widen to reals. Every other mismatch with the declared type of the target is an error.
fn assigned_value(assignment: &Assignment, tpe: Type, value: Value) -> Result<Value> {
    match (tpe, value) {
        (Type::Real, Value::Int(i)) => Ok(Value::Real(i as f64)),
        (tpe, value) if value.tpe() == tpe => Ok(value),
        (tpe, _) => Err(Error::TypeMismatch {
            expr: format!("{} := {}", assignment.target, assignment.value),
            expected: match tpe {
                Type::Int => "int",
                Type::Real => "real",
                Type::Bool => "bool",
            },
        }),
    }
}

/// A guarded probabilistic transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    action: String,
    guard: Expr,
    destinations: Vec<Destination>,
}

impl Edge {
    /// Fails if the destination probabilities do not form a distribution, i.e., if one of them
    /// is negative or not finite or if they do not sum up to one.
    pub fn new(action: String, guard: Expr, destinations: Vec<Destination>) -> Result<Self> {
        let sum: f64 = destinations.iter().map(|d| d.probability).sum();
        let negative = destinations
            .iter()
            .any(|d| !d.probability.is_finite() || d.probability < 0.0);
        if negative || (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(Error::InvalidDistribution { action, sum });
        }
        Ok(Self {
            action,
            guard,
            destinations,
        })
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn guard(&self) -> &Expr {
        &self.guard
    }

    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    pub fn is_enabled(&self, state: &State) -> Result<bool> {
        self.guard.is_true(state)
    }

    /// Returns one successor per destination together with the destination probabilities.
    /// Both are empty if the edge is not enabled.
    pub fn apply(&self, state: &State) -> Result<(Vec<State>, Vec<f64>)> {
        if !self.is_enabled(state)? {
            return Ok((vec![], vec![]));
        }
        let successors = self
            .destinations
            .iter()
            .map(|d| d.apply(state))
            .collect::<Result<Vec<_>>>()?;
        let distribution = self.destinations.iter().map(|d| d.probability).collect();
        Ok((successors, distribution))
    }
}

/// Determines how successors are produced by [`Automaton::transit`].
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum TransitMode {
    /// Draw one successor per enabled edge according to its destination distribution.
    Sample,
    /// Return every destination of every enabled edge.
    Enumerate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Automaton {
    pub name: String,
    /// edges grouped by action label
    edges: IndexMap<String, Vec<Edge>>,
    // location information is parsed but not used by the simulation
    pub locations: Vec<String>,
    pub initial_locations: Vec<String>,
}

impl Automaton {
    pub fn new(name: String, edges: impl IntoIterator<Item = Edge>) -> Self {
        let mut by_action: IndexMap<String, Vec<Edge>> = IndexMap::new();
        for edge in edges {
            by_action.entry(edge.action.clone()).or_default().push(edge);
        }
        Self {
            name,
            edges: by_action,
            locations: vec![],
            initial_locations: vec![],
        }
    }

    pub fn edges(&self, action: &Action) -> Result<&[Edge]> {
        self.edges
            .get(&action.label)
            .map(|e| e.as_slice())
            .ok_or_else(|| Error::UnsupportedAction {
                action: action.label.clone(),
                automaton: self.name.clone(),
            })
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(|e| e.len()).sum()
    }

    /// Whether at least one edge labelled with `action` is enabled in `state`.
    pub fn is_applicable(&self, state: &State, action: &Action) -> Result<bool> {
        match self.edges.get(&action.label) {
            None => Ok(false),
            Some(edges) => {
                for edge in edges {
                    if edge.is_enabled(state)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// Applies `action` to `state`. Every enabled edge contributes its successors: a single
    /// sampled one in [`TransitMode::Sample`], all of them in [`TransitMode::Enumerate`].
    pub fn transit(
        &self,
        state: &State,
        action: &Action,
        mode: TransitMode,
        rng: &mut SimRng,
    ) -> Result<Vec<State>> {
        let mut next_states = Vec::new();
        for edge in self.edges(action)? {
            let (successors, distribution) = edge.apply(state)?;
            if successors.is_empty() {
                continue;
            }
            match mode {
                TransitMode::Enumerate => next_states.extend(successors),
                TransitMode::Sample => {
                    let dist = WeightedIndex::new(&distribution).map_err(|_| {
                        Error::InvalidDistribution {
                            action: action.label.clone(),
                            sum: distribution.iter().sum(),
                        }
                    })?;
                    let pick = dist.sample(rng);
                    next_states.extend(successors.into_iter().nth(pick));
                }
            }
        }
        Ok(next_states)
    }
}
