// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use super::{SimRng, StateGenerator};
use crate::error::{Error, Result};
use crate::jani::{State, Type, Value, Variable};
use rand::seq::SliceRandom;
use rand::Rng;

/// Draws uniformly from a finite pool of states.
#[derive(Debug, Clone)]
pub struct FixedGenerator {
    pool: Vec<State>,
}

impl FixedGenerator {
    /// Every entry of `pool` lists values for some variables, all other variables keep
    /// the initial value from `declarations`. Values for constants are ignored.
    pub fn new(declarations: &[Variable], pool: Vec<Vec<(String, Value)>>) -> Result<Self> {
        if pool.is_empty() {
            return Err(Error::property("the pool of start states is empty"));
        }
        let base = State::new(declarations.iter().cloned());
        let pool = pool
            .into_iter()
            .map(|values| {
                let mut state = base.clone();
                for (name, value) in values {
                    match state.get(&name) {
                        None => return Err(Error::UnknownVariable(name)),
                        Some(v) if v.constant => {}
                        Some(_) => state.set(&name, value)?,
                    }
                }
                Ok(state)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &[State] {
        &self.pool
    }
}

impl StateGenerator for FixedGenerator {
    fn generate(&mut self, rng: &mut SimRng) -> Result<State> {
        self.pool
            .choose(rng)
            .cloned()
            .ok_or_else(|| Error::property("the pool of start states is empty"))
    }
}

/// Samples every variable independently and uniformly within its bounds.
#[derive(Debug, Clone)]
pub struct RandomGenerator {
    declarations: Vec<Variable>,
}

impl RandomGenerator {
    pub fn new(declarations: Vec<Variable>) -> Self {
        Self { declarations }
    }

    /// Draws a value for `variable`. Constants keep their value.
    pub fn sample(variable: &Variable, rng: &mut SimRng) -> Result<Value> {
        if variable.constant {
            return Ok(variable.value);
        }
        if variable.tpe == Type::Bool {
            return Ok(Value::Bool(rng.gen_bool(0.5)));
        }
        let (lo, hi) = match (variable.lower_bound, variable.upper_bound) {
            (Some(lo), Some(hi)) => (lo, hi),
            _ => return Err(Error::UnboundedSymbol(variable.name.clone())),
        };
        let empty = || Error::InvalidValue {
            name: variable.name.clone(),
            msg: format!("empty range [{lo}, {hi}]"),
        };
        match (variable.tpe, lo, hi) {
            (Type::Int, Value::Int(lo), Value::Int(hi)) => {
                if lo > hi {
                    return Err(empty());
                }
                Ok(Value::Int(rng.gen_range(lo..=hi)))
            }
            _ => {
                let (lo, hi) = (lo.to_f64(), hi.to_f64());
                if lo > hi || !lo.is_finite() || !hi.is_finite() {
                    return Err(empty());
                }
                Ok(Value::Real(rng.gen_range(lo..=hi)))
            }
        }
    }
}

impl StateGenerator for RandomGenerator {
    fn generate(&mut self, rng: &mut SimRng) -> Result<State> {
        let variables = self
            .declarations
            .iter()
            .map(|v| Ok(v.with_value(Self::sample(v, rng)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(State::new(variables))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn declarations() -> Vec<Variable> {
        vec![
            Variable::constant("c", 0, Value::Int(7)),
            Variable::bounded(
                "x",
                1,
                Type::Int,
                Value::Int(1),
                Some(Value::Int(-2)),
                Some(Value::Int(2)),
            ),
            Variable::bounded(
                "r",
                2,
                Type::Real,
                Value::Real(0.0),
                Some(Value::Real(0.0)),
                Some(Value::Real(0.5)),
            ),
            Variable::bounded("b", 3, Type::Bool, Value::Bool(false), None, None),
        ]
    }

    #[test]
    fn random_within_bounds() {
        let mut rng = SimRng::seed_from_u64(0);
        let mut gen = RandomGenerator::new(declarations());
        let mut seen_x = [false; 5];
        let mut seen_b = [false; 2];
        for _ in 0..500 {
            let state = gen.generate(&mut rng).unwrap();
            assert_eq!(state.value("c"), Some(Value::Int(7)));
            let Some(Value::Int(x)) = state.value("x") else {
                panic!("x should be an int")
            };
            assert!((-2..=2).contains(&x));
            seen_x[(x + 2) as usize] = true;
            let Some(Value::Real(r)) = state.value("r") else {
                panic!("r should be a real")
            };
            assert!((0.0..=0.5).contains(&r));
            let Some(Value::Bool(b)) = state.value("b") else {
                panic!("b should be a bool")
            };
            seen_b[b as usize] = true;
        }
        // both bounds are inclusive
        assert!(seen_x.iter().all(|s| *s));
        assert!(seen_b.iter().all(|s| *s));
    }

    #[test]
    fn fixed_pool() {
        let pool = vec![
            vec![("x".to_string(), Value::Int(2))],
            vec![
                ("x".to_string(), Value::Int(-1)),
                ("c".to_string(), Value::Int(0)),
            ],
        ];
        let mut gen = FixedGenerator::new(&declarations(), pool).unwrap();
        // omitted variables keep their initial value, constants cannot be overwritten
        assert_eq!(gen.pool()[0].value("r"), Some(Value::Real(0.0)));
        assert_eq!(gen.pool()[1].value("c"), Some(Value::Int(7)));

        let mut rng = SimRng::seed_from_u64(3);
        let mut counts = [0; 2];
        for _ in 0..200 {
            let state = gen.generate(&mut rng).unwrap();
            match state.value("x") {
                Some(Value::Int(2)) => counts[0] += 1,
                Some(Value::Int(-1)) => counts[1] += 1,
                other => panic!("unexpected {other:?}"),
            }
        }
        assert!(counts[0] > 50 && counts[1] > 50, "{counts:?}");

        let unknown = vec![vec![("z".to_string(), Value::Int(0))]];
        assert!(FixedGenerator::new(&declarations(), unknown).is_err());
        assert!(FixedGenerator::new(&declarations(), vec![]).is_err());
    }
}
