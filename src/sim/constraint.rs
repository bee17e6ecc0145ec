// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use super::{RandomGenerator, SimRng, StateGenerator};
use crate::error::{Error, Result};
use crate::jani::{Expr, State, Type, Value, Variable};
use crate::smt::{
    convert_expr, convert_sort, convert_value, escape_smt_identifier, parse_smt_value,
    start_solver, SmtSolverCmd, Z3_CMD,
};
use easy_smt as smt;
use indexmap::IndexMap;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::collections::VecDeque;
use tracing::{debug, trace, warn};

/// Standard deviation of the offsets used for soft diversification.
const GAUSSIAN_SIGMA: f64 = 2.0;

#[derive(Debug, Clone, Copy)]
pub struct ConstraintOptions {
    /// Forbid values that were returned by earlier calls.
    pub block_previous: bool,
    /// Only in combination with `block_previous`: forbid every earlier assignment as a whole,
    /// instead of the earlier values of a single randomly chosen symbol.
    pub block_all: bool,
    /// Number of values remembered per symbol. The oldest value is evicted first.
    pub cache_capacity: usize,
    /// Time limit for a single solver check. A timeout counts as unsatisfiable.
    pub timeout_ms: Option<u64>,
    pub solver: SmtSolverCmd,
    /// If true, the communication with the SMT solver will be logged into a `replay.smt` file.
    pub save_smt_replay: bool,
}

impl Default for ConstraintOptions {
    fn default() -> Self {
        Self {
            block_previous: true,
            block_all: false,
            cache_capacity: 1000,
            timeout_ms: None,
            solver: Z3_CMD,
            save_smt_replay: false,
        }
    }
}

/// Bounded set of values, evicting in insertion order.
#[derive(Debug, Clone)]
struct ValueCache {
    capacity: usize,
    values: VecDeque<Value>,
}

impl ValueCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            values: VecDeque::new(),
        }
    }

    fn insert(&mut self, value: Value) {
        if self.capacity == 0 || self.values.contains(&value) {
            return;
        }
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    fn iter(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }
}

struct Symbol {
    tpe: Type,
    constant: bool,
    cache: ValueCache,
}

/// Samples start states that satisfy a condition. Every call starts a fresh solver,
/// seeded from the model RNG, so that the first solution already depends on the seed.
/// Caches of earlier solutions outlive the solver and drive the diversification.
pub struct ConstraintGenerator {
    opts: ConstraintOptions,
    condition: Expr,
    declarations: Vec<Variable>,
    /// all symbols referenced by the condition
    symbols: IndexMap<String, Symbol>,
    /// earlier assignments, parallel to `symbols`
    history: Vec<Vec<Value>>,
}

impl ConstraintGenerator {
    /// Checks the condition without starting a solver.
    pub fn new(
        condition: &Expr,
        declarations: Vec<Variable>,
        opts: ConstraintOptions,
    ) -> Result<Self> {
        let smt_ctx = smt::ContextBuilder::new().build()?;
        let clause = convert_expr(&smt_ctx, &declarations, condition)?;
        if clause.sort != Type::Bool {
            return Err(Error::TypeMismatch {
                expr: condition.to_string(),
                expected: "bool",
            });
        }

        let mut symbols = IndexMap::with_capacity(clause.symbols.len());
        for name in clause.symbols {
            let variable = declarations
                .iter()
                .find(|v| v.name == name)
                .ok_or_else(|| Error::UnknownVariable(name.clone()))?;
            let symbol = Symbol {
                tpe: variable.tpe,
                constant: variable.constant,
                cache: ValueCache::new(opts.cache_capacity),
            };
            symbols.insert(name, symbol);
        }
        debug!(
            "start condition `{condition}` references {} symbols",
            symbols.len()
        );

        Ok(Self {
            opts,
            condition: condition.clone(),
            declarations,
            symbols,
            history: vec![],
        })
    }

    /// Launches a solver, reseeds it and asserts the condition together with all bounds.
    fn start(&self, rng: &mut SimRng) -> Result<smt::Context> {
        let opts = &self.opts;
        let mut smt_ctx = start_solver(&opts.solver, opts.timeout_ms, opts.save_smt_replay)?;
        if let Some(option) = opts.solver.seed_option {
            let seed: u32 = rng.gen_range(0..(1 << 31));
            trace!("solver seed: {seed}");
            let value = smt_ctx.atom(seed.to_string());
            smt_ctx.set_option(option, value)?;
        }
        let clause = convert_expr(&smt_ctx, &self.declarations, &self.condition)?;
        for (name, symbol) in self.symbols.iter() {
            let sort = convert_sort(&smt_ctx, symbol.tpe);
            smt_ctx.declare_const(escape_smt_identifier(name).into_owned(), sort)?;
        }
        smt_ctx.assert(clause.term)?;
        for side_condition in clause.side_conditions {
            smt_ctx.assert(side_condition)?;
        }
        Ok(smt_ctx)
    }

    fn symbol_expr(smt_ctx: &smt::Context, name: &str) -> smt::SExpr {
        smt_ctx.atom(escape_smt_identifier(name))
    }

    /// Values of all symbols in the current model.
    fn model(&self, smt_ctx: &mut smt::Context) -> Result<Vec<Value>> {
        if self.symbols.is_empty() {
            return Ok(vec![]);
        }
        let exprs = self
            .symbols
            .keys()
            .map(|name| Self::symbol_expr(smt_ctx, name))
            .collect();
        let values = smt_ctx.get_value(exprs)?;
        let smt_ctx = &*smt_ctx;
        self.symbols
            .iter()
            .zip(values)
            .map(|((name, symbol), (_, value))| {
                parse_smt_value(smt_ctx, value, symbol.tpe).ok_or_else(|| Error::SolverValue {
                    name: name.clone(),
                    value: smt_ctx.display(value).to_string(),
                })
            })
            .collect()
    }

    /// Indices of the symbols that may be diversified. Constants are pinned.
    fn free_symbols(&self) -> Vec<usize> {
        self.symbols
            .values()
            .enumerate()
            .filter(|(_, s)| !s.constant)
            .map(|(i, _)| i)
            .collect()
    }

    /// Constraints that push the next solution away from earlier ones. An empty result
    /// means that the current solution can be returned as is.
    fn diversification(
        &self,
        ctx: &smt::Context,
        current: &[Value],
        rng: &mut SimRng,
    ) -> Result<Vec<smt::SExpr>> {
        let free = self.free_symbols();
        let differs = |name: &str, value: Value| -> Result<smt::SExpr> {
            let value = convert_value(ctx, value)?;
            Ok(ctx.not(ctx.eq(Self::symbol_expr(ctx, name), value)))
        };
        if self.opts.block_previous && !self.opts.block_all {
            let Some(&pick) = free.choose(rng) else {
                return Ok(vec![]);
            };
            let Some((name, symbol)) = self.symbols.get_index(pick) else {
                return Ok(vec![]);
            };
            trace!("blocking earlier values of `{name}`");
            symbol.cache.iter().map(|v| differs(name, *v)).collect()
        } else if self.opts.block_previous {
            trace!("blocking {} earlier assignments", self.history.len());
            self.history
                .iter()
                .map(|prior| {
                    let diffs = free
                        .iter()
                        .filter_map(|&i| self.symbols.get_index(i).map(|(n, _)| (n, prior[i])))
                        .map(|(n, v)| differs(n, v))
                        .collect::<Result<Vec<_>>>()?;
                    Ok(any(ctx, diffs))
                })
                .collect()
        } else {
            let mut targets = vec![];
            for &i in free.iter() {
                let Some((name, symbol)) = self.symbols.get_index(i) else {
                    continue;
                };
                if symbol.tpe == Type::Bool {
                    continue;
                }
                let normal = Normal::new(current[i].to_f64(), GAUSSIAN_SIGMA).map_err(|e| {
                    Error::InvalidValue {
                        name: name.clone(),
                        msg: e.to_string(),
                    }
                })?;
                let r = normal.sample(rng);
                let target = if symbol.tpe == Type::Int {
                    Value::Int(r.round() as i64)
                } else {
                    Value::Real(r)
                };
                trace!("soft target {name} = {target}");
                let target = convert_value(ctx, target)?;
                targets.push(ctx.eq(Self::symbol_expr(ctx, name), target));
            }
            if targets.is_empty() {
                Ok(vec![])
            } else {
                Ok(vec![any(ctx, targets)])
            }
        }
    }

    /// Solves under additional constraints. Returns `None` if no solution was found in time.
    fn solve_under(
        &self,
        smt_ctx: &mut smt::Context,
        constraints: Vec<smt::SExpr>,
    ) -> Result<Option<Vec<Value>>> {
        for constraint in constraints {
            smt_ctx.assert(constraint)?;
        }
        match smt_ctx.check()? {
            smt::Response::Sat => Ok(Some(self.model(smt_ctx)?)),
            smt::Response::Unsat | smt::Response::Unknown => Ok(None),
        }
    }

    fn record(&mut self, values: &[Value]) {
        if self.opts.block_previous {
            for (symbol, value) in self.symbols.values_mut().zip(values) {
                if !symbol.constant {
                    symbol.cache.insert(*value);
                }
            }
        }
        if self.opts.block_all {
            self.history.push(values.to_vec());
        }
    }

    fn build_state(&self, values: &[Value], rng: &mut SimRng) -> Result<State> {
        let variables = self
            .declarations
            .iter()
            .map(|v| {
                let value = match self.symbols.get_index_of(&v.name) {
                    Some(i) if !v.constant => values[i],
                    // unconstrained variables are sampled
                    _ => RandomGenerator::sample(v, rng)?,
                };
                Ok(v.with_value(value))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(State::new(variables))
    }
}

impl StateGenerator for ConstraintGenerator {
    fn generate(&mut self, rng: &mut SimRng) -> Result<State> {
        let mut smt_ctx = self.start(rng)?;
        let backup = match smt_ctx.check()? {
            smt::Response::Sat => self.model(&mut smt_ctx)?,
            smt::Response::Unsat => return Err(Error::InfeasibleStart("unsat")),
            smt::Response::Unknown => return Err(Error::InfeasibleStart("unknown")),
        };
        let constraints = self.diversification(&smt_ctx, &backup, rng)?;
        let next = if constraints.is_empty() {
            Some(backup.clone())
        } else {
            self.solve_under(&mut smt_ctx, constraints)?
        };
        let values = match next {
            Some(values) => {
                self.record(&values);
                values
            }
            None => {
                warn!("no diversified start state found, falling back to the first solution");
                backup
            }
        };
        self.build_state(&values, rng)
    }
}

/// Disjunction that also handles the degenerate cases.
fn any(ctx: &smt::Context, mut items: Vec<smt::SExpr>) -> smt::SExpr {
    match items.len() {
        0 => ctx.false_(),
        1 => items.remove(0),
        _ => ctx.or_many(items),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use serde_json::json;

    fn declarations() -> Vec<Variable> {
        vec![
            Variable::constant("N", 0, Value::Int(2)),
            Variable::bounded(
                "x",
                1,
                Type::Int,
                Value::Int(0),
                Some(Value::Int(0)),
                Some(Value::Int(3)),
            ),
            Variable::bounded("b", 2, Type::Bool, Value::Bool(false), None, None),
            Variable::bounded(
                "y",
                3,
                Type::Int,
                Value::Int(0),
                Some(Value::Int(-5)),
                Some(Value::Int(5)),
            ),
        ]
    }

    fn generator(condition: serde_json::Value, opts: ConstraintOptions) -> ConstraintGenerator {
        let condition = Expr::from_json(&condition).unwrap();
        ConstraintGenerator::new(&condition, declarations(), opts).unwrap()
    }

    /// Diversification constraints as they would be sent to the solver.
    fn constraints(gen: &ConstraintGenerator, current: &[Value], rng: &mut SimRng) -> String {
        let ctx = smt::ContextBuilder::new().build().unwrap();
        gen.diversification(&ctx, current, rng)
            .unwrap()
            .into_iter()
            .map(|c| ctx.display(c).to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn mixed_condition() -> serde_json::Value {
        json!({"op": "∧",
            "left": {"op": "<", "left": "x", "right": "N"},
            "right": {"op": "∨", "left": "b", "right": {"op": "<", "left": "y", "right": 0}}
        })
    }

    #[test]
    fn block_previous_values() {
        let x_at_most_one = json!({"op": "≤", "left": "x", "right": {"op": "-", "left": "N", "right": 1}});
        let mut gen = generator(x_at_most_one, ConstraintOptions::default());
        assert_eq!(gen.symbols.keys().collect::<Vec<_>>(), ["x", "N"]);
        let mut rng = SimRng::seed_from_u64(1);

        // nothing to block yet, the first solution is returned as is
        assert_eq!(constraints(&gen, &[Value::Int(0), Value::Int(2)], &mut rng), "");

        gen.record(&[Value::Int(0), Value::Int(2)]);
        insta::assert_snapshot!(
            constraints(&gen, &[Value::Int(0), Value::Int(2)], &mut rng),
            @"(not (= x 0))"
        );
        // the constant is never blocked
        gen.record(&[Value::Int(1), Value::Int(2)]);
        insta::assert_snapshot!(
            constraints(&gen, &[Value::Int(1), Value::Int(2)], &mut rng),
            @r###"
        (not (= x 0))
        (not (= x 1))
        "###
        );
        assert!(gen.history.is_empty());
    }

    #[test]
    fn block_all_assignments() {
        let opts = ConstraintOptions {
            block_all: true,
            ..Default::default()
        };
        let mut gen = generator(mixed_condition(), opts);
        assert_eq!(gen.symbols.keys().collect::<Vec<_>>(), ["x", "N", "b", "y"]);
        let mut rng = SimRng::seed_from_u64(2);
        let first = [Value::Int(0), Value::Int(2), Value::Bool(true), Value::Int(-1)];
        let second = [Value::Int(1), Value::Int(2), Value::Bool(false), Value::Int(3)];

        assert_eq!(constraints(&gen, &first, &mut rng), "");
        gen.record(&first);
        gen.record(&second);
        insta::assert_snapshot!(constraints(&gen, &second, &mut rng), @r###"
        (or (not (= x 0)) (not (= b true)) (not (= y (- 1))))
        (or (not (= x 1)) (not (= b false)) (not (= y 3)))
        "###);
    }

    #[test]
    fn gaussian_targets() {
        let opts = ConstraintOptions {
            block_previous: false,
            ..Default::default()
        };
        let mut gen = generator(mixed_condition(), opts);
        let current = [Value::Int(1), Value::Int(2), Value::Bool(false), Value::Int(3)];
        gen.record(&current);
        assert!(gen.history.is_empty());
        assert!(gen.symbols.values().all(|s| s.cache.iter().count() == 0));

        // one soft target per numeric variable, booleans and constants are left alone
        let targets = constraints(&gen, &current, &mut SimRng::seed_from_u64(3));
        assert!(targets.starts_with("(or (= x "), "{targets}");
        assert!(targets.contains("(= y "), "{targets}");
        assert!(!targets.contains('\n') && !targets.contains(" b") && !targets.contains(" N"));
        // same seed, same targets
        assert_eq!(
            constraints(&gen, &current, &mut SimRng::seed_from_u64(3)),
            targets
        );

        let only_bools = json!({"op": "∨", "left": "b", "right": {"op": "=", "left": "N", "right": 2}});
        let gen = generator(only_bools, opts);
        let mut rng = SimRng::seed_from_u64(4);
        assert_eq!(constraints(&gen, &[Value::Bool(true), Value::Int(2)], &mut rng), "");
    }

    #[test]
    fn condition_is_checked_without_solver() {
        let sum = Expr::from_json(&json!({"op": "+", "left": "x", "right": 1})).unwrap();
        assert!(matches!(
            ConstraintGenerator::new(&sum, declarations(), ConstraintOptions::default()),
            Err(Error::TypeMismatch { expected: "bool", .. })
        ));
        let unknown = Expr::from_json(&json!({"op": "<", "left": "z", "right": 1})).unwrap();
        assert!(matches!(
            ConstraintGenerator::new(&unknown, declarations(), ConstraintOptions::default()),
            Err(Error::UnknownVariable(_))
        ));
    }

    #[test]
    fn value_cache_is_fifo() {
        let mut cache = ValueCache::new(2);
        cache.insert(Value::Int(1));
        cache.insert(Value::Int(2));
        // duplicates do not count
        cache.insert(Value::Int(1));
        assert_eq!(cache.iter().copied().collect::<Vec<_>>(), [Value::Int(1), Value::Int(2)]);
        cache.insert(Value::Int(3));
        assert_eq!(cache.iter().copied().collect::<Vec<_>>(), [Value::Int(2), Value::Int(3)]);

        let mut disabled = ValueCache::new(0);
        disabled.insert(Value::Int(1));
        assert_eq!(disabled.iter().count(), 0);
    }
}
