// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::error::{Error, Result};
use crate::jani::{BinOp, Expr, Value};
use std::collections::HashMap;

/// Returns the value of a variable if it is available.
pub trait GetValue {
    fn get_value(&self, name: &str) -> Option<Value>;
}

impl GetValue for HashMap<String, Value> {
    fn get_value(&self, name: &str) -> Option<Value> {
        self.get(name).copied()
    }
}

impl GetValue for [(&str, Value)] {
    fn get_value(&self, name: &str) -> Option<Value> {
        self.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }
}

impl Expr {
    /// Evaluates the expression against concrete variable values.
    pub fn evaluate(&self, values: &(impl GetValue + ?Sized)) -> Result<Value> {
        match self {
            Expr::Var(name) => values
                .get_value(name)
                .ok_or_else(|| Error::UnknownVariable(name.clone())),
            Expr::Const(value) => Ok(*value),
            Expr::Not(e) => {
                let v = e.evaluate(values)?;
                let b = v.as_bool().ok_or_else(|| self.mismatch("bool"))?;
                Ok(Value::Bool(!b))
            }
            Expr::Binary(op, a, b) => {
                let a = a.evaluate(values)?;
                let b = b.evaluate(values)?;
                self.eval_bin_op(*op, a, b)
            }
        }
    }

    /// Evaluates a predicate, e.g., a guard or a goal condition.
    pub fn is_true(&self, values: &(impl GetValue + ?Sized)) -> Result<bool> {
        self.evaluate(values)?
            .as_bool()
            .ok_or_else(|| self.mismatch("bool"))
    }

    fn eval_bin_op(&self, op: BinOp, a: Value, b: Value) -> Result<Value> {
        match op {
            BinOp::And | BinOp::Or => {
                let (a, b) = match (a, b) {
                    (Value::Bool(a), Value::Bool(b)) => (a, b),
                    _ => return Err(self.mismatch("bool")),
                };
                Ok(Value::Bool(if op == BinOp::And { a && b } else { a || b }))
            }
            BinOp::Eq | BinOp::Ne => {
                let equal = match (a, b) {
                    (Value::Bool(a), Value::Bool(b)) => a == b,
                    (Value::Int(a), Value::Int(b)) => a == b,
                    (Value::Bool(_), _) | (_, Value::Bool(_)) => {
                        return Err(self.mismatch("operands of the same type"))
                    }
                    (a, b) => a.to_f64() == b.to_f64(),
                };
                Ok(Value::Bool(if op == BinOp::Eq { equal } else { !equal }))
            }
            BinOp::Le | BinOp::Lt | BinOp::Ge | BinOp::Gt => {
                let ordering = match (a, b) {
                    (Value::Int(a), Value::Int(b)) => a.partial_cmp(&b),
                    (Value::Bool(_), _) | (_, Value::Bool(_)) => {
                        return Err(self.mismatch("numbers"))
                    }
                    (a, b) => a.to_f64().partial_cmp(&b.to_f64()),
                };
                // NaN compares false against everything
                let res = ordering.is_some_and(|o| match op {
                    BinOp::Le => o.is_le(),
                    BinOp::Lt => o.is_lt(),
                    BinOp::Ge => o.is_ge(),
                    _ => o.is_gt(),
                });
                Ok(Value::Bool(res))
            }
            BinOp::Div => {
                let (a, b) = match (a.as_f64(), b.as_f64()) {
                    (Some(a), Some(b)) => (a, b),
                    _ => return Err(self.mismatch("numbers")),
                };
                if b == 0.0 {
                    Err(Error::DivisionByZero(self.to_string()))
                } else {
                    Ok(Value::Real(a / b))
                }
            }
            BinOp::Add | BinOp::Sub | BinOp::Mul => match (a, b) {
                (Value::Int(a), Value::Int(b)) => {
                    let res = match op {
                        BinOp::Add => a.checked_add(b),
                        BinOp::Sub => a.checked_sub(b),
                        _ => a.checked_mul(b),
                    };
                    res.map(Value::Int)
                        .ok_or_else(|| self.mismatch("a result that fits into 64 bits"))
                }
                (Value::Bool(_), _) | (_, Value::Bool(_)) => Err(self.mismatch("numbers")),
                (a, b) => {
                    let (a, b) = (a.to_f64(), b.to_f64());
                    Ok(Value::Real(match op {
                        BinOp::Add => a + b,
                        BinOp::Sub => a - b,
                        _ => a * b,
                    }))
                }
            },
        }
    }

    fn mismatch(&self, expected: &'static str) -> Error {
        Error::TypeMismatch {
            expr: self.to_string(),
            expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(json: serde_json::Value) -> Expr {
        Expr::from_json(&json).unwrap()
    }

    #[test]
    fn eval_arithmetic() {
        let values: &[(&str, Value)] = &[("x", Value::Int(2)), ("r", Value::Real(0.5))];
        let e = parse(json!({"op": "+", "left": "x", "right": {"op": "*", "left": "x", "right": 3}}));
        assert_eq!(e.evaluate(values).unwrap(), Value::Int(8));
        let e = parse(json!({"op": "-", "left": "x", "right": "r"}));
        assert_eq!(e.evaluate(values).unwrap(), Value::Real(1.5));
        // division always yields a real
        let e = parse(json!({"op": "/", "left": "x", "right": 4}));
        assert_eq!(e.evaluate(values).unwrap(), Value::Real(0.5));
    }

    #[test]
    fn eval_comparisons() {
        let values: &[(&str, Value)] = &[("x", Value::Int(2)), ("r", Value::Real(2.0))];
        for (op, expected) in [
            ("=", true),
            ("≠", false),
            ("≤", true),
            ("<", false),
            ("≥", true),
            (">", false),
        ] {
            let e = parse(json!({"op": op, "left": "x", "right": "r"}));
            assert_eq!(e.is_true(values).unwrap(), expected, "{op}");
        }
    }

    #[test]
    fn eval_boolean() {
        let values: &[(&str, Value)] = &[("a", Value::Bool(true)), ("b", Value::Bool(false))];
        let e = parse(json!({"op": "∨", "left": "b", "right": {"op": "¬", "exp": "b"}}));
        assert!(e.is_true(values).unwrap());
        let e = parse(json!({"op": "∧", "left": "a", "right": "b"}));
        assert!(!e.is_true(values).unwrap());
        let e = parse(json!({"op": "=", "left": "a", "right": true}));
        assert!(e.is_true(values).unwrap());
    }

    #[test]
    fn eval_errors() {
        let values: &[(&str, Value)] = &[("x", Value::Int(0)), ("a", Value::Bool(true))];
        let e = parse(json!({"op": "/", "left": 1, "right": "x"}));
        assert!(matches!(e.evaluate(values), Err(Error::DivisionByZero(_))));
        let e = parse(json!({"op": "+", "left": "a", "right": 1}));
        assert!(matches!(e.evaluate(values), Err(Error::TypeMismatch { .. })));
        let e = parse(json!({"op": "∧", "left": "a", "right": "x"}));
        assert!(matches!(e.evaluate(values), Err(Error::TypeMismatch { .. })));
        let e = parse(json!({"op": "<", "left": "y", "right": 1}));
        assert!(matches!(e.evaluate(values), Err(Error::UnknownVariable(n)) if n == "y"));
        // a guard has to be a predicate
        assert!(parse(json!("x")).is_true(values).is_err());
    }
}
