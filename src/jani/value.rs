// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::error::{Error, Result};
use std::fmt::{Display, Formatter};

/// Base type of a variable or constant.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Type {
    Int,
    Real,
    Bool,
}

impl std::str::FromStr for Type {
    type Err = ();

    fn from_str(tpe: &str) -> std::result::Result<Self, Self::Err> {
        match tpe {
            "int" => Ok(Type::Int),
            "real" => Ok(Type::Real),
            "bool" => Ok(Type::Bool),
            _ => Err(()),
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Real => write!(f, "real"),
            Type::Bool => write!(f, "bool"),
        }
    }
}

/// A concrete value as produced by expression evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Real(f64),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric view of the value. Booleans are not numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(_) => None,
            Value::Int(i) => Some(*i as f64),
            Value::Real(r) => Some(*r),
        }
    }

    /// Position in a dense state vector. Booleans map to 0.0 and 1.0.
    pub fn to_f64(&self) -> f64 {
        match self {
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Int(i) => *i as f64,
            Value::Real(r) => *r,
        }
    }

    /// Inverse of [`Value::to_f64`] for a variable of type `tpe`.
    pub fn from_f64(value: f64, tpe: Type) -> Self {
        match tpe {
            Type::Int => Value::Int(value.round() as i64),
            Type::Real => Value::Real(value),
            Type::Bool => Value::Bool(value != 0.0),
        }
    }

    pub fn tpe(&self) -> Type {
        match self {
            Value::Bool(_) => Type::Bool,
            Value::Int(_) => Type::Int,
            Value::Real(_) => Type::Real,
        }
    }

    /// Reads a literal of type `tpe`. Besides json booleans, the strings `"true"` and
    /// `"false"` are accepted since some exporters write constants that way.
    pub fn from_json(json: &serde_json::Value, tpe: Type, name: &str) -> Result<Self> {
        let invalid = |msg: String| Error::InvalidValue {
            name: name.to_string(),
            msg,
        };
        match (tpe, json) {
            (Type::Bool, serde_json::Value::Bool(b)) => Ok(Value::Bool(*b)),
            (Type::Bool, serde_json::Value::String(s)) => match s.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                other => Err(invalid(format!("`{other}` is not a boolean"))),
            },
            (Type::Int, serde_json::Value::Number(n)) => match n.as_i64() {
                Some(i) => Ok(Value::Int(i)),
                None => match n.as_f64() {
                    Some(f) if f.fract() == 0.0 => Ok(Value::Int(f as i64)),
                    _ => Err(invalid(format!("`{n}` is not an integer"))),
                },
            },
            (Type::Real, serde_json::Value::Number(n)) => n
                .as_f64()
                .map(Value::Real)
                .ok_or_else(|| invalid(format!("`{n}` is not a real number"))),
            (Type::Int | Type::Real, serde_json::Value::String(s)) => {
                let parsed: f64 = s
                    .parse()
                    .map_err(|_| invalid(format!("`{s}` is not a number")))?;
                Value::from_json(&serde_json::json!(parsed), tpe, name)
            }
            (_, other) => Err(invalid(format!("`{other}` is not a {tpe}"))),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_types() {
        assert_eq!("int".parse::<Type>(), Ok(Type::Int));
        assert_eq!("real".parse::<Type>(), Ok(Type::Real));
        assert_eq!("bool".parse::<Type>(), Ok(Type::Bool));
        assert!("clock".parse::<Type>().is_err());
    }

    #[test]
    fn values_from_json() {
        assert_eq!(
            Value::from_json(&json!("true"), Type::Bool, "c").unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            Value::from_json(&json!(false), Type::Bool, "c").unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            Value::from_json(&json!(3), Type::Real, "c").unwrap(),
            Value::Real(3.0)
        );
        assert_eq!(
            Value::from_json(&json!(4.0), Type::Int, "c").unwrap(),
            Value::Int(4)
        );
        Value::from_json(&json!(4.5), Type::Int, "c").expect_err("not an int");
        Value::from_json(&json!("yes"), Type::Bool, "c").expect_err("not a bool");
    }

    #[test]
    fn vector_conversion() {
        for (value, tpe) in [
            (Value::Int(-3), Type::Int),
            (Value::Real(0.25), Type::Real),
            (Value::Bool(true), Type::Bool),
            (Value::Bool(false), Type::Bool),
        ] {
            assert_eq!(Value::from_f64(value.to_f64(), tpe), value);
        }
    }
}
