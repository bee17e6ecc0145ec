// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::error::{Error, Result};
use crate::jani::Value;
use fuzzy_matcher::FuzzyMatcher;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// Binary operators in their canonical spelling.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum BinOp {
    // arithmetic
    Add,
    Sub,
    Mul,
    Div,
    // boolean
    And,
    Or,
    // comparison
    Eq,
    Ne,
    Le,
    Lt,
    Ge,
    Gt,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::And => "∧",
            BinOp::Or => "∨",
            BinOp::Eq => "=",
            BinOp::Ne => "≠",
            BinOp::Le => "≤",
            BinOp::Lt => "<",
            BinOp::Ge => "≥",
            BinOp::Gt => ">",
        }
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(self, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div)
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Le | BinOp::Lt | BinOp::Ge | BinOp::Gt
        )
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum Op {
    Not,
    Bin(BinOp),
}

lazy_static! {
    /// Maps every accepted operator spelling to its canonical operator.
    static ref OPS: HashMap<&'static str, Op> = HashMap::from([
        ("+", Op::Bin(BinOp::Add)),
        ("-", Op::Bin(BinOp::Sub)),
        ("*", Op::Bin(BinOp::Mul)),
        ("/", Op::Bin(BinOp::Div)),
        ("∧", Op::Bin(BinOp::And)),
        ("and", Op::Bin(BinOp::And)),
        ("AND", Op::Bin(BinOp::And)),
        ("&&", Op::Bin(BinOp::And)),
        ("∨", Op::Bin(BinOp::Or)),
        ("or", Op::Bin(BinOp::Or)),
        ("OR", Op::Bin(BinOp::Or)),
        ("||", Op::Bin(BinOp::Or)),
        ("¬", Op::Not),
        ("not", Op::Not),
        ("NOT", Op::Not),
        ("!", Op::Not),
        ("=", Op::Bin(BinOp::Eq)),
        ("==", Op::Bin(BinOp::Eq)),
        ("≠", Op::Bin(BinOp::Ne)),
        ("!=", Op::Bin(BinOp::Ne)),
        ("≤", Op::Bin(BinOp::Le)),
        ("<=", Op::Bin(BinOp::Le)),
        ("=<", Op::Bin(BinOp::Le)),
        ("<", Op::Bin(BinOp::Lt)),
        ("≥", Op::Bin(BinOp::Ge)),
        (">=", Op::Bin(BinOp::Ge)),
        ("=>", Op::Bin(BinOp::Ge)),
        (">", Op::Bin(BinOp::Gt)),
    ]);
}

/// Expression over model variables and constants.
#[derive(Debug, PartialEq, Clone)]
pub enum Expr {
    Var(String),
    Const(Value),
    Not(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn lit(value: impl Into<Value>) -> Self {
        Expr::Const(value.into())
    }

    pub fn not(e: Expr) -> Self {
        Expr::Not(Box::new(e))
    }

    pub fn binary(op: BinOp, a: Expr, b: Expr) -> Self {
        Expr::Binary(op, Box::new(a), Box::new(b))
    }

    /// Builds an expression from its json description. Strings are variable references,
    /// numbers and booleans are literals, objects carry an `op` and either `left`/`right`
    /// or, for negation, `exp`/`arg`.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        match json {
            serde_json::Value::String(name) => Ok(Expr::Var(name.clone())),
            serde_json::Value::Bool(b) => Ok(Expr::Const(Value::Bool(*b))),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Expr::Const(Value::Int(i)))
                } else {
                    n.as_f64()
                        .map(|r| Expr::Const(Value::Real(r)))
                        .ok_or_else(|| Error::parse(format!("unsupported number literal `{n}`")))
                }
            }
            serde_json::Value::Object(node) => {
                let op_name = node
                    .get("op")
                    .and_then(|o| o.as_str())
                    .ok_or_else(|| Error::parse(format!("node without `op`: {json}")))?;
                let op = *OPS.get(op_name).ok_or_else(|| invalid_op_error(op_name))?;
                let child = |key: &str| -> Result<Expr> {
                    let c = node.get(key).ok_or_else(|| {
                        Error::parse(format!("`{op_name}` node is missing `{key}`: {json}"))
                    })?;
                    Expr::from_json(c)
                };
                match op {
                    Op::Not => {
                        let arg = if node.contains_key("arg") {
                            child("arg")?
                        } else {
                            child("exp")?
                        };
                        Ok(Expr::not(arg))
                    }
                    Op::Bin(bin) => Ok(Expr::binary(bin, child("left")?, child("right")?)),
                }
            }
            other => Err(Error::parse(format!("invalid expression node `{other}`"))),
        }
    }
}

fn invalid_op_error(op: &str) -> Error {
    let matcher = fuzzy_matcher::skim::SkimMatcherV2::default();
    let mut matches: Vec<(&&str, i64)> = OPS
        .keys()
        .flat_map(|other| matcher.fuzzy_match(other, op).map(|s| (other, s)))
        .collect();
    matches.sort_by_key(|(n, s)| (-(*s), **n));
    let suggestions = matches
        .iter()
        .take(5)
        .map(|(n, _)| **n)
        .collect::<Vec<&str>>();
    if suggestions.is_empty() {
        Error::parse(format!("unsupported operator `{op}`"))
    } else {
        Error::parse(format!(
            "unsupported operator `{op}`. Did you mean: {}?",
            suggestions.join(", ")
        ))
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Var(name) => write!(f, "{name}"),
            Expr::Const(value) => write!(f, "{value}"),
            Expr::Not(e) => write!(f, "¬{e}"),
            Expr::Binary(op, a, b) => write!(f, "({a} {} {b})", op.symbol()),
        }
    }
}
