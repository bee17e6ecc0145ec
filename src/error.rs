// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while loading, simulating or sampling a model.
#[derive(Debug, Error)]
pub enum Error {
    // configuration errors, raised while loading
    #[error("failed to read `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid json in {what}: {source}")]
    Json {
        what: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("unsupported variable kind `{kind}` for `{name}`, only `bounded` is supported")]
    UnsupportedVariableKind { name: String, kind: String },
    #[error("unsupported type `{tpe}` for `{name}`")]
    UnsupportedType { name: String, tpe: String },
    #[error("invalid value for `{name}`: {msg}")]
    InvalidValue { name: String, msg: String },
    #[error("expected exactly one automaton, found {0}")]
    AutomataCount(usize),
    #[error("{kind} `{name}` not found in interface")]
    MissingInterfaceEntry { kind: &'static str, name: String },
    #[error("invalid interface: {0}")]
    InvalidInterface(String),
    #[error("invalid property specification: {0}")]
    Property(String),
    #[error("unsupported initial state generator operation `{0}`")]
    UnsupportedStartOp(String),
    #[error("destination probabilities of edge `{action}` sum to {sum}, expected 1")]
    InvalidDistribution { action: String, sum: f64 },
    #[error("variable `{0}` has no bounds and is not a constant")]
    UnboundedSymbol(String),

    // evaluation errors
    #[error("unknown variable `{0}`")]
    UnknownVariable(String),
    #[error("action `{action}` is not supported in automaton `{automaton}`")]
    UnsupportedAction { action: String, automaton: String },
    #[error("invalid action index {index}, model has {count} actions")]
    ActionIndex { index: usize, count: usize },
    #[error("type mismatch in `{expr}`: expected {expected}")]
    TypeMismatch { expr: String, expected: &'static str },
    #[error("division by zero in `{0}`")]
    DivisionByZero(String),
    #[error("vector length {actual} does not match number of variables {expected}")]
    VectorLength { expected: usize, actual: usize },
    #[error("variable `{name}` has index {index} but is at position {position}")]
    IndexMismatch {
        name: String,
        index: usize,
        position: usize,
    },

    // solver errors
    #[error("failed to communicate with smt solver: {0}")]
    Solver(#[from] std::io::Error),
    #[error("start condition is infeasible (solver answered {0})")]
    InfeasibleStart(&'static str),
    #[error("could not interpret solver value `{value}` for `{name}`")]
    SolverValue { name: String, value: String },

    // policy errors
    #[error(transparent)]
    Rules(#[from] crate::rules::RuleError),
    #[error("class `{0}` does not correspond to an interface output")]
    UnknownClass(String),
    #[error("no applicable action in state {0}")]
    NoApplicableAction(String),
}

impl Error {
    pub(crate) fn json(what: impl Into<String>, source: serde_json::Error) -> Self {
        Error::Json {
            what: what.into(),
            source,
        }
    }

    pub(crate) fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    pub(crate) fn property(msg: impl Into<String>) -> Self {
        Error::Property(msg.into())
    }
}
