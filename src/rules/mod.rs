// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

mod compile;
mod expr;
mod model;

pub use expr::RuleExpr;
pub use model::{Forward, SymbolicModel};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("failed to read `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("model has no atoms")]
    EmptyAtoms,
    #[error("model has no rules")]
    EmptyRules,
    #[error("invalid linear head: {0}")]
    MissingLinear(String),
    #[error("rule name `{0}` does not have the form `L<layer>_<index>`")]
    RuleName(String),
    #[error("invalid rule expression `{0}`")]
    MalformedNode(String),
    #[error("rule `{rule}` refers to `{name}` which is neither an atom nor a rule")]
    UnknownName { rule: String, name: String },
    #[error("rule `{rule}` refers to `{reference}` which is not in an earlier layer")]
    ForwardReference { rule: String, reference: String },
    #[error("missing truth values for atoms: {0:?}")]
    MissingAtom(Vec<String>),
    #[error("rule `{0}` was read before it was evaluated")]
    MissingRuleValue(String),
}
