// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

mod eval;
mod expr;
mod model;
mod parse;
mod state;
mod transition_system;
mod value;

pub use eval::GetValue;
pub use expr::{BinOp, Expr};
pub use model::{Model, ModelOptions};
pub use parse::{parse_files, parse_str, ModelFiles};
pub use state::{Action, State, Variable};
pub use transition_system::{
    Assignment, Automaton, Destination, Edge, TransitMode, PROBABILITY_TOLERANCE,
};
pub use value::{Type, Value};
