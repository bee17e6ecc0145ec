// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

mod parse;
mod serialize;
mod solver;

pub use parse::parse_smt_value;
pub(crate) use serialize::convert_value;
pub use serialize::{convert_expr, convert_sort, escape_smt_identifier, Clause};
pub use solver::{start_solver, SmtSolverCmd, Z3_CMD};
