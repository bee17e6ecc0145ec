// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

mod error;
pub mod jani;
pub mod policy;
pub mod rules;
pub mod sim;
pub mod smt;

pub use error::{Error, Result};
pub use sim::SimRng;
