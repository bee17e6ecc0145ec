// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

mod constraint;
mod init;

pub use constraint::{ConstraintGenerator, ConstraintOptions};
pub use init::{FixedGenerator, RandomGenerator};

use crate::error::Result;
use crate::jani::State;

/// Random number generator used for initial states and transitions.
pub type SimRng = rand_xoshiro::Xoshiro256PlusPlus;

/// Produces initial states of a model.
pub trait StateGenerator {
    fn generate(&mut self, rng: &mut SimRng) -> Result<State>;
}

/// How initial states are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitKind {
    /// Draw from the explicit pool of states.
    Fixed,
    /// Sample every variable uniformly within its bounds.
    Random,
    /// Solve the start condition with an SMT solver.
    Constraint,
}
