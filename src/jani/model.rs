// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::error::{Error, Result};
use crate::jani::{Action, Automaton, Edge, Expr, State, TransitMode, Variable};
use crate::sim::{ConstraintOptions, InitKind, SimRng, StateGenerator};
use rand::SeedableRng;

#[derive(Debug, Clone, Copy, Default)]
pub struct ModelOptions {
    /// Seed of the random number generator owned by the model. Without a seed, the
    /// generator is seeded from the operating system.
    pub seed: Option<u64>,
    /// Sample initial states uniformly within the variable bounds, ignoring the start
    /// specification.
    pub random_init: bool,
    /// Options for start conditions that are solved with an SMT solver.
    pub generator: ConstraintOptions,
}

/// A loaded model with a single automaton. Apart from the random number generator and the
/// caches of the initial state generator, a model does not change after loading.
pub struct Model {
    constants: Vec<Variable>,
    variables: Vec<Variable>,
    /// ordered by index
    actions: Vec<Action>,
    automaton: Automaton,
    init_kind: InitKind,
    generator: Box<dyn StateGenerator>,
    goal: Expr,
    failure: Expr,
    rng: SimRng,
}

pub(crate) struct ModelParts {
    pub constants: Vec<Variable>,
    pub variables: Vec<Variable>,
    pub actions: Vec<Action>,
    pub automaton: Automaton,
    pub init_kind: InitKind,
    pub generator: Box<dyn StateGenerator>,
    pub goal: Expr,
    pub failure: Expr,
}

impl Model {
    pub(crate) fn new(parts: ModelParts, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => SimRng::seed_from_u64(seed),
            None => SimRng::from_entropy(),
        };
        Self {
            constants: parts.constants,
            variables: parts.variables,
            actions: parts.actions,
            automaton: parts.automaton,
            init_kind: parts.init_kind,
            generator: parts.generator,
            goal: parts.goal,
            failure: parts.failure,
            rng,
        }
    }

    /// Draws a fresh initial state.
    pub fn reset(&mut self) -> Result<State> {
        self.generator.generate(&mut self.rng)
    }

    /// Samples one successor per enabled edge of `action`.
    pub fn successors(&mut self, state: &State, action: &Action) -> Result<Vec<State>> {
        self.automaton
            .transit(state, action, TransitMode::Sample, &mut self.rng)
    }

    /// Every destination of every enabled edge of `action`, without sampling.
    pub fn all_successors(&mut self, state: &State, action: &Action) -> Result<Vec<State>> {
        self.automaton
            .transit(state, action, TransitMode::Enumerate, &mut self.rng)
    }

    /// Takes `action` and returns the first sampled successor, `None` if the action is not
    /// enabled in `state`.
    pub fn transition(&mut self, state: &State, action: &Action) -> Result<Option<State>> {
        Ok(self.successors(state, action)?.into_iter().next())
    }

    pub fn applicable_actions(&self, state: &State) -> Result<Vec<&Action>> {
        let mut out = vec![];
        for action in self.actions.iter() {
            if self.automaton.is_applicable(state, action)? {
                out.push(action);
            }
        }
        Ok(out)
    }

    pub fn goal_reached(&self, state: &State) -> Result<bool> {
        self.goal.is_true(state)
    }

    pub fn failure_reached(&self, state: &State) -> Result<bool> {
        self.failure.is_true(state)
    }

    pub fn action(&self, index: usize) -> Result<&Action> {
        self.actions.get(index).ok_or(Error::ActionIndex {
            index,
            count: self.actions.len(),
        })
    }

    pub fn action_by_name(&self, label: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.label == label)
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    pub fn edges_for_action(&self, index: usize) -> Result<&[Edge]> {
        let action = self.action(index)?;
        self.automaton.edges(action)
    }

    pub fn variable(&self, name: &str) -> Result<&Variable> {
        self.constants
            .iter()
            .chain(self.variables.iter())
            .find(|v| v.name == name)
            .ok_or_else(|| Error::UnknownVariable(name.to_string()))
    }

    pub fn constants(&self) -> &[Variable] {
        &self.constants
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// All constants and variables ordered by their index, i.e., their position in a
    /// state vector.
    pub fn constants_and_variables(&self) -> Vec<Variable> {
        let mut out: Vec<Variable> = self
            .constants
            .iter()
            .chain(self.variables.iter())
            .cloned()
            .collect();
        out.sort_by_key(|v| v.index);
        out
    }

    pub fn automaton(&self) -> &Automaton {
        &self.automaton
    }

    pub fn init_kind(&self) -> InitKind {
        self.init_kind
    }

    pub fn goal(&self) -> &Expr {
        &self.goal
    }

    pub fn failure(&self) -> &Expr {
        &self.failure
    }

    pub fn rng(&mut self) -> &mut SimRng {
        &mut self.rng
    }
}
