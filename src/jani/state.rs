// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::error::{Error, Result};
use crate::jani::{GetValue, Type, Value};
use indexmap::IndexMap;
use std::fmt::{Display, Formatter};

/// A model variable or constant together with its current value.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    /// position inside the dense state vector
    pub index: usize,
    pub tpe: Type,
    pub value: Value,
    pub lower_bound: Option<Value>,
    pub upper_bound: Option<Value>,
    pub constant: bool,
}

impl Variable {
    pub fn bounded(
        name: impl Into<String>,
        index: usize,
        tpe: Type,
        value: Value,
        lower_bound: Option<Value>,
        upper_bound: Option<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            index,
            tpe,
            value,
            lower_bound,
            upper_bound,
            constant: false,
        }
    }

    pub fn constant(name: impl Into<String>, index: usize, value: Value) -> Self {
        Self {
            name: name.into(),
            index,
            tpe: value.tpe(),
            value,
            lower_bound: None,
            upper_bound: None,
            constant: true,
        }
    }

    pub fn with_value(&self, value: Value) -> Self {
        Self {
            value,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Action {
    pub label: String,
    pub index: usize,
}

/// Values of all constants and variables of a model. States are not modified after
/// they have been created; transitions produce fresh states.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    variables: IndexMap<String, Variable>,
}

impl State {
    pub fn new(variables: impl IntoIterator<Item = Variable>) -> Self {
        let variables = variables
            .into_iter()
            .map(|v| (v.name.clone(), v))
            .collect();
        Self { variables }
    }

    /// Creates a state from a dense vector. `variables` needs to be ordered by index.
    pub fn from_vector(vec: &[f64], variables: &[Variable]) -> Result<Self> {
        if vec.len() != variables.len() {
            return Err(Error::VectorLength {
                expected: variables.len(),
                actual: vec.len(),
            });
        }
        let mut out = IndexMap::with_capacity(variables.len());
        for (position, (variable, value)) in variables.iter().zip(vec.iter()).enumerate() {
            if variable.index != position {
                return Err(Error::IndexMismatch {
                    name: variable.name.clone(),
                    index: variable.index,
                    position,
                });
            }
            let v = variable.with_value(Value::from_f64(*value, variable.tpe));
            out.insert(variable.name.clone(), v);
        }
        Ok(Self { variables: out })
    }

    /// Dense vector of all values, using the variable index as position.
    pub fn to_vector(&self) -> Vec<f64> {
        let len = self
            .variables
            .values()
            .map(|v| v.index + 1)
            .max()
            .unwrap_or_default();
        let mut vec = vec![0.0; len];
        for variable in self.variables.values() {
            vec[variable.index] = variable.value.to_f64();
        }
        vec
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn value(&self, name: &str) -> Option<Value> {
        self.variables.get(name).map(|v| v.value)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }

    /// Overwrites the value of an existing variable.
    pub(crate) fn set(&mut self, name: &str, value: Value) -> Result<()> {
        match self.variables.get_mut(name) {
            Some(variable) => {
                variable.value = value;
                Ok(())
            }
            None => Err(Error::UnknownVariable(name.to_string())),
        }
    }

    /// Returns a copy of this state where `name` is set to `value`.
    pub fn with_value(&self, name: &str, value: Value) -> Result<Self> {
        let mut out = self.clone();
        out.set(name, value)?;
        Ok(out)
    }

    /// Comma separated `name = value` list of all non-constant variables.
    pub fn variable_info(&self) -> String {
        self.variables
            .values()
            .filter(|v| !v.constant)
            .map(|v| format!("{} = {}", v.name, v.value))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl GetValue for State {
    fn get_value(&self, name: &str) -> Option<Value> {
        self.value(name)
    }
}

impl Display for State {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut sorted: Vec<&Variable> = self.variables.values().collect();
        sorted.sort_by_key(|v| v.index);
        let pairs = sorted
            .iter()
            .map(|v| format!("{}={}", v.name, v.value))
            .collect::<Vec<_>>();
        write!(f, "{}", pairs.join(","))
    }
}
