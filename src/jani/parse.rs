// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::error::{Error, Result};
use crate::jani::model::ModelParts;
use crate::jani::{
    Action, Assignment, Automaton, Destination, Edge, Expr, Model, ModelOptions, Type, Value,
    Variable,
};
use crate::sim::{ConstraintGenerator, FixedGenerator, InitKind, RandomGenerator, StateGenerator};
use indexmap::IndexMap;
use serde_json::Value as Json;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Locations of the files that describe a model. Start, goal and failure conditions are
/// taken from the property file if there is one, otherwise from the three separate files.
#[derive(Debug, Clone, Default)]
pub struct ModelFiles {
    pub model: PathBuf,
    pub interface: Option<PathBuf>,
    pub property: Option<PathBuf>,
    pub start: Option<PathBuf>,
    pub goal: Option<PathBuf>,
    pub failure: Option<PathBuf>,
}

impl ModelFiles {
    pub fn new(model: impl Into<PathBuf>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}

pub fn parse_files(files: &ModelFiles, opts: ModelOptions) -> Result<Model> {
    let model = read_json(&files.model)?;
    let interface = files.interface.as_deref().map(read_json).transpose()?;
    let conditions = match &files.property {
        Some(property) => {
            if files.start.is_some() || files.goal.is_some() || files.failure.is_some() {
                warn!("a property file is provided, separate start, goal and failure files are ignored");
            }
            let dir = property.parent().unwrap_or_else(|| Path::new("."));
            Conditions::from_property(&read_json(property)?, Some(dir))?
        }
        None => match (&files.start, &files.goal, &files.failure) {
            (Some(start), Some(goal), Some(failure)) => Conditions {
                start: read_json(start)?,
                goal: read_json(goal)?,
                failure: read_json(failure)?,
            },
            _ => {
                return Err(Error::property(
                    "either a property file or start, goal and failure files are required",
                ))
            }
        },
    };
    parse_model(&model, interface.as_ref(), conditions, opts)
}

/// Loads a model from json text. File references inside the property cannot be resolved
/// and are rejected.
pub fn parse_str(
    model: &str,
    property: &str,
    interface: Option<&str>,
    opts: ModelOptions,
) -> Result<Model> {
    let model: Json = serde_json::from_str(model).map_err(|e| Error::json("model", e))?;
    let property: Json =
        serde_json::from_str(property).map_err(|e| Error::json("property", e))?;
    let interface = interface
        .map(|i| serde_json::from_str::<Json>(i).map_err(|e| Error::json("interface", e)))
        .transpose()?;
    let conditions = Conditions::from_property(&property, None)?;
    parse_model(&model, interface.as_ref(), conditions, opts)
}

fn read_json(path: &Path) -> Result<Json> {
    let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|e| Error::json(path.display().to_string(), e))
}

/// Unprocessed start, goal and failure specifications.
struct Conditions {
    start: Json,
    goal: Json,
    failure: Json,
}

impl Conditions {
    fn from_property(json: &Json, dir: Option<&Path>) -> Result<Self> {
        let properties = json
            .get("properties")
            .and_then(|p| p.as_array())
            .ok_or_else(|| Error::property("missing `properties` list"))?;
        if properties.len() != 1 {
            return Err(Error::property(format!(
                "expected exactly one property, got {}",
                properties.len()
            )));
        }
        let expression = properties[0]
            .get("expression")
            .ok_or_else(|| Error::property("property without `expression`"))?;
        let part = |key: &str| {
            expression
                .get(key)
                .ok_or_else(|| Error::property(format!("property is missing `{key}`")))
        };
        let (start, goal, failure) = (part("start")?, part("objective")?, part("reach")?);
        let files: Vec<Option<&str>> = [start, goal, failure]
            .iter()
            .map(|p| p.get("file").and_then(|f| f.as_str()))
            .collect();
        match files.as_slice() {
            [Some(start), Some(goal), Some(failure)] => {
                let dir = dir.ok_or_else(|| {
                    Error::property("file references need a property file to resolve against")
                })?;
                Ok(Self {
                    start: read_json(&dir.join(start))?,
                    goal: read_json(&dir.join(goal))?,
                    failure: read_json(&dir.join(failure))?,
                })
            }
            [None, None, None] => Ok(Self {
                start: start.clone(),
                goal: goal.clone(),
                failure: failure.clone(),
            }),
            _ => Err(Error::property(
                "start, objective and reach need to be either all files or all inline",
            )),
        }
    }
}

fn parse_model(
    json: &Json,
    interface: Option<&Json>,
    conditions: Conditions,
    opts: ModelOptions,
) -> Result<Model> {
    let declared = array(json, "constants")?
        .iter()
        .enumerate()
        .map(|(index, c)| parse_constant(c, index))
        .collect::<Result<Vec<_>>>()?;
    // bounds, initial values and probabilities may refer to constants
    let env: Vec<(&str, Value)> = declared
        .iter()
        .map(|c| (c.name.as_str(), c.value))
        .collect();
    let mut variables = array(json, "variables")?
        .iter()
        .enumerate()
        .map(|(index, v)| parse_variable(v, declared.len() + index, &env))
        .collect::<Result<Vec<_>>>()?;
    let mut constants = declared.clone();
    let mut actions = array(json, "actions")?
        .iter()
        .enumerate()
        .map(|(index, a)| {
            Ok(Action {
                label: str_field(a, "name", "action")?.to_string(),
                index,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if let Some(interface) = interface {
        remap(interface, &mut constants, &mut variables, &mut actions)?;
    }

    let automata = array(json, "automata")?;
    if automata.len() != 1 {
        return Err(Error::AutomataCount(automata.len()));
    }
    let automaton = parse_automaton(&automata[0], &env)?;

    let mut declarations = constants.clone();
    declarations.extend(variables.iter().cloned());
    let goal = parse_goal(&conditions.goal)?;
    let failure = parse_failure(&conditions.failure)?;
    let (init_kind, generator) = if opts.random_init {
        let gen: Box<dyn StateGenerator> = Box::new(RandomGenerator::new(declarations));
        (InitKind::Random, gen)
    } else {
        parse_start(&conditions.start, declarations, &opts)?
    };
    debug!(
        "loaded model with {} constants, {} variables, {} actions and {} edges",
        constants.len(),
        variables.len(),
        actions.len(),
        automaton.edge_count()
    );

    let parts = ModelParts {
        constants,
        variables,
        actions,
        automaton,
        init_kind,
        generator,
        goal,
        failure,
    };
    Ok(Model::new(parts, opts.seed))
}

fn array<'a>(json: &'a Json, key: &str) -> Result<&'a [Json]> {
    match json.get(key) {
        None => Ok(&[]),
        Some(Json::Array(items)) => Ok(items),
        Some(other) => Err(Error::parse(format!("`{key}` should be a list, not {other}"))),
    }
}

fn field<'a>(json: &'a Json, key: &str, what: &str) -> Result<&'a Json> {
    json.get(key)
        .ok_or_else(|| Error::parse(format!("{what} is missing `{key}`: {json}")))
}

fn str_field<'a>(json: &'a Json, key: &str, what: &str) -> Result<&'a str> {
    field(json, key, what)?
        .as_str()
        .ok_or_else(|| Error::parse(format!("`{key}` of {what} should be a string")))
}

fn parse_type(name: &str, tpe: &str) -> Result<Type> {
    tpe.parse().map_err(|_| Error::UnsupportedType {
        name: name.to_string(),
        tpe: tpe.to_string(),
    })
}

fn parse_constant(json: &Json, index: usize) -> Result<Variable> {
    let name = str_field(json, "name", "constant")?;
    let tpe = parse_type(name, str_field(json, "type", "constant")?)?;
    let value = Value::from_json(field(json, "value", "constant")?, tpe, name)?;
    Ok(Variable::constant(name, index, value))
}

/// Evaluates a literal or an expression over constants, e.g., a bound or an initial value.
fn parse_value(json: &Json, tpe: Type, name: &str, env: &[(&str, Value)]) -> Result<Value> {
    // plain literals, including `"true"` and `"false"` strings, before references to constants
    if !json.is_object() {
        if let Ok(value) = Value::from_json(json, tpe, name) {
            return Ok(value);
        }
    }
    let value = Expr::from_json(json)?.evaluate(env)?;
    let invalid = |msg: String| Error::InvalidValue {
        name: name.to_string(),
        msg,
    };
    match (tpe, value) {
        (Type::Bool, Value::Bool(_)) | (Type::Int, Value::Int(_)) | (Type::Real, Value::Real(_)) => {
            Ok(value)
        }
        (Type::Real, Value::Int(i)) => Ok(Value::Real(i as f64)),
        (Type::Int, Value::Real(r)) if r.fract() == 0.0 => Ok(Value::Int(r as i64)),
        (tpe, value) => Err(invalid(format!("`{value}` is not a {tpe}"))),
    }
}

fn parse_variable(json: &Json, index: usize, env: &[(&str, Value)]) -> Result<Variable> {
    let name = str_field(json, "name", "variable")?;
    let properties = field(json, "type", "variable")?;
    let kind = str_field(properties, "kind", "variable type")?;
    if kind != "bounded" {
        return Err(Error::UnsupportedVariableKind {
            name: name.to_string(),
            kind: kind.to_string(),
        });
    }
    let tpe = parse_type(name, str_field(properties, "base", "variable type")?)?;
    let (lower, upper) = if tpe == Type::Bool {
        (None, None)
    } else {
        let bound = |key: &str| {
            properties
                .get(key)
                .map(|b| parse_value(b, tpe, name, env))
                .transpose()
        };
        (bound("lower-bound")?, bound("upper-bound")?)
    };
    if let (Some(lo), Some(hi)) = (lower, upper) {
        if lo.to_f64() > hi.to_f64() {
            return Err(Error::InvalidValue {
                name: name.to_string(),
                msg: format!("lower bound {lo} is larger than upper bound {hi}"),
            });
        }
    }
    let value = match json.get("initial-value") {
        Some(init) => parse_value(init, tpe, name, env)?,
        None => lower.unwrap_or(match tpe {
            Type::Bool => Value::Bool(false),
            Type::Int => Value::Int(0),
            Type::Real => Value::Real(0.0),
        }),
    };
    Ok(Variable::bounded(name, index, tpe, value, lower, upper))
}

/// Entries of the interface are either plain names or objects with a `name`.
fn interface_indices(interface: &Json, key: &str) -> Result<IndexMap<String, usize>> {
    let entries = interface
        .get(key)
        .and_then(|e| e.as_array())
        .ok_or_else(|| Error::InvalidInterface(format!("missing `{key}` list")))?;
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let name = entry
                .as_str()
                .or_else(|| entry.get("name").and_then(|n| n.as_str()))
                .ok_or_else(|| Error::InvalidInterface(format!("invalid `{key}` entry {entry}")))?;
            Ok((name.to_string(), index))
        })
        .collect()
}

/// Re-indexes constants, variables and actions to match the order of the interface.
fn remap(
    interface: &Json,
    constants: &mut [Variable],
    variables: &mut [Variable],
    actions: &mut Vec<Action>,
) -> Result<()> {
    let inputs = interface_indices(interface, "input")?;
    let outputs = interface_indices(interface, "output")?;
    let lookup = |map: &IndexMap<String, usize>, kind: &'static str, name: &str| {
        map.get(name)
            .copied()
            .ok_or_else(|| Error::MissingInterfaceEntry {
                kind,
                name: name.to_string(),
            })
    };
    for constant in constants.iter_mut() {
        constant.index = lookup(&inputs, "constant", &constant.name)?;
    }
    for variable in variables.iter_mut() {
        variable.index = lookup(&inputs, "variable", &variable.name)?;
    }
    for action in actions.iter_mut() {
        action.index = lookup(&outputs, "action", &action.label)?;
    }

    let mut indices: Vec<usize> = constants
        .iter()
        .chain(variables.iter())
        .map(|v| v.index)
        .collect();
    check_permutation(&mut indices, "input")?;
    let mut indices: Vec<usize> = actions.iter().map(|a| a.index).collect();
    check_permutation(&mut indices, "output")?;
    actions.sort_by_key(|a| a.index);
    Ok(())
}

fn check_permutation(indices: &mut [usize], what: &str) -> Result<()> {
    indices.sort_unstable();
    if indices.iter().enumerate().all(|(i, index)| i == *index) {
        Ok(())
    } else {
        Err(Error::InvalidInterface(format!(
            "`{what}` indices {indices:?} are not a permutation of 0..{}",
            indices.len()
        )))
    }
}

fn parse_automaton(json: &Json, env: &[(&str, Value)]) -> Result<Automaton> {
    let name = str_field(json, "name", "automaton")?;
    let edges = array(json, "edges")?
        .iter()
        .map(|e| parse_edge(e, env))
        .collect::<Result<Vec<_>>>()?;
    let mut automaton = Automaton::new(name.to_string(), edges);
    automaton.locations = array(json, "locations")?
        .iter()
        .filter_map(|l| l.get("name").and_then(|n| n.as_str()).map(str::to_string))
        .collect();
    automaton.initial_locations = array(json, "initial-locations")?
        .iter()
        .filter_map(|l| l.as_str().map(str::to_string))
        .collect();
    Ok(automaton)
}

fn parse_edge(json: &Json, env: &[(&str, Value)]) -> Result<Edge> {
    let action = str_field(json, "action", "edge")?;
    let guard = match json.get("guard") {
        Some(guard) => Expr::from_json(field(guard, "exp", "guard")?)?,
        None => Expr::lit(true),
    };
    let destinations = array(json, "destinations")?
        .iter()
        .map(|d| parse_destination(d, action, env))
        .collect::<Result<Vec<_>>>()?;
    Edge::new(action.to_string(), guard, destinations)
}

fn parse_destination(json: &Json, action: &str, env: &[(&str, Value)]) -> Result<Destination> {
    let probability = match json.get("probability") {
        Some(p) => {
            let value = Expr::from_json(field(p, "exp", "probability")?)?.evaluate(env)?;
            value.as_f64().ok_or_else(|| Error::InvalidValue {
                name: action.to_string(),
                msg: format!("probability `{value}` is not a number"),
            })?
        }
        None => 1.0,
    };
    let assignments = array(json, "assignments")?
        .iter()
        .map(|a| {
            let target = a
                .get("target")
                .or_else(|| a.get("ref"))
                .and_then(|t| t.as_str())
                .ok_or_else(|| Error::parse(format!("assignment without target: {a}")))?;
            Ok(Assignment {
                target: target.to_string(),
                value: Expr::from_json(field(a, "value", "assignment")?)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Destination {
        assignments,
        probability,
    })
}

fn op(json: &Json) -> Result<&str> {
    json.get("op")
        .and_then(|o| o.as_str())
        .ok_or_else(|| Error::property(format!("missing `op` in {json}")))
}

fn parse_goal(json: &Json) -> Result<Expr> {
    match op(json)? {
        "objective" => {
            let goal = json
                .get("goal")
                .ok_or_else(|| Error::property("objective without `goal`"))?;
            parse_failure(goal)
        }
        other => Err(Error::property(format!(
            "unsupported goal operation `{other}`"
        ))),
    }
}

/// Parses a `state-condition`.
fn parse_failure(json: &Json) -> Result<Expr> {
    match op(json)? {
        "state-condition" => {
            let exp = json
                .get("exp")
                .ok_or_else(|| Error::property("state condition without `exp`"))?;
            Expr::from_json(exp)
        }
        other => Err(Error::property(format!(
            "unsupported condition operation `{other}`"
        ))),
    }
}

fn parse_start(
    json: &Json,
    declarations: Vec<Variable>,
    opts: &ModelOptions,
) -> Result<(InitKind, Box<dyn StateGenerator>)> {
    let op = json
        .get("op")
        .and_then(|o| o.as_str())
        .ok_or_else(|| Error::UnsupportedStartOp(json.to_string()))?;
    match op {
        "states-values" => {
            let pool = array(json, "values")?
                .iter()
                .map(|state| parse_state_values(state, &declarations))
                .collect::<Result<Vec<_>>>()?;
            let gen = FixedGenerator::new(&declarations, pool)?;
            Ok((InitKind::Fixed, Box::new(gen)))
        }
        "states-condition" | "state-condition" => {
            let exp = json
                .get("exp")
                .ok_or_else(|| Error::property("start condition without `exp`"))?;
            let condition = Expr::from_json(exp)?;
            let gen = ConstraintGenerator::new(&condition, declarations, opts.generator)?;
            Ok((InitKind::Constraint, Box::new(gen)))
        }
        other => Err(Error::UnsupportedStartOp(other.to_string())),
    }
}

fn parse_state_values(json: &Json, declarations: &[Variable]) -> Result<Vec<(String, Value)>> {
    array(json, "variables")?
        .iter()
        .map(|entry| {
            let name = str_field(entry, "var", "state value")?;
            let variable = declarations
                .iter()
                .find(|v| v.name == name)
                .ok_or_else(|| Error::UnknownVariable(name.to_string()))?;
            let value = Value::from_json(field(entry, "value", "state value")?, variable.tpe, name)?;
            Ok((name.to_string(), value))
        })
        .collect()
}
