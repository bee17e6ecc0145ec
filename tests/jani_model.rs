// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use jani_sim::jani::{parse_files, parse_str, ModelFiles, ModelOptions, Value};
use jani_sim::sim::InitKind;
use jani_sim::Error;

const COUNTER: &str = r#"
{
  "constants": [],
  "variables": [
    {"name": "x", "type": {"kind": "bounded", "base": "int", "lower-bound": 0, "upper-bound": 3}},
    {"name": "y", "type": {"kind": "bounded", "base": "int", "lower-bound": 0, "upper-bound": 3}}
  ],
  "actions": [{"name": "inc"}],
  "automata": [{
    "name": "counter",
    "locations": [{"name": "l"}],
    "initial-locations": ["l"],
    "edges": [{
      "location": "l",
      "action": "inc",
      "guard": {"exp": {"op": "<", "left": "x", "right": 3}},
      "destinations": [{
        "location": "l",
        "probability": {"exp": 1.0},
        "assignments": [{"ref": "x", "value": {"op": "+", "left": "x", "right": 1}}]
      }]
    }]
  }]
}
"#;

const COUNTER_PROPERTY: &str = r#"
{"properties": [{"expression": {
  "start": {"op": "states-values", "values": [{"variables": [{"var": "x", "value": 0}, {"var": "y", "value": 0}]}]},
  "objective": {"op": "objective", "goal": {"op": "state-condition", "exp": {"op": "=", "left": "x", "right": 3}}},
  "reach": {"op": "state-condition", "exp": false}
}}]}
"#;

fn seeded() -> ModelOptions {
    ModelOptions {
        seed: Some(1),
        ..Default::default()
    }
}

fn counter_files() -> ModelFiles {
    ModelFiles {
        interface: Some("inputs/counter/interface.json".into()),
        property: Some("inputs/counter/property.json".into()),
        ..ModelFiles::new("inputs/counter/model.jani")
    }
}

#[test]
fn counter_steps() {
    let mut model = parse_str(COUNTER, COUNTER_PROPERTY, None, seeded()).unwrap();
    assert_eq!(model.init_kind(), InitKind::Fixed);
    let inc = model.action_by_name("inc").cloned().unwrap();

    let start = model.reset().unwrap();
    assert_eq!(start.to_vector(), vec![0.0, 0.0]);
    let next = model.transition(&start, &inc).unwrap().unwrap();
    assert_eq!(next.value("x"), Some(Value::Int(1)));
    assert_eq!(next.value("y"), Some(Value::Int(0)));
    assert!(!model.goal_reached(&next).unwrap());

    let top = start.with_value("x", Value::Int(3)).unwrap();
    assert!(model.goal_reached(&top).unwrap());
    assert!(model.transition(&top, &inc).unwrap().is_none());
    assert!(model.applicable_actions(&top).unwrap().is_empty());
    assert!(!model.failure_reached(&top).unwrap());
}

#[test]
fn counter_from_files() {
    let mut model = parse_files(&counter_files(), seeded()).unwrap();
    assert_eq!(model.action_count(), 2);
    // the interface lists `flip` first
    assert_eq!(model.action(0).unwrap().label, "flip");
    assert_eq!(model.action(1).unwrap().label, "inc");
    assert!(matches!(
        model.action(2),
        Err(Error::ActionIndex { index: 2, count: 2 })
    ));
    assert_eq!(model.edges_for_action(1).unwrap().len(), 1);
    let order: Vec<String> = model
        .constants_and_variables()
        .into_iter()
        .map(|v| v.name)
        .collect();
    assert_eq!(order, ["N", "x", "y"]);
    assert_eq!(model.variable("y").unwrap().index, 2);
    assert!(model.variable("z").is_err());

    let start = model.reset().unwrap();
    assert_eq!(start.to_vector(), vec![3.0, 0.0, 0.0]);
    assert_eq!(start.variable_info(), "x = 0, y = 0");
    assert_eq!(start.to_string(), "N=3,x=0,y=0");

    let flip = model.action_by_name("flip").cloned().unwrap();
    let mut outcomes: Vec<i64> = model
        .all_successors(&start, &flip)
        .unwrap()
        .iter()
        .filter_map(|s| match s.value("y") {
            Some(Value::Int(y)) => Some(y),
            _ => None,
        })
        .collect();
    outcomes.sort();
    assert_eq!(outcomes, [0, 1]);
    // sampling picks one destination per enabled edge
    assert_eq!(model.successors(&start, &flip).unwrap().len(), 1);

    let unsafe_state = start.with_value("y", Value::Int(3)).unwrap();
    assert!(model.failure_reached(&unsafe_state).unwrap());
    let applicable: Vec<&str> = model
        .applicable_actions(&unsafe_state)
        .unwrap()
        .iter()
        .map(|a| a.label.as_str())
        .collect();
    assert_eq!(applicable, ["inc"]);
}

#[test]
fn property_with_file_references() {
    let files = ModelFiles {
        property: Some("inputs/counter/property_files.json".into()),
        ..ModelFiles::new("inputs/counter/model.jani")
    };
    let mut model = parse_files(&files, seeded()).unwrap();
    for _ in 0..10 {
        let x = model.reset().unwrap().value("x");
        assert!(matches!(x, Some(Value::Int(1 | 2))), "{x:?}");
    }
}

#[test]
fn separate_condition_files() {
    let files = ModelFiles {
        start: Some("inputs/counter/start.json".into()),
        goal: Some("inputs/counter/goal.json".into()),
        failure: Some("inputs/counter/failure.json".into()),
        ..ModelFiles::new("inputs/counter/model.jani")
    };
    let mut model = parse_files(&files, seeded()).unwrap();
    let start = model.reset().unwrap();
    assert!(!model.goal_reached(&start).unwrap());

    let incomplete = ModelFiles {
        goal: None,
        ..files
    };
    assert!(matches!(
        parse_files(&incomplete, seeded()),
        Err(Error::Property(_))
    ));
    let missing = ModelFiles {
        property: Some("inputs/counter/does_not_exist.json".into()),
        ..ModelFiles::new("inputs/counter/model.jani")
    };
    assert!(matches!(
        parse_files(&missing, seeded()),
        Err(Error::Io { .. })
    ));
}

#[test]
fn seeded_runs_are_reproducible() {
    let opts = ModelOptions {
        seed: Some(42),
        random_init: true,
        ..Default::default()
    };
    let run = || {
        let mut model = parse_files(&counter_files(), opts).unwrap();
        assert_eq!(model.init_kind(), InitKind::Random);
        let flip = model.action_by_name("flip").cloned().unwrap();
        let mut trace = vec![];
        for _ in 0..5 {
            let state = model.reset().unwrap();
            trace.push(state.to_vector());
            if let Some(next) = model.transition(&state, &flip).unwrap() {
                trace.push(next.to_vector());
            }
        }
        trace
    };
    let trace = run();
    assert_eq!(trace, run());
    for vec in trace.iter() {
        assert_eq!(vec[0], 3.0);
        assert!(vec[1..].iter().all(|v| (0.0..=3.0).contains(v)));
    }
}

#[test]
fn probabilities_need_to_sum_to_one() {
    let model = COUNTER.replace(r#""probability": {"exp": 1.0}"#, r#""probability": {"exp": 0.7}"#);
    assert!(matches!(
        parse_str(&model, COUNTER_PROPERTY, None, seeded()),
        Err(Error::InvalidDistribution { .. })
    ));
}

#[test]
fn exactly_one_automaton() {
    let mut json: serde_json::Value = serde_json::from_str(COUNTER).unwrap();
    let automaton = json["automata"][0].clone();
    json["automata"].as_array_mut().unwrap().push(automaton);
    assert!(matches!(
        parse_str(&json.to_string(), COUNTER_PROPERTY, None, seeded()),
        Err(Error::AutomataCount(2))
    ));
}

#[test]
fn unsupported_start_operation() {
    let property = COUNTER_PROPERTY.replace("states-values", "states-random");
    assert!(matches!(
        parse_str(COUNTER, &property, None, seeded()),
        Err(Error::UnsupportedStartOp(op)) if op == "states-random"
    ));
}

#[test]
fn unsupported_variable_kind() {
    let model = COUNTER.replacen(r#""kind": "bounded""#, r#""kind": "clock""#, 1);
    assert!(matches!(
        parse_str(&model, COUNTER_PROPERTY, None, seeded()),
        Err(Error::UnsupportedVariableKind { .. })
    ));
}

#[test]
fn interface_entries_are_required() {
    let interface = r#"{"input": ["x"], "output": ["inc"]}"#;
    assert!(matches!(
        parse_str(COUNTER, COUNTER_PROPERTY, Some(interface), seeded()),
        Err(Error::MissingInterfaceEntry { kind: "variable", name }) if name == "y"
    ));
    let interface = r#"{"input": ["y", "x"], "output": ["inc"]}"#;
    let mut model = parse_str(COUNTER, COUNTER_PROPERTY, Some(interface), seeded()).unwrap();
    let start = model.reset().unwrap().with_value("x", Value::Int(2)).unwrap();
    assert_eq!(start.to_vector(), vec![0.0, 2.0]);
}
