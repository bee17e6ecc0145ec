// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use jani_sim::jani::{parse_files, ModelFiles, ModelOptions};
use jani_sim::policy::{AtomEncoder, BoundedAtomEncoder, RulePolicy};
use jani_sim::rules::{RuleError, SymbolicModel};
use std::collections::HashMap;

const AND_MODEL: &str = r#"
{
  "atoms": ["a", "b"],
  "rules": {"L1_0": {"AND": ["a", "b"]}},
  "linear": {"weights": {"class_0": {"L1_0": 1.0}}, "bias": {"class_0": 0.0}}
}
"#;

fn atoms(values: &[(&str, bool)]) -> HashMap<String, bool> {
    values.iter().map(|(n, v)| (n.to_string(), *v)).collect()
}

#[test]
fn single_and_rule() {
    let model = SymbolicModel::parse_str(AND_MODEL).unwrap();
    let out = model.forward(&atoms(&[("a", true), ("b", true)])).unwrap();
    assert_eq!(out.rule_values["L1_0"], true);
    assert_eq!(out.last_layer["L1_0"], true);
    assert_eq!(out.class_scores["class_0"], 1.0);

    let out = model.forward(&atoms(&[("a", true), ("b", false)])).unwrap();
    assert_eq!(out.rule_values["L1_0"], false);
    assert_eq!(out.class_scores["class_0"], 0.0);

    // additional atoms are ignored
    let out = model
        .forward(&atoms(&[("a", true), ("b", true), ("c", false)]))
        .unwrap();
    assert_eq!(out.class_scores["class_0"], 1.0);
}

#[test]
fn missing_atom() {
    let model = SymbolicModel::parse_str(AND_MODEL).unwrap();
    let err = model.forward(&atoms(&[("a", true)])).unwrap_err();
    assert!(matches!(err, RuleError::MissingAtom(missing) if missing == ["b"]));
}

#[test]
fn references_are_checked_at_load_time() {
    let forward = r#"{
        "atoms": ["a"],
        "rules": {"L1_0": {"ref": "L2_0"}, "L2_0": "a"},
        "linear": {"weights": {"c": {"L2_0": 1.0}}, "bias": {"c": 0.0}}
    }"#;
    assert!(matches!(
        SymbolicModel::parse_str(forward),
        Err(RuleError::ForwardReference { rule, reference }) if rule == "L1_0" && reference == "L2_0"
    ));
    let unknown = r#"{
        "atoms": ["a"],
        "rules": {"L1_0": {"OR": ["a", "z"]}},
        "linear": {"weights": {"c": {"L1_0": 1.0}}, "bias": {"c": 0.0}}
    }"#;
    assert!(matches!(
        SymbolicModel::parse_str(unknown),
        Err(RuleError::UnknownName { name, .. }) if name == "z"
    ));
}

#[test]
fn rule_policy_on_counter() {
    let rules = SymbolicModel::load("inputs/counter/rules.json").unwrap();
    assert_eq!(
        rules.layers(),
        vec![vec!["L1_0", "L1_1", "L1_2"], vec!["L2_0", "L2_1"]]
    );
    let files = ModelFiles {
        interface: Some("inputs/counter/interface.json".into()),
        property: Some("inputs/counter/property.json".into()),
        ..ModelFiles::new("inputs/counter/model.jani")
    };
    let opts = ModelOptions {
        seed: Some(5),
        ..Default::default()
    };
    let mut model = parse_files(&files, opts).unwrap();
    let encoder = BoundedAtomEncoder::new(&model.constants_and_variables()).unwrap();
    assert_eq!(
        encoder.atoms(),
        ["1_1", "1_2", "1_3", "2_1", "2_2", "2_3"]
    );
    let policy = RulePolicy::new(rules, encoder, model.actions());

    // at the start `class_1` scores highest, which is the second interface output
    let start = model.reset().unwrap();
    let applicable = model.applicable_actions(&start).unwrap();
    assert_eq!(policy.act(&start, &applicable).unwrap().label, "inc");

    // once x reached the top, `inc` is disabled and the policy flips
    let mut state = start;
    for _ in 0..3 {
        let action = {
            let applicable = model.applicable_actions(&state).unwrap();
            policy.act(&state, &applicable).unwrap()
        };
        assert_eq!(action.label, "inc");
        state = model.transition(&state, &action).unwrap().unwrap();
    }
    assert!(model.goal_reached(&state).unwrap());
    let applicable = model.applicable_actions(&state).unwrap();
    assert_eq!(policy.act(&state, &applicable).unwrap().label, "flip");

    assert!(matches!(
        SymbolicModel::load("inputs/counter/missing.json"),
        Err(RuleError::Io { .. })
    ));
}
