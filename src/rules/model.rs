// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use super::compile::{compile, RuleFn, RuleSlot, Scope};
use super::{RuleError, RuleExpr};
use indexmap::{IndexMap, IndexSet};
use serde_json::Value as Json;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Result of evaluating a [`SymbolicModel`].
#[derive(Debug, Clone, PartialEq)]
pub struct Forward {
    /// value of every rule in evaluation order
    pub rule_values: IndexMap<String, bool>,
    /// values of the rules in the last layer, these are the features of the linear head
    pub last_layer: IndexMap<String, bool>,
    pub class_scores: IndexMap<String, f64>,
}

/// Layered boolean rules over atoms, followed by a linear classifier over the rules of the
/// last layer. Rules are named `L{layer}_{ordinal}` and may only refer to atoms and to rules
/// of earlier layers.
pub struct SymbolicModel {
    atoms: IndexSet<String>,
    /// rules in evaluation order
    rules: IndexMap<String, RuleExpr>,
    /// rule slots per layer, ordered by layer
    layers: Vec<Vec<usize>>,
    compiled: Vec<RuleFn>,
    weights: IndexMap<String, IndexMap<String, f64>>,
    bias: IndexMap<String, f64>,
}

impl SymbolicModel {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RuleError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| RuleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_str(&text)
    }

    pub fn parse_str(text: &str) -> Result<Self, RuleError> {
        let json: Json = serde_json::from_str(text)?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &Json) -> Result<Self, RuleError> {
        let atoms: IndexSet<String> = match json.get("atoms").and_then(|a| a.as_array()) {
            None => IndexSet::new(),
            Some(names) => names
                .iter()
                .map(|name| {
                    name.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| RuleError::MalformedNode(name.to_string()))
                })
                .collect::<Result<_, _>>()?,
        };
        if atoms.is_empty() {
            return Err(RuleError::EmptyAtoms);
        }

        let rules_json = json
            .get("rules")
            .and_then(|r| r.as_object())
            .filter(|r| !r.is_empty())
            .ok_or(RuleError::EmptyRules)?;
        let mut rules = rules_json
            .iter()
            .map(|(name, expr)| {
                let key = parse_rule_name(name)?;
                Ok((key, name.clone(), RuleExpr::from_json(expr)?))
            })
            .collect::<Result<Vec<_>, RuleError>>()?;
        rules.sort_by(|(a, a_name, _), (b, b_name, _)| (a, a_name).cmp(&(b, b_name)));

        let linear = json.get("linear");
        let weights = parse_weights(linear.and_then(|l| l.get("weights")))?;
        let bias = parse_scalars(linear.and_then(|l| l.get("bias")), "linear.bias")?;

        // slots follow the canonical order, layers group consecutive slots
        let mut slots: IndexMap<String, RuleSlot> = IndexMap::with_capacity(rules.len());
        let mut layers: Vec<Vec<usize>> = vec![];
        let mut current_layer = None;
        for (slot, ((layer, _), name, _)) in rules.iter().enumerate() {
            if current_layer != Some(*layer) {
                layers.push(vec![]);
                current_layer = Some(*layer);
            }
            if let Some(last) = layers.last_mut() {
                last.push(slot);
            }
            slots.insert(
                name.clone(),
                RuleSlot {
                    slot,
                    layer: *layer,
                },
            );
        }

        let compiled = rules
            .iter()
            .map(|((layer, _), name, expr)| {
                let scope = Scope {
                    rule: name,
                    layer: *layer,
                    atoms: &atoms,
                    rules: &slots,
                };
                compile(expr, &scope)
            })
            .collect::<Result<Vec<_>, RuleError>>()?;
        debug!(
            "loaded symbolic model with {} atoms, {} rules in {} layers and {} classes",
            atoms.len(),
            rules.len(),
            layers.len(),
            weights.len()
        );

        Ok(Self {
            atoms,
            rules: rules
                .into_iter()
                .map(|(_, name, expr)| (name, expr))
                .collect(),
            layers,
            compiled,
            weights,
            bias,
        })
    }

    pub fn atoms(&self) -> impl Iterator<Item = &str> {
        self.atoms.iter().map(|a| a.as_str())
    }

    pub fn rule(&self, name: &str) -> Option<&RuleExpr> {
        self.rules.get(name)
    }

    /// Rule names grouped by layer, in evaluation order.
    pub fn layers(&self) -> Vec<Vec<&str>> {
        self.layers
            .iter()
            .map(|layer| {
                layer
                    .iter()
                    .filter_map(|slot| self.rules.get_index(*slot).map(|(n, _)| n.as_str()))
                    .collect()
            })
            .collect()
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.weights.keys().map(|c| c.as_str())
    }

    /// Evaluates all rules layer by layer and scores every class. Every declared atom needs
    /// a truth value, additional entries are ignored.
    pub fn forward(&self, atom_values: &HashMap<String, bool>) -> Result<Forward, RuleError> {
        let missing: Vec<String> = self
            .atoms
            .iter()
            .filter(|a| !atom_values.contains_key(*a))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(RuleError::MissingAtom(missing));
        }
        let atoms: Vec<bool> = self
            .atoms
            .iter()
            .map(|a| atom_values.get(a).copied().unwrap_or_default())
            .collect();

        let mut values: Vec<Option<bool>> = vec![None; self.compiled.len()];
        for layer in self.layers.iter() {
            for &slot in layer.iter() {
                values[slot] = Some((self.compiled[slot])(&atoms, &values)?);
            }
        }

        let value_of = |slot: usize| values[slot].unwrap_or_default();
        let name_of = |slot: usize| {
            self.rules
                .get_index(slot)
                .map(|(n, _)| n.clone())
                .unwrap_or_default()
        };
        let rule_values: IndexMap<String, bool> = (0..values.len())
            .map(|slot| (name_of(slot), value_of(slot)))
            .collect();
        let last_layer: IndexMap<String, bool> = self
            .layers
            .last()
            .map(|layer| {
                layer
                    .iter()
                    .map(|&slot| (name_of(slot), value_of(slot)))
                    .collect()
            })
            .unwrap_or_default();

        let class_scores = self
            .weights
            .iter()
            .map(|(class, weights)| {
                let bias = self.bias.get(class).copied().unwrap_or(0.0);
                let score = weights.iter().fold(bias, |acc, (feature, w)| {
                    let active = last_layer.get(feature).copied().unwrap_or(false);
                    acc + if active { *w } else { 0.0 }
                });
                (class.clone(), score)
            })
            .collect();

        Ok(Forward {
            rule_values,
            last_layer,
            class_scores,
        })
    }
}

/// Splits `L{layer}_{ordinal}` into its two numbers.
fn parse_rule_name(name: &str) -> Result<(u32, u32), RuleError> {
    let invalid = || RuleError::RuleName(name.to_string());
    let (layer, ordinal) = name
        .strip_prefix('L')
        .and_then(|n| n.split_once('_'))
        .ok_or_else(invalid)?;
    let layer = layer.parse().map_err(|_| invalid())?;
    let ordinal = ordinal.parse().map_err(|_| invalid())?;
    Ok((layer, ordinal))
}

fn parse_scalars(json: Option<&Json>, what: &str) -> Result<IndexMap<String, f64>, RuleError> {
    let map = json
        .and_then(|j| j.as_object())
        .filter(|m| !m.is_empty())
        .ok_or_else(|| RuleError::MissingLinear(format!("`{what}` is missing or empty")))?;
    map.iter()
        .map(|(key, value)| {
            let value = value.as_f64().ok_or_else(|| {
                RuleError::MissingLinear(format!("`{what}.{key}` is not a number"))
            })?;
            Ok((key.clone(), value))
        })
        .collect()
}

fn parse_weights(
    json: Option<&Json>,
) -> Result<IndexMap<String, IndexMap<String, f64>>, RuleError> {
    let map = json
        .and_then(|j| j.as_object())
        .filter(|m| !m.is_empty())
        .ok_or_else(|| RuleError::MissingLinear("`linear.weights` is missing or empty".into()))?;
    map.iter()
        .map(|(class, weights)| {
            let what = format!("linear.weights.{class}");
            let weights = match weights.as_object() {
                Some(w) if w.is_empty() => IndexMap::new(),
                _ => parse_scalars(Some(weights), &what)?,
            };
            Ok((class.clone(), weights))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_names() {
        assert_eq!(parse_rule_name("L1_0").unwrap(), (1, 0));
        assert_eq!(parse_rule_name("L12_34").unwrap(), (12, 34));
        for bad in ["1_0", "L1", "L_0", "Lx_1", "L1_y"] {
            assert!(matches!(parse_rule_name(bad), Err(RuleError::RuleName(_))), "{bad}");
        }
    }

    #[test]
    fn canonical_order() {
        let model = SymbolicModel::parse_str(
            r#"{
            "atoms": ["a", "b"],
            "rules": {
                "L2_0": {"OR": ["L1_10", "L1_2"]},
                "L1_10": "a",
                "L1_2": {"NOT": "b"}
            },
            "linear": {"weights": {"c": {"L2_0": 2.5}}, "bias": {"c": -1.0}}
        }"#,
        )
        .unwrap();
        // ordinals are compared as numbers
        assert_eq!(model.layers(), vec![vec!["L1_2", "L1_10"], vec!["L2_0"]]);
        let atoms = HashMap::from([("a".to_string(), false), ("b".to_string(), false)]);
        let out = model.forward(&atoms).unwrap();
        assert_eq!(
            out.rule_values.keys().collect::<Vec<_>>(),
            ["L1_2", "L1_10", "L2_0"]
        );
        assert_eq!(out.last_layer, IndexMap::from([("L2_0".to_string(), true)]));
        assert_eq!(out.class_scores["c"], 1.5);
    }

    #[test]
    fn load_errors() {
        let err = |text: &str| SymbolicModel::parse_str(text).err().unwrap();
        assert!(matches!(
            err(r#"{"atoms": [], "rules": {"L1_0": true}, "linear": {"weights": {"c": {}}, "bias": {"c": 0}}}"#),
            RuleError::EmptyAtoms
        ));
        assert!(matches!(
            err(r#"{"atoms": ["a", 3], "rules": {"L1_0": "a"}, "linear": {"weights": {"c": {}}, "bias": {"c": 0}}}"#),
            RuleError::MalformedNode(node) if node == "3"
        ));
        assert!(matches!(
            err(r#"{"atoms": ["a"], "rules": {}, "linear": {"weights": {"c": {}}, "bias": {"c": 0}}}"#),
            RuleError::EmptyRules
        ));
        assert!(matches!(
            err(r#"{"atoms": ["a"], "rules": {"L1_0": "a"}, "linear": {"weights": {"c": {"L1_0": 1}}}}"#),
            RuleError::MissingLinear(_)
        ));
        assert!(matches!(
            err(r#"{"atoms": ["a"], "rules": {"rule": "a"}, "linear": {"weights": {"c": {}}, "bias": {"c": 0}}}"#),
            RuleError::RuleName(_)
        ));
        assert!(matches!(err("{"), RuleError::Json(_)));
    }
}
