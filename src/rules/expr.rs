// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use super::RuleError;
use serde_json::Value as Json;
use std::fmt::{Display, Formatter};

/// Boolean formula of a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleExpr {
    Lit(bool),
    /// An atom if one with this name is declared, otherwise a rule.
    Name(String),
    /// Always a rule, optionally negated.
    Ref { name: String, neg: bool },
    Not(Box<RuleExpr>),
    /// true if empty
    And(Vec<RuleExpr>),
    /// false if empty
    Or(Vec<RuleExpr>),
}

impl RuleExpr {
    pub fn from_json(json: &Json) -> Result<Self, RuleError> {
        let malformed = || RuleError::MalformedNode(json.to_string());
        match json {
            Json::Bool(b) => Ok(RuleExpr::Lit(*b)),
            Json::String(name) => Ok(RuleExpr::Name(name.clone())),
            Json::Object(node) => {
                if let Some(name) = node.get("ref") {
                    let name = match name {
                        Json::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    let neg = node.get("neg").and_then(|n| n.as_bool()).unwrap_or(false);
                    Ok(RuleExpr::Ref { name, neg })
                } else if let Some(inner) = node.get("NOT") {
                    Ok(RuleExpr::Not(Box::new(RuleExpr::from_json(inner)?)))
                } else if let Some(terms) = node.get("AND") {
                    let terms = terms.as_array().ok_or_else(malformed)?;
                    let terms = terms.iter().map(RuleExpr::from_json);
                    Ok(RuleExpr::And(terms.collect::<Result<_, _>>()?))
                } else if let Some(terms) = node.get("OR") {
                    let terms = terms.as_array().ok_or_else(malformed)?;
                    let terms = terms.iter().map(RuleExpr::from_json);
                    Ok(RuleExpr::Or(terms.collect::<Result<_, _>>()?))
                } else {
                    Err(malformed())
                }
            }
            _ => Err(malformed()),
        }
    }
}

impl Display for RuleExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let join = |f: &mut Formatter<'_>, terms: &[RuleExpr], op: &str| -> std::fmt::Result {
            write!(f, "(")?;
            for (i, t) in terms.iter().enumerate() {
                if i > 0 {
                    write!(f, " {op} ")?;
                }
                write!(f, "{t}")?;
            }
            write!(f, ")")
        };
        match self {
            RuleExpr::Lit(b) => write!(f, "{b}"),
            RuleExpr::Name(name) => write!(f, "{name}"),
            RuleExpr::Ref { name, neg: false } => write!(f, "{name}"),
            RuleExpr::Ref { name, neg: true } => write!(f, "¬{name}"),
            RuleExpr::Not(e) => write!(f, "¬{e}"),
            RuleExpr::And(terms) if terms.is_empty() => write!(f, "true"),
            RuleExpr::Or(terms) if terms.is_empty() => write!(f, "false"),
            RuleExpr::And(terms) => join(f, terms, "∧"),
            RuleExpr::Or(terms) => join(f, terms, "∨"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_nodes() {
        let e = RuleExpr::from_json(&json!({"OR": [
            {"AND": ["a", {"ref": "L1_0", "neg": true}]},
            {"NOT": "b"},
            false
        ]}))
        .unwrap();
        insta::assert_snapshot!(e.to_string(), @"((a ∧ ¬L1_0) ∨ ¬b ∨ false)");
        assert_eq!(
            RuleExpr::from_json(&json!({"AND": []})).unwrap().to_string(),
            "true"
        );
    }

    #[test]
    fn malformed_nodes() {
        for node in [json!(1), json!(null), json!({"XOR": []}), json!({"AND": "a"})] {
            assert!(matches!(
                RuleExpr::from_json(&node),
                Err(RuleError::MalformedNode(_))
            ));
        }
    }
}
