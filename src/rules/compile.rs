// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use super::{RuleError, RuleExpr};
use indexmap::{IndexMap, IndexSet};

/// Evaluates a rule given the truth value of every atom (by atom slot) and the values of
/// all rules computed so far (by rule slot).
pub(crate) type RuleFn =
    Box<dyn Fn(&[bool], &[Option<bool>]) -> Result<bool, RuleError> + Send + Sync>;

fn boxed<F>(f: F) -> RuleFn
where
    F: Fn(&[bool], &[Option<bool>]) -> Result<bool, RuleError> + Send + Sync + 'static,
{
    Box::new(f)
}

/// Position of a rule in the canonical evaluation order together with its layer.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RuleSlot {
    pub slot: usize,
    pub layer: u32,
}

/// Names visible while compiling one rule.
pub(crate) struct Scope<'a> {
    pub rule: &'a str,
    pub layer: u32,
    pub atoms: &'a IndexSet<String>,
    pub rules: &'a IndexMap<String, RuleSlot>,
}

impl<'a> Scope<'a> {
    fn rule_slot(&self, name: &str) -> Result<usize, RuleError> {
        let target = self
            .rules
            .get(name)
            .ok_or_else(|| RuleError::UnknownName {
                rule: self.rule.to_string(),
                name: name.to_string(),
            })?;
        // only rules of earlier layers have been computed
        if target.layer >= self.layer {
            return Err(RuleError::ForwardReference {
                rule: self.rule.to_string(),
                reference: name.to_string(),
            });
        }
        Ok(target.slot)
    }
}

/// Translates the formula once into nested closures that index directly into the atom
/// and rule values.
pub(crate) fn compile(expr: &RuleExpr, scope: &Scope) -> Result<RuleFn, RuleError> {
    match expr {
        RuleExpr::Lit(value) => {
            let value = *value;
            Ok(boxed(move |_, _| Ok(value)))
        }
        RuleExpr::Name(name) => match scope.atoms.get_index_of(name) {
            Some(atom) => Ok(boxed(move |atoms, _| Ok(atoms[atom]))),
            None => rule_value(scope, name, false),
        },
        RuleExpr::Ref { name, neg } => rule_value(scope, name, *neg),
        RuleExpr::Not(inner) => {
            let inner = compile(inner, scope)?;
            Ok(boxed(move |atoms, rules| Ok(!inner(atoms, rules)?)))
        }
        RuleExpr::And(terms) => {
            let terms = compile_all(terms, scope)?;
            Ok(boxed(move |atoms, rules| {
                for term in terms.iter() {
                    if !term(atoms, rules)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }))
        }
        RuleExpr::Or(terms) => {
            let terms = compile_all(terms, scope)?;
            Ok(boxed(move |atoms, rules| {
                for term in terms.iter() {
                    if term(atoms, rules)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }))
        }
    }
}

fn compile_all(terms: &[RuleExpr], scope: &Scope) -> Result<Vec<RuleFn>, RuleError> {
    terms.iter().map(|t| compile(t, scope)).collect()
}

fn rule_value(scope: &Scope, name: &str, neg: bool) -> Result<RuleFn, RuleError> {
    let slot = scope.rule_slot(name)?;
    let name = name.to_string();
    Ok(boxed(move |_, rules| match rules[slot] {
        Some(value) => Ok(value != neg),
        None => Err(RuleError::MissingRuleValue(name.clone())),
    }))
}
