// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::jani::{Type, Value};
use easy_smt as smt;

/// Interprets a value returned by `get-value`. Handles negative numbers `(- 3)` and
/// rationals `(/ 1.0 3.0)` as printed by z3.
pub fn parse_smt_value(smt_ctx: &smt::Context, expr: smt::SExpr, tpe: Type) -> Option<Value> {
    match tpe {
        Type::Bool => match smt_ctx.get(expr) {
            smt::SExprData::Atom("true") => Some(Value::Bool(true)),
            smt::SExprData::Atom("false") => Some(Value::Bool(false)),
            // unwraps expressions like: (true)
            smt::SExprData::List([inner]) => parse_smt_value(smt_ctx, *inner, tpe),
            _ => None,
        },
        Type::Int => parse_smt_int(smt_ctx, expr).map(Value::Int),
        Type::Real => parse_smt_real(smt_ctx, expr).map(Value::Real),
    }
}

fn parse_smt_int(smt_ctx: &smt::Context, expr: smt::SExpr) -> Option<i64> {
    match smt_ctx.get(expr) {
        smt::SExprData::Atom(value) => value.parse().ok(),
        smt::SExprData::List([minus, inner]) => {
            parse_smt_id(smt_ctx, *minus, "-")?;
            parse_smt_int(smt_ctx, *inner).map(|v| -v)
        }
        smt::SExprData::List([inner]) => parse_smt_int(smt_ctx, *inner),
        _ => None,
    }
}

fn parse_smt_real(smt_ctx: &smt::Context, expr: smt::SExpr) -> Option<f64> {
    match smt_ctx.get(expr) {
        smt::SExprData::Atom(value) => value.trim_end_matches('?').parse().ok(),
        smt::SExprData::List([minus, inner]) => {
            parse_smt_id(smt_ctx, *minus, "-")?;
            parse_smt_real(smt_ctx, *inner).map(|v| -v)
        }
        smt::SExprData::List([div, num, den]) => {
            parse_smt_id(smt_ctx, *div, "/")?;
            let num = parse_smt_real(smt_ctx, *num)?;
            let den = parse_smt_real(smt_ctx, *den)?;
            Some(num / den)
        }
        smt::SExprData::List([inner]) => parse_smt_real(smt_ctx, *inner),
        _ => None,
    }
}

fn parse_smt_id(smt_ctx: &smt::Context, expr: smt::SExpr, expected: &str) -> Option<()> {
    match smt_ctx.get(expr) {
        smt::SExprData::Atom(name) if name == expected => Some(()),
        _ => None,
    }
}
