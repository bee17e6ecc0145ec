// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::error::{Error, Result};
use crate::jani::{BinOp, Expr, Type, Value, Variable};
use easy_smt as smt;
use indexmap::{IndexMap, IndexSet};
use std::borrow::Cow;

/// An expression lowered into the solver's term language.
#[derive(Debug, Clone)]
pub struct Clause {
    pub term: smt::SExpr,
    pub sort: Type,
    /// Bounds of every referenced symbol and non-zero constraints for every divisor.
    pub side_conditions: Vec<smt::SExpr>,
    /// Referenced symbols in order of first occurrence.
    pub symbols: Vec<String>,
}

pub fn convert_sort(smt_ctx: &smt::Context, tpe: Type) -> smt::SExpr {
    match tpe {
        Type::Bool => smt_ctx.bool_sort(),
        Type::Int => smt_ctx.atom("Int"),
        Type::Real => smt_ctx.atom("Real"),
    }
}

/// Lowers `expr` into linear integer / real arithmetic. `declarations` provides the type,
/// bounds and, for constants, the value of every symbol that may be referenced.
pub fn convert_expr(
    smt_ctx: &smt::Context,
    declarations: &[Variable],
    expr: &Expr,
) -> Result<Clause> {
    let mut conv = Converter {
        smt_ctx,
        declarations: declarations.iter().map(|v| (v.name.as_str(), v)).collect(),
        symbols: IndexSet::new(),
        side_conditions: vec![],
    };
    let (term, sort) = conv.convert(expr)?;
    Ok(Clause {
        term,
        sort,
        side_conditions: conv.side_conditions,
        symbols: conv.symbols.into_iter().collect(),
    })
}

struct Converter<'a> {
    smt_ctx: &'a smt::Context,
    declarations: IndexMap<&'a str, &'a Variable>,
    symbols: IndexSet<String>,
    side_conditions: Vec<smt::SExpr>,
}

impl<'a> Converter<'a> {
    fn convert(&mut self, expr: &Expr) -> Result<(smt::SExpr, Type)> {
        match expr {
            Expr::Var(name) => self.symbol(name),
            Expr::Const(value) => Ok((convert_value(self.smt_ctx, *value)?, value.tpe())),
            Expr::Not(e) => {
                let (e, sort) = self.convert(e)?;
                self.expect_bool(expr, sort)?;
                Ok((self.smt_ctx.not(e), Type::Bool))
            }
            Expr::Binary(op, a, b) => {
                let (a, a_sort) = self.convert(a)?;
                let (b, b_sort) = self.convert(b)?;
                self.bin_op(expr, *op, (a, a_sort), (b, b_sort))
            }
        }
    }

    fn symbol(&mut self, name: &str) -> Result<(smt::SExpr, Type)> {
        let variable = *self
            .declarations
            .get(name)
            .ok_or_else(|| Error::UnknownVariable(name.to_string()))?;
        let sym = self.smt_ctx.atom(escape_smt_identifier(name));
        // bounds are only needed once per symbol
        if self.symbols.insert(name.to_string()) {
            if let Some(bound) = self.bound(variable, sym)? {
                self.side_conditions.push(bound);
            }
        }
        Ok((sym, variable.tpe))
    }

    fn bound(&self, variable: &Variable, sym: smt::SExpr) -> Result<Option<smt::SExpr>> {
        let ctx = self.smt_ctx;
        if variable.constant {
            let value = convert_value(ctx, variable.value)?;
            return Ok(Some(ctx.eq(sym, value)));
        }
        if variable.tpe == Type::Bool {
            return Ok(None);
        }
        let lower = variable
            .lower_bound
            .map(|lo| convert_value(ctx, lo).map(|lo| ctx.list(vec![ctx.atom(">="), sym, lo])))
            .transpose()?;
        let upper = variable
            .upper_bound
            .map(|hi| convert_value(ctx, hi).map(|hi| ctx.list(vec![ctx.atom("<="), sym, hi])))
            .transpose()?;
        match (lower, upper) {
            (Some(lo), Some(hi)) => Ok(Some(ctx.and(lo, hi))),
            (Some(bound), None) | (None, Some(bound)) => Ok(Some(bound)),
            (None, None) => Err(Error::UnboundedSymbol(variable.name.clone())),
        }
    }

    fn bin_op(
        &mut self,
        expr: &Expr,
        op: BinOp,
        (a, a_sort): (smt::SExpr, Type),
        (b, b_sort): (smt::SExpr, Type),
    ) -> Result<(smt::SExpr, Type)> {
        let ctx = self.smt_ctx;
        match op {
            BinOp::And | BinOp::Or => {
                self.expect_bool(expr, a_sort)?;
                self.expect_bool(expr, b_sort)?;
                let res = if op == BinOp::And {
                    ctx.and(a, b)
                } else {
                    ctx.or(a, b)
                };
                Ok((res, Type::Bool))
            }
            BinOp::Eq | BinOp::Ne => {
                let (a, b) = match (a_sort, b_sort) {
                    (Type::Bool, Type::Bool) => (a, b),
                    (Type::Bool, _) | (_, Type::Bool) => {
                        return Err(mismatch(expr, "operands of the same type"))
                    }
                    _ => self.unify(a, a_sort, b, b_sort).0,
                };
                let eq = ctx.eq(a, b);
                Ok((if op == BinOp::Eq { eq } else { ctx.not(eq) }, Type::Bool))
            }
            BinOp::Le | BinOp::Lt | BinOp::Ge | BinOp::Gt => {
                self.expect_number(expr, a_sort)?;
                self.expect_number(expr, b_sort)?;
                let ((a, b), _) = self.unify(a, a_sort, b, b_sort);
                let name = match op {
                    BinOp::Le => "<=",
                    BinOp::Lt => "<",
                    BinOp::Ge => ">=",
                    _ => ">",
                };
                Ok((ctx.list(vec![ctx.atom(name), a, b]), Type::Bool))
            }
            BinOp::Div => {
                self.expect_number(expr, a_sort)?;
                self.expect_number(expr, b_sort)?;
                // `/` is real division
                let a = to_real(ctx, a, a_sort);
                let b = to_real(ctx, b, b_sort);
                let zero = ctx.atom("0.0");
                self.side_conditions.push(ctx.not(ctx.eq(b, zero)));
                Ok((ctx.list(vec![ctx.atom("/"), a, b]), Type::Real))
            }
            BinOp::Add | BinOp::Sub | BinOp::Mul => {
                self.expect_number(expr, a_sort)?;
                self.expect_number(expr, b_sort)?;
                let ((a, b), sort) = self.unify(a, a_sort, b, b_sort);
                let name = match op {
                    BinOp::Add => "+",
                    BinOp::Sub => "-",
                    _ => "*",
                };
                Ok((ctx.list(vec![ctx.atom(name), a, b]), sort))
            }
        }
    }

    /// Promotes an int operand to real if the other operand is real.
    fn unify(
        &self,
        a: smt::SExpr,
        a_sort: Type,
        b: smt::SExpr,
        b_sort: Type,
    ) -> ((smt::SExpr, smt::SExpr), Type) {
        if a_sort == b_sort {
            ((a, b), a_sort)
        } else {
            let a = to_real(self.smt_ctx, a, a_sort);
            let b = to_real(self.smt_ctx, b, b_sort);
            ((a, b), Type::Real)
        }
    }

    fn expect_bool(&self, expr: &Expr, sort: Type) -> Result<()> {
        if sort == Type::Bool {
            Ok(())
        } else {
            Err(mismatch(expr, "bool"))
        }
    }

    fn expect_number(&self, expr: &Expr, sort: Type) -> Result<()> {
        if sort == Type::Bool {
            Err(mismatch(expr, "numbers"))
        } else {
            Ok(())
        }
    }
}

fn mismatch(expr: &Expr, expected: &'static str) -> Error {
    Error::TypeMismatch {
        expr: expr.to_string(),
        expected,
    }
}

fn to_real(smt_ctx: &smt::Context, e: smt::SExpr, sort: Type) -> smt::SExpr {
    if sort == Type::Int {
        smt_ctx.list(vec![smt_ctx.atom("to_real"), e])
    } else {
        e
    }
}

/// SMT-LIB literal for a value. Negative numbers are written as `(- n)`.
pub(crate) fn convert_value(smt_ctx: &smt::Context, value: Value) -> Result<smt::SExpr> {
    let negate = |e: smt::SExpr| smt_ctx.list(vec![smt_ctx.atom("-"), e]);
    match value {
        Value::Bool(true) => Ok(smt_ctx.true_()),
        Value::Bool(false) => Ok(smt_ctx.false_()),
        Value::Int(i) => {
            let abs = smt_ctx.atom(i.unsigned_abs().to_string());
            Ok(if i < 0 { negate(abs) } else { abs })
        }
        Value::Real(r) if r.is_finite() => {
            let mut lit = format!("{}", r.abs());
            if !lit.contains('.') {
                lit.push_str(".0");
            }
            let abs = smt_ctx.atom(lit);
            Ok(if r < 0.0 { negate(abs) } else { abs })
        }
        Value::Real(r) => Err(Error::InvalidValue {
            name: "literal".to_string(),
            msg: format!("`{r}` cannot be represented in the solver"),
        }),
    }
}

fn is_simple_smt_identifier(id: &str) -> bool {
    if id.is_empty() {
        return false;
    }
    let mut is_first = true;
    for cc in id.chars() {
        if !cc.is_ascii() {
            return false;
        }
        let is_alpha = cc.is_ascii_alphabetic();
        let is_num = cc.is_ascii_digit();
        let is_other_allowed_char = matches!(
            cc,
            '+' | '-' | '/' | '*' | '=' | '%' | '?' | '!' | '.' | '$' | '_' | '~' | '&' | '^'
                | '<' | '>' | '@'
        );
        if !(is_alpha || is_num && !is_first || is_other_allowed_char) {
            return false;
        }
        is_first = false;
    }
    true
}

pub fn escape_smt_identifier(id: &str) -> Cow<'_, str> {
    if is_simple_smt_identifier(id) {
        Cow::Borrowed(id)
    } else {
        Cow::Owned(format!("|{id}|"))
    }
}
