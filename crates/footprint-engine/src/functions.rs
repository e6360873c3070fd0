//! Built-in worksheet functions.
//!
//! Each function is described by a [`FunctionSpec`] in a static table and
//! looked up through a lazily built registry keyed by uppercase name.
//! Implementations receive their arguments unevaluated so conditional
//! functions can skip branches.

use std::collections::HashMap;
use std::sync::OnceLock;

use footprint_model::CellRef;

use crate::ast::CompiledExpr;
use crate::eval::{EvalValue, Reference};
use crate::value::{ErrorKind, Value};

/// Evaluation services a function implementation may call back into.
pub trait FunctionContext {
    /// Evaluate an argument expression, keeping references unresolved.
    fn eval_arg(&mut self, expr: &CompiledExpr) -> EvalValue;

    /// Current value of a single cell.
    fn cell_value(&self, sheet: usize, addr: CellRef) -> Value;
}

type FunctionImpl = fn(&mut dyn FunctionContext, &[CompiledExpr]) -> Value;

pub struct FunctionSpec {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    implementation: FunctionImpl,
}

const VARIADIC: usize = usize::MAX;

static FUNCTIONS: &[FunctionSpec] = &[
    FunctionSpec {
        name: "SUM",
        min_args: 1,
        max_args: VARIADIC,
        implementation: fn_sum,
    },
    FunctionSpec {
        name: "AVERAGE",
        min_args: 1,
        max_args: VARIADIC,
        implementation: fn_average,
    },
    FunctionSpec {
        name: "MIN",
        min_args: 1,
        max_args: VARIADIC,
        implementation: fn_min,
    },
    FunctionSpec {
        name: "MAX",
        min_args: 1,
        max_args: VARIADIC,
        implementation: fn_max,
    },
    FunctionSpec {
        name: "COUNT",
        min_args: 1,
        max_args: VARIADIC,
        implementation: fn_count,
    },
    FunctionSpec {
        name: "COUNTA",
        min_args: 1,
        max_args: VARIADIC,
        implementation: fn_counta,
    },
    FunctionSpec {
        name: "ROUND",
        min_args: 2,
        max_args: 2,
        implementation: fn_round,
    },
    FunctionSpec {
        name: "ABS",
        min_args: 1,
        max_args: 1,
        implementation: fn_abs,
    },
    FunctionSpec {
        name: "IF",
        min_args: 2,
        max_args: 3,
        implementation: fn_if,
    },
    FunctionSpec {
        name: "IFERROR",
        min_args: 2,
        max_args: 2,
        implementation: fn_iferror,
    },
    FunctionSpec {
        name: "ISBLANK",
        min_args: 1,
        max_args: 1,
        implementation: fn_isblank,
    },
    FunctionSpec {
        name: "AND",
        min_args: 1,
        max_args: VARIADIC,
        implementation: fn_and,
    },
    FunctionSpec {
        name: "OR",
        min_args: 1,
        max_args: VARIADIC,
        implementation: fn_or,
    },
    FunctionSpec {
        name: "NOT",
        min_args: 1,
        max_args: 1,
        implementation: fn_not,
    },
    FunctionSpec {
        name: "TRUE",
        min_args: 0,
        max_args: 0,
        implementation: fn_true,
    },
    FunctionSpec {
        name: "FALSE",
        min_args: 0,
        max_args: 0,
        implementation: fn_false,
    },
    FunctionSpec {
        name: "CONCATENATE",
        min_args: 1,
        max_args: VARIADIC,
        implementation: fn_concatenate,
    },
];

fn registry() -> &'static HashMap<&'static str, &'static FunctionSpec> {
    static REGISTRY: OnceLock<HashMap<&'static str, &'static FunctionSpec>> = OnceLock::new();
    REGISTRY.get_or_init(|| FUNCTIONS.iter().map(|spec| (spec.name, spec)).collect())
}

pub fn lookup(name: &str) -> Option<&'static FunctionSpec> {
    registry().get(name.to_ascii_uppercase().as_str()).copied()
}

/// Dispatch a call by name. Unknown names yield `#NAME?`, arity violations
/// `#VALUE!`.
pub fn call_function(
    ctx: &mut dyn FunctionContext,
    name: &str,
    args: &[CompiledExpr],
) -> Value {
    let Some(spec) = lookup(name) else {
        return Value::Error(ErrorKind::Name);
    };
    if args.len() < spec.min_args || args.len() > spec.max_args {
        return Value::Error(ErrorKind::Value);
    }
    (spec.implementation)(ctx, args)
}

/// Evaluate an argument down to a scalar. A reference must cover exactly one
/// cell to dereference; anything larger is `#VALUE!`.
pub fn eval_scalar_arg(ctx: &mut dyn FunctionContext, expr: &CompiledExpr) -> Value {
    match ctx.eval_arg(expr) {
        EvalValue::Scalar(v) => v,
        EvalValue::Reference(r) => {
            let r = r.normalized();
            if r.is_single_cell() {
                ctx.cell_value(r.sheet, r.start)
            } else {
                Value::Error(ErrorKind::Value)
            }
        }
    }
}

/// Fold numeric content of arguments. Direct scalars are coerced; inside
/// references only plain numbers participate, everything else but errors is
/// skipped.
fn fold_numbers(
    ctx: &mut dyn FunctionContext,
    args: &[CompiledExpr],
    mut fold: impl FnMut(f64),
) -> Option<ErrorKind> {
    for arg in args {
        match ctx.eval_arg(arg) {
            EvalValue::Scalar(v) => match v.coerce_to_number() {
                Ok(n) => fold(n),
                Err(e) => return Some(e),
            },
            EvalValue::Reference(r) => {
                let r = r.normalized();
                for addr in r.iter_cells() {
                    match ctx.cell_value(r.sheet, addr) {
                        Value::Number(n) => fold(n),
                        Value::Error(e) => return Some(e),
                        _ => {}
                    }
                }
            }
        }
    }
    None
}

fn finite_number(n: f64) -> Value {
    if n.is_finite() {
        Value::Number(n)
    } else {
        Value::Error(ErrorKind::Num)
    }
}

fn fn_sum(ctx: &mut dyn FunctionContext, args: &[CompiledExpr]) -> Value {
    let mut total = 0.0;
    if let Some(e) = fold_numbers(ctx, args, |n| total += n) {
        return Value::Error(e);
    }
    finite_number(total)
}

fn fn_average(ctx: &mut dyn FunctionContext, args: &[CompiledExpr]) -> Value {
    let mut total = 0.0;
    let mut count = 0u64;
    if let Some(e) = fold_numbers(ctx, args, |n| {
        total += n;
        count += 1;
    }) {
        return Value::Error(e);
    }
    if count == 0 {
        return Value::Error(ErrorKind::Div0);
    }
    finite_number(total / count as f64)
}

fn fn_min(ctx: &mut dyn FunctionContext, args: &[CompiledExpr]) -> Value {
    let mut best: Option<f64> = None;
    if let Some(e) = fold_numbers(ctx, args, |n| {
        best = Some(best.map_or(n, |b| b.min(n)));
    }) {
        return Value::Error(e);
    }
    finite_number(best.unwrap_or(0.0))
}

fn fn_max(ctx: &mut dyn FunctionContext, args: &[CompiledExpr]) -> Value {
    let mut best: Option<f64> = None;
    if let Some(e) = fold_numbers(ctx, args, |n| {
        best = Some(best.map_or(n, |b| b.max(n)));
    }) {
        return Value::Error(e);
    }
    finite_number(best.unwrap_or(0.0))
}

fn fn_count(ctx: &mut dyn FunctionContext, args: &[CompiledExpr]) -> Value {
    // COUNT never propagates errors, it just skips them.
    let mut count = 0u64;
    for arg in args {
        match ctx.eval_arg(arg) {
            EvalValue::Scalar(v) => {
                if !matches!(v, Value::Blank) && v.coerce_to_number().is_ok() {
                    count += 1;
                }
            }
            EvalValue::Reference(r) => {
                let r = r.normalized();
                for addr in r.iter_cells() {
                    if matches!(ctx.cell_value(r.sheet, addr), Value::Number(_)) {
                        count += 1;
                    }
                }
            }
        }
    }
    Value::Number(count as f64)
}

fn fn_counta(ctx: &mut dyn FunctionContext, args: &[CompiledExpr]) -> Value {
    let mut count = 0u64;
    for arg in args {
        match ctx.eval_arg(arg) {
            EvalValue::Scalar(v) => {
                if !matches!(v, Value::Blank) {
                    count += 1;
                }
            }
            EvalValue::Reference(r) => {
                let r = r.normalized();
                for addr in r.iter_cells() {
                    if !matches!(ctx.cell_value(r.sheet, addr), Value::Blank) {
                        count += 1;
                    }
                }
            }
        }
    }
    Value::Number(count as f64)
}

fn fn_round(ctx: &mut dyn FunctionContext, args: &[CompiledExpr]) -> Value {
    let n = match eval_scalar_arg(ctx, &args[0]).coerce_to_number() {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    let digits = match eval_scalar_arg(ctx, &args[1]).coerce_to_number() {
        Ok(d) => d.trunc(),
        Err(e) => return Value::Error(e),
    };
    if !(-308.0..=308.0).contains(&digits) {
        return Value::Error(ErrorKind::Num);
    }
    let factor = 10f64.powi(digits as i32);
    // f64::round halves away from zero, matching worksheet ROUND.
    finite_number((n * factor).round() / factor)
}

fn fn_abs(ctx: &mut dyn FunctionContext, args: &[CompiledExpr]) -> Value {
    match eval_scalar_arg(ctx, &args[0]).coerce_to_number() {
        Ok(n) => finite_number(n.abs()),
        Err(e) => Value::Error(e),
    }
}

fn fn_if(ctx: &mut dyn FunctionContext, args: &[CompiledExpr]) -> Value {
    let condition = match eval_scalar_arg(ctx, &args[0]).coerce_to_bool() {
        Ok(b) => b,
        Err(e) => return Value::Error(e),
    };
    if condition {
        eval_scalar_arg(ctx, &args[1])
    } else if let Some(otherwise) = args.get(2) {
        eval_scalar_arg(ctx, otherwise)
    } else {
        Value::Bool(false)
    }
}

fn fn_iferror(ctx: &mut dyn FunctionContext, args: &[CompiledExpr]) -> Value {
    let value = eval_scalar_arg(ctx, &args[0]);
    if value.is_error() {
        eval_scalar_arg(ctx, &args[1])
    } else {
        value
    }
}

fn fn_isblank(ctx: &mut dyn FunctionContext, args: &[CompiledExpr]) -> Value {
    match ctx.eval_arg(&args[0]) {
        EvalValue::Reference(r) => {
            let r = r.normalized();
            if r.is_single_cell() {
                Value::Bool(matches!(ctx.cell_value(r.sheet, r.start), Value::Blank))
            } else {
                Value::Error(ErrorKind::Value)
            }
        }
        EvalValue::Scalar(v) => Value::Bool(matches!(v, Value::Blank)),
    }
}

/// Shared body of AND / OR. Text and blanks inside references are skipped;
/// a call that sees no usable value at all is `#VALUE!`.
fn fold_logical(
    ctx: &mut dyn FunctionContext,
    args: &[CompiledExpr],
    identity: bool,
    combine: fn(bool, bool) -> bool,
) -> Value {
    let mut acc = identity;
    let mut seen = false;
    for arg in args {
        match ctx.eval_arg(arg) {
            EvalValue::Scalar(v) => match v.coerce_to_bool() {
                Ok(b) => {
                    acc = combine(acc, b);
                    seen = true;
                }
                Err(e) => return Value::Error(e),
            },
            EvalValue::Reference(r) => {
                let r = r.normalized();
                for addr in r.iter_cells() {
                    match ctx.cell_value(r.sheet, addr) {
                        Value::Number(n) => {
                            acc = combine(acc, n != 0.0);
                            seen = true;
                        }
                        Value::Bool(b) => {
                            acc = combine(acc, b);
                            seen = true;
                        }
                        Value::Error(e) => return Value::Error(e),
                        _ => {}
                    }
                }
            }
        }
    }
    if seen {
        Value::Bool(acc)
    } else {
        Value::Error(ErrorKind::Value)
    }
}

fn fn_and(ctx: &mut dyn FunctionContext, args: &[CompiledExpr]) -> Value {
    fold_logical(ctx, args, true, |a, b| a && b)
}

fn fn_or(ctx: &mut dyn FunctionContext, args: &[CompiledExpr]) -> Value {
    fold_logical(ctx, args, false, |a, b| a || b)
}

fn fn_not(ctx: &mut dyn FunctionContext, args: &[CompiledExpr]) -> Value {
    match eval_scalar_arg(ctx, &args[0]).coerce_to_bool() {
        Ok(b) => Value::Bool(!b),
        Err(e) => Value::Error(e),
    }
}

fn fn_true(_ctx: &mut dyn FunctionContext, _args: &[CompiledExpr]) -> Value {
    Value::Bool(true)
}

fn fn_false(_ctx: &mut dyn FunctionContext, _args: &[CompiledExpr]) -> Value {
    Value::Bool(false)
}

fn fn_concatenate(ctx: &mut dyn FunctionContext, args: &[CompiledExpr]) -> Value {
    let mut out = String::new();
    for arg in args {
        match eval_scalar_arg(ctx, arg).coerce_to_text() {
            Ok(s) => out.push_str(&s),
            Err(e) => return Value::Error(e),
        }
    }
    Value::Text(out)
}
