//! Expression evaluation against a resolver-backed workbook view.

use std::cmp::Ordering;

use footprint_model::CellRef;

use crate::ast::{BinaryOp, CompareOp, CompiledExpr, Expr, SheetRef, UnaryOp};
use crate::functions::{self, FunctionContext};
use crate::value::{ErrorKind, Value};

/// Named expressions may reference other names; cap the expansion depth so a
/// self-referential definition degrades to `#CALC!` instead of blowing the
/// stack.
pub(crate) const MAX_NAME_DEPTH: usize = 32;

/// A rectangular block of cells on one sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub sheet: usize,
    pub start: CellRef,
    pub end: CellRef,
}

impl Reference {
    /// Corners reordered so `start` is the top-left cell.
    pub fn normalized(self) -> Self {
        Reference {
            sheet: self.sheet,
            start: CellRef {
                row: self.start.row.min(self.end.row),
                col: self.start.col.min(self.end.col),
            },
            end: CellRef {
                row: self.start.row.max(self.end.row),
                col: self.start.col.max(self.end.col),
            },
        }
    }

    pub fn is_single_cell(&self) -> bool {
        self.start == self.end
    }

    /// Row-major iteration. Call on a normalized reference.
    pub fn iter_cells(&self) -> impl Iterator<Item = CellRef> {
        let (start, end) = (self.start, self.end);
        (start.row..=end.row)
            .flat_map(move |row| (start.col..=end.col).map(move |col| CellRef { row, col }))
    }
}

/// Result of evaluating a subexpression. References stay unresolved until a
/// consumer decides whether to dereference or iterate them.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalValue {
    Scalar(Value),
    Reference(Reference),
}

/// Read access the evaluator needs from whoever owns the cell values.
pub trait ValueResolver {
    /// Value of a cell, `Blank` when the cell or sheet does not exist.
    fn cell_value(&self, sheet: usize, addr: CellRef) -> Value;

    /// Compiled body of a defined name, checking sheet scope before global.
    fn resolve_name(&self, sheet: usize, name: &str) -> Option<&CompiledExpr>;
}

pub struct Evaluator<'a, R: ValueResolver> {
    resolver: &'a R,
    current_sheet: usize,
    name_depth: usize,
}

impl<'a, R: ValueResolver> Evaluator<'a, R> {
    pub fn new(resolver: &'a R, current_sheet: usize) -> Self {
        Evaluator {
            resolver,
            current_sheet,
            name_depth: 0,
        }
    }

    /// Evaluate to a scalar, dereferencing a single-cell result.
    pub fn eval(&mut self, expr: &CompiledExpr) -> Value {
        let value = self.eval_value(expr);
        self.deref(value)
    }

    pub fn eval_value(&mut self, expr: &CompiledExpr) -> EvalValue {
        match expr {
            Expr::Number(n) => EvalValue::Scalar(Value::Number(*n)),
            Expr::Text(s) => EvalValue::Scalar(Value::Text(s.clone())),
            Expr::Bool(b) => EvalValue::Scalar(Value::Bool(*b)),
            Expr::Error(e) => EvalValue::Scalar(Value::Error(*e)),
            Expr::CellRef(r) => EvalValue::Reference(Reference {
                sheet: self.sheet_index(&r.sheet),
                start: r.addr,
                end: r.addr,
            }),
            Expr::RangeRef(r) => EvalValue::Reference(Reference {
                sheet: self.sheet_index(&r.sheet),
                start: r.start,
                end: r.end,
            }),
            Expr::NameRef(name) => self.eval_name(name),
            Expr::Unary { op, expr } => EvalValue::Scalar(self.eval_unary(*op, expr)),
            Expr::Percent(expr) => EvalValue::Scalar(self.eval_percent(expr)),
            Expr::Binary { op, left, right } => {
                EvalValue::Scalar(self.eval_binary(*op, left, right))
            }
            Expr::Compare { op, left, right } => {
                EvalValue::Scalar(self.eval_compare(*op, left, right))
            }
            Expr::FunctionCall { name, args } => {
                EvalValue::Scalar(functions::call_function(self, name, args))
            }
        }
    }

    fn sheet_index(&self, sheet: &SheetRef<usize>) -> usize {
        match sheet {
            SheetRef::Current => self.current_sheet,
            SheetRef::Sheet(id) => *id,
        }
    }

    fn eval_name(&mut self, name: &str) -> EvalValue {
        if self.name_depth >= MAX_NAME_DEPTH {
            return EvalValue::Scalar(Value::Error(ErrorKind::Calc));
        }
        match self.resolver.resolve_name(self.current_sheet, name) {
            Some(body) => {
                self.name_depth += 1;
                let value = self.eval_value(body);
                self.name_depth -= 1;
                value
            }
            None => EvalValue::Scalar(Value::Error(ErrorKind::Name)),
        }
    }

    fn deref(&self, value: EvalValue) -> Value {
        match value {
            EvalValue::Scalar(v) => v,
            EvalValue::Reference(r) => {
                let r = r.normalized();
                if r.is_single_cell() {
                    self.resolver.cell_value(r.sheet, r.start)
                } else {
                    Value::Error(ErrorKind::Value)
                }
            }
        }
    }

    fn eval_unary(&mut self, op: UnaryOp, expr: &CompiledExpr) -> Value {
        let value = self.eval(expr);
        if value.is_error() {
            return value;
        }
        match op {
            // Unary plus passes any operand through untouched.
            UnaryOp::Plus => value,
            UnaryOp::Minus => match value.coerce_to_number() {
                Ok(n) => finite(-n),
                Err(e) => Value::Error(e),
            },
        }
    }

    fn eval_percent(&mut self, expr: &CompiledExpr) -> Value {
        let value = self.eval(expr);
        if value.is_error() {
            return value;
        }
        match value.coerce_to_number() {
            Ok(n) => finite(n / 100.0),
            Err(e) => Value::Error(e),
        }
    }

    fn eval_binary(&mut self, op: BinaryOp, left: &CompiledExpr, right: &CompiledExpr) -> Value {
        let lhs = self.eval(left);
        if lhs.is_error() {
            return lhs;
        }
        let rhs = self.eval(right);
        if rhs.is_error() {
            return rhs;
        }

        if matches!(op, BinaryOp::Concat) {
            return match (lhs.coerce_to_text(), rhs.coerce_to_text()) {
                (Ok(a), Ok(b)) => Value::Text(format!("{a}{b}")),
                (Err(e), _) | (_, Err(e)) => Value::Error(e),
            };
        }

        let a = match lhs.coerce_to_number() {
            Ok(n) => n,
            Err(e) => return Value::Error(e),
        };
        let b = match rhs.coerce_to_number() {
            Ok(n) => n,
            Err(e) => return Value::Error(e),
        };
        let result = match op {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div if b == 0.0 => return Value::Error(ErrorKind::Div0),
            BinaryOp::Div => a / b,
            BinaryOp::Pow if a == 0.0 && b < 0.0 => return Value::Error(ErrorKind::Div0),
            BinaryOp::Pow if a == 0.0 && b == 0.0 => return Value::Error(ErrorKind::Num),
            BinaryOp::Pow => a.powf(b),
            BinaryOp::Concat => return Value::Error(ErrorKind::Value),
        };
        finite(result)
    }

    fn eval_compare(&mut self, op: CompareOp, left: &CompiledExpr, right: &CompiledExpr) -> Value {
        let lhs = self.eval(left);
        if lhs.is_error() {
            return lhs;
        }
        let rhs = self.eval(right);
        if rhs.is_error() {
            return rhs;
        }
        let ordering = compare_values(&lhs, &rhs);
        let result = match op {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        };
        Value::Bool(result)
    }
}

impl<R: ValueResolver> FunctionContext for Evaluator<'_, R> {
    fn eval_arg(&mut self, expr: &CompiledExpr) -> EvalValue {
        self.eval_value(expr)
    }

    fn cell_value(&self, sheet: usize, addr: CellRef) -> Value {
        self.resolver.cell_value(sheet, addr)
    }
}

fn finite(n: f64) -> Value {
    if n.is_finite() {
        Value::Number(n)
    } else {
        Value::Error(ErrorKind::Num)
    }
}

/// Worksheet comparison order. A blank operand takes the zero value of the
/// other side, text compares case-insensitively and mixed types rank as
/// numbers before text before booleans.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Blank, Value::Blank) => Ordering::Equal,
        (Value::Blank, _) => compare_values(&zero_of(b), b),
        (_, Value::Blank) => compare_values(a, &zero_of(a)),
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Text(x), Value::Text(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn zero_of(v: &Value) -> Value {
    match v {
        Value::Text(_) => Value::Text(String::new()),
        Value::Bool(_) => Value::Bool(false),
        _ => Value::Number(0.0),
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Number(_) | Value::Blank => 0,
        Value::Text(_) => 1,
        Value::Bool(_) => 2,
        Value::Error(_) => 3,
    }
}
