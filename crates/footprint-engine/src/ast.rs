use footprint_model::CellRef;

use crate::value::ErrorKind;

/// Which sheet a reference targets. Parsed formulas carry sheet names; the
/// calculator compiles them to sheet indices before evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetRef<S> {
    /// The sheet the formula lives on.
    Current,
    Sheet(S),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellRefExpr<S> {
    pub sheet: SheetRef<S>,
    pub addr: CellRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeRefExpr<S> {
    pub sheet: SheetRef<S>,
    pub start: CellRef,
    pub end: CellRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Concat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Formula AST, generic over how sheet references are identified.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr<S> {
    Number(f64),
    Text(String),
    Bool(bool),
    Error(ErrorKind),
    CellRef(CellRefExpr<S>),
    RangeRef(RangeRefExpr<S>),
    /// A named expression, resolved at evaluation time.
    NameRef(String),
    Unary {
        op: UnaryOp,
        expr: Box<Expr<S>>,
    },
    /// Postfix `%`.
    Percent(Box<Expr<S>>),
    Binary {
        op: BinaryOp,
        left: Box<Expr<S>>,
        right: Box<Expr<S>>,
    },
    Compare {
        op: CompareOp,
        left: Box<Expr<S>>,
        right: Box<Expr<S>>,
    },
    FunctionCall {
        name: String,
        args: Vec<Expr<S>>,
    },
}

/// Formula as produced by the parser: sheets referenced by name.
pub type ParsedExpr = Expr<String>;

/// Formula with sheet names resolved to workbook sheet indices.
pub type CompiledExpr = Expr<usize>;

impl<S> Expr<S> {
    /// Rewrite every sheet reference through `map`, preserving structure.
    pub fn map_sheets<T>(self, map: &mut impl FnMut(S) -> T) -> Expr<T> {
        match self {
            Expr::Number(n) => Expr::Number(n),
            Expr::Text(s) => Expr::Text(s),
            Expr::Bool(b) => Expr::Bool(b),
            Expr::Error(e) => Expr::Error(e),
            Expr::NameRef(name) => Expr::NameRef(name),
            Expr::CellRef(r) => Expr::CellRef(CellRefExpr {
                sheet: map_sheet_ref(r.sheet, map),
                addr: r.addr,
            }),
            Expr::RangeRef(r) => Expr::RangeRef(RangeRefExpr {
                sheet: map_sheet_ref(r.sheet, map),
                start: r.start,
                end: r.end,
            }),
            Expr::Unary { op, expr } => Expr::Unary {
                op,
                expr: Box::new(expr.map_sheets(map)),
            },
            Expr::Percent(expr) => Expr::Percent(Box::new(expr.map_sheets(map))),
            Expr::Binary { op, left, right } => Expr::Binary {
                op,
                left: Box::new(left.map_sheets(map)),
                right: Box::new(right.map_sheets(map)),
            },
            Expr::Compare { op, left, right } => Expr::Compare {
                op,
                left: Box::new(left.map_sheets(map)),
                right: Box::new(right.map_sheets(map)),
            },
            Expr::FunctionCall { name, args } => Expr::FunctionCall {
                name,
                args: args.into_iter().map(|a| a.map_sheets(map)).collect(),
            },
        }
    }
}

fn map_sheet_ref<S, T>(sheet: SheetRef<S>, map: &mut impl FnMut(S) -> T) -> SheetRef<T> {
    match sheet {
        SheetRef::Current => SheetRef::Current,
        SheetRef::Sheet(s) => SheetRef::Sheet(map(s)),
    }
}
