//! Lexer and parser for the canonical formula dialect.
//!
//! Stored formulas are canonicalized by the workbook codec before they reach
//! this parser: function names are uppercase, argument separators are commas
//! and bare logical literals have been rewritten as `TRUE()` / `FALSE()`.

use footprint_model::CellRef;
use thiserror::Error;

use crate::ast::{
    BinaryOp, CellRefExpr, CompareOp, Expr, ParsedExpr, RangeRefExpr, SheetRef, UnaryOp,
};
use crate::value::ErrorKind;

/// Guard against stack exhaustion from pathological nesting.
const MAX_NESTING: usize = 64;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaParseError {
    #[error("unexpected character `{0}`")]
    UnexpectedChar(char),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unterminated quoted sheet name")]
    UnterminatedSheetName,
    #[error("unknown error literal `{0}`")]
    UnknownErrorLiteral(String),
    #[error("invalid number literal `{0}`")]
    InvalidNumber(String),
    #[error("expected {expected}, found {found}")]
    Expected {
        expected: &'static str,
        found: String,
    },
    #[error("unexpected trailing input starting at `{0}`")]
    TrailingInput(String),
    #[error("formula nesting is too deep")]
    TooDeeplyNested,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    QuotedIdent(String),
    Cell(CellRef),
    ErrorLit(ErrorKind),
    LParen,
    RParen,
    Bang,
    Colon,
    ArgSep,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Amp,
    Percent,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {n}"),
            Token::Str(_) => "string literal".to_string(),
            Token::Ident(name) | Token::QuotedIdent(name) => format!("`{name}`"),
            Token::Cell(at) => format!("cell {at}"),
            Token::ErrorLit(e) => e.as_code().to_string(),
            Token::LParen => "`(`".to_string(),
            Token::RParen => "`)`".to_string(),
            Token::Bang => "`!`".to_string(),
            Token::Colon => "`:`".to_string(),
            Token::ArgSep => "`,`".to_string(),
            Token::Plus => "`+`".to_string(),
            Token::Minus => "`-`".to_string(),
            Token::Star => "`*`".to_string(),
            Token::Slash => "`/`".to_string(),
            Token::Caret => "`^`".to_string(),
            Token::Amp => "`&`".to_string(),
            Token::Percent => "`%`".to_string(),
            Token::Eq => "`=`".to_string(),
            Token::Ne => "`<>`".to_string(),
            Token::Lt => "`<`".to_string(),
            Token::Le => "`<=`".to_string(),
            Token::Gt => "`>`".to_string(),
            Token::Ge => "`>=`".to_string(),
            Token::Eof => "end of formula".to_string(),
        }
    }
}

/// Parse a formula into an AST with sheet references left as names.
///
/// The input may optionally start with `=`.
pub fn parse_formula(text: &str) -> Result<ParsedExpr, FormulaParseError> {
    let src = text.strip_prefix('=').unwrap_or(text);
    let tokens = lex(src)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.parse_expression(0)?;
    match parser.peek() {
        Token::Eof => Ok(expr),
        other => Err(FormulaParseError::TrailingInput(other.describe())),
    }
}

fn lex(src: &str) -> Result<Vec<Token>, FormulaParseError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => push(&mut tokens, Token::LParen, &mut i),
            ')' => push(&mut tokens, Token::RParen, &mut i),
            '!' => push(&mut tokens, Token::Bang, &mut i),
            ':' => push(&mut tokens, Token::Colon, &mut i),
            ',' => push(&mut tokens, Token::ArgSep, &mut i),
            '+' => push(&mut tokens, Token::Plus, &mut i),
            '-' => push(&mut tokens, Token::Minus, &mut i),
            '*' => push(&mut tokens, Token::Star, &mut i),
            '/' => push(&mut tokens, Token::Slash, &mut i),
            '^' => push(&mut tokens, Token::Caret, &mut i),
            '&' => push(&mut tokens, Token::Amp, &mut i),
            '%' => push(&mut tokens, Token::Percent, &mut i),
            '=' => push(&mut tokens, Token::Eq, &mut i),
            '<' => {
                if chars.get(i + 1) == Some(&'>') {
                    tokens.push(Token::Ne);
                    i += 2;
                } else if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Le);
                    i += 2;
                } else {
                    push(&mut tokens, Token::Lt, &mut i);
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Ge);
                    i += 2;
                } else {
                    push(&mut tokens, Token::Gt, &mut i);
                }
            }
            '"' => {
                let (text, next) = lex_quoted(&chars, i, '"')
                    .ok_or(FormulaParseError::UnterminatedString)?;
                tokens.push(Token::Str(text));
                i = next;
            }
            '\'' => {
                let (name, next) = lex_quoted(&chars, i, '\'')
                    .ok_or(FormulaParseError::UnterminatedSheetName)?;
                tokens.push(Token::QuotedIdent(name));
                i = next;
            }
            '#' => {
                let (token, next) = lex_error_literal(&chars, i)?;
                tokens.push(token);
                i = next;
            }
            c if c.is_ascii_digit() || (c == '.' && next_is_digit(&chars, i)) => {
                let (token, next) = lex_number(&chars, i)?;
                tokens.push(token);
                i = next;
            }
            c if is_ident_start(c) => {
                let (token, next) = lex_ident(&chars, i);
                tokens.push(token);
                i = next;
            }
            other => return Err(FormulaParseError::UnexpectedChar(other)),
        }
    }

    tokens.push(Token::Eof);
    Ok(tokens)
}

fn push(tokens: &mut Vec<Token>, token: Token, i: &mut usize) {
    tokens.push(token);
    *i += 1;
}

fn next_is_digit(chars: &[char], i: usize) -> bool {
    chars.get(i + 1).is_some_and(|c| c.is_ascii_digit())
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.' || c == '$'
}

/// Content between matching quotes, with doubled quotes unescaped. Returns
/// the content and the index just past the closing quote.
fn lex_quoted(chars: &[char], start: usize, quote: char) -> Option<(String, usize)> {
    let mut out = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                out.push(quote);
                i += 2;
            } else {
                return Some((out, i + 1));
            }
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    None
}

fn lex_error_literal(chars: &[char], start: usize) -> Result<(Token, usize), FormulaParseError> {
    // Error literals run from `#` through `!` or `?`, with `#N/A` and
    // `#GETTING_DATA` as the terminator-less exceptions.
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        if c == '!' || c == '?' {
            i += 1;
            break;
        }
        if c.is_alphanumeric() || c == '/' || c == '_' {
            i += 1;
        } else {
            break;
        }
    }
    let literal: String = chars[start..i].iter().collect();
    match ErrorKind::from_literal(&literal) {
        Some(kind) => Ok((Token::ErrorLit(kind), i)),
        None => Err(FormulaParseError::UnknownErrorLiteral(literal)),
    }
}

fn lex_number(chars: &[char], start: usize) -> Result<(Token, usize), FormulaParseError> {
    let mut i = start;
    while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
        i += 1;
    }
    if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
        let mut j = i + 1;
        if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
            j += 1;
        }
        if j < chars.len() && chars[j].is_ascii_digit() {
            i = j;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    let text: String = chars[start..i].iter().collect();
    match text.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok((Token::Number(n), i)),
        _ => Err(FormulaParseError::InvalidNumber(text)),
    }
}

fn lex_ident(chars: &[char], start: usize) -> (Token, usize) {
    let mut i = start + 1;
    while i < chars.len() && is_ident_continue(chars[i]) {
        i += 1;
    }
    let text: String = chars[start..i].iter().collect();

    // A sheet named like a cell (`A1!B2`) stays an identifier; everything
    // else matching the A1 pattern becomes a cell token.
    if chars.get(i) != Some(&'!') {
        if let Ok(addr) = CellRef::from_a1(&text) {
            return (Token::Cell(addr), i);
        }
    }
    (Token::Ident(text), i)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn peek_second(&self) -> &Token {
        self.tokens.get(self.pos + 1).unwrap_or(&Token::Eof)
    }

    fn next(&mut self) -> Token {
        let token = self.tokens.get(self.pos).cloned().unwrap_or(Token::Eof);
        self.pos += 1;
        token
    }

    fn expect(&mut self, want: &Token, expected: &'static str) -> Result<(), FormulaParseError> {
        let token = self.next();
        if token == *want {
            Ok(())
        } else {
            Err(FormulaParseError::Expected {
                expected,
                found: token.describe(),
            })
        }
    }

    fn parse_expression(&mut self, min_bp: u8) -> Result<ParsedExpr, FormulaParseError> {
        let mut lhs = self.parse_prefix()?;

        loop {
            // Postfix percent binds tighter than any binary operator.
            let postfix_bp = 60;
            if matches!(self.peek(), Token::Percent) && postfix_bp >= min_bp {
                self.pos += 1;
                lhs = Expr::Percent(Box::new(lhs));
                continue;
            }

            let op = match self.peek() {
                Token::Caret => Infix::Binary(BinaryOp::Pow),
                Token::Star => Infix::Binary(BinaryOp::Mul),
                Token::Slash => Infix::Binary(BinaryOp::Div),
                Token::Plus => Infix::Binary(BinaryOp::Add),
                Token::Minus => Infix::Binary(BinaryOp::Sub),
                Token::Amp => Infix::Binary(BinaryOp::Concat),
                Token::Eq => Infix::Compare(CompareOp::Eq),
                Token::Ne => Infix::Compare(CompareOp::Ne),
                Token::Lt => Infix::Compare(CompareOp::Lt),
                Token::Le => Infix::Compare(CompareOp::Le),
                Token::Gt => Infix::Compare(CompareOp::Gt),
                Token::Ge => Infix::Compare(CompareOp::Ge),
                _ => break,
            };

            let (l_bp, r_bp) = op.binding_power();
            if l_bp < min_bp {
                break;
            }
            self.pos += 1;

            self.depth += 1;
            if self.depth > MAX_NESTING {
                return Err(FormulaParseError::TooDeeplyNested);
            }
            let rhs = self.parse_expression(r_bp);
            self.depth -= 1;
            let rhs = rhs?;

            lhs = match op {
                Infix::Binary(op) => Expr::Binary {
                    op,
                    left: Box::new(lhs),
                    right: Box::new(rhs),
                },
                Infix::Compare(op) => Expr::Compare {
                    op,
                    left: Box::new(lhs),
                    right: Box::new(rhs),
                },
            };
        }

        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<ParsedExpr, FormulaParseError> {
        match self.next() {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Str(s) => Ok(Expr::Text(s)),
            Token::ErrorLit(e) => Ok(Expr::Error(e)),
            // Unary sign binds tighter than `^`, so `-2^2` is `(-2)^2`.
            Token::Plus => {
                let expr = self.parse_nested(|p| p.parse_expression(70))?;
                Ok(Expr::Unary {
                    op: UnaryOp::Plus,
                    expr: Box::new(expr),
                })
            }
            Token::Minus => {
                let expr = self.parse_nested(|p| p.parse_expression(70))?;
                Ok(Expr::Unary {
                    op: UnaryOp::Minus,
                    expr: Box::new(expr),
                })
            }
            Token::LParen => {
                let expr = self.parse_nested(|p| p.parse_expression(0))?;
                self.expect(&Token::RParen, "`)`")?;
                Ok(expr)
            }
            Token::Cell(addr) => Ok(self.finish_reference(SheetRef::Current, addr)),
            Token::QuotedIdent(sheet) => self.parse_sheet_qualified(sheet),
            Token::Ident(name) => {
                if matches!(self.peek(), Token::Bang) {
                    self.pos += 1;
                    return match self.next() {
                        Token::Cell(addr) => {
                            Ok(self.finish_reference(SheetRef::Sheet(name), addr))
                        }
                        other => Err(FormulaParseError::Expected {
                            expected: "cell reference after `!`",
                            found: other.describe(),
                        }),
                    };
                }
                if matches!(self.peek(), Token::LParen) {
                    self.pos += 1;
                    let args = self.parse_call_args()?;
                    return Ok(Expr::FunctionCall { name, args });
                }
                match name.to_ascii_uppercase().as_str() {
                    "TRUE" => Ok(Expr::Bool(true)),
                    "FALSE" => Ok(Expr::Bool(false)),
                    _ => Ok(Expr::NameRef(name)),
                }
            }
            other => Err(FormulaParseError::Expected {
                expected: "a value, reference or function call",
                found: other.describe(),
            }),
        }
    }

    fn parse_sheet_qualified(&mut self, sheet: String) -> Result<ParsedExpr, FormulaParseError> {
        self.expect(&Token::Bang, "`!` after sheet name")?;
        match self.next() {
            Token::Cell(addr) => Ok(self.finish_reference(SheetRef::Sheet(sheet), addr)),
            other => Err(FormulaParseError::Expected {
                expected: "cell reference after `!`",
                found: other.describe(),
            }),
        }
    }

    /// After a cell reference, `:cell` extends it into a range.
    fn finish_reference(&mut self, sheet: SheetRef<String>, start: CellRef) -> ParsedExpr {
        if matches!(self.peek(), Token::Colon) {
            if let Token::Cell(end) = *self.peek_second() {
                self.pos += 2;
                return Expr::RangeRef(RangeRefExpr { sheet, start, end });
            }
        }
        Expr::CellRef(CellRefExpr { sheet, addr: start })
    }

    fn parse_call_args(&mut self) -> Result<Vec<ParsedExpr>, FormulaParseError> {
        let mut args = Vec::new();
        if matches!(self.peek(), Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            let arg = self.parse_nested(|p| p.parse_expression(0))?;
            args.push(arg);
            match self.next() {
                Token::ArgSep => {}
                Token::RParen => return Ok(args),
                other => {
                    return Err(FormulaParseError::Expected {
                        expected: "`,` or `)`",
                        found: other.describe(),
                    })
                }
            }
        }
    }

    fn parse_nested(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<ParsedExpr, FormulaParseError>,
    ) -> Result<ParsedExpr, FormulaParseError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(FormulaParseError::TooDeeplyNested);
        }
        let result = f(self);
        self.depth -= 1;
        result
    }
}

enum Infix {
    Binary(BinaryOp),
    Compare(CompareOp),
}

impl Infix {
    fn binding_power(&self) -> (u8, u8) {
        match self {
            // `^` is right associative.
            Infix::Binary(BinaryOp::Pow) => (50, 50),
            Infix::Binary(BinaryOp::Mul | BinaryOp::Div) => (40, 41),
            Infix::Binary(BinaryOp::Add | BinaryOp::Sub) => (30, 31),
            Infix::Binary(BinaryOp::Concat) => (20, 21),
            Infix::Compare(_) => (10, 11),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cell(a1: &str) -> CellRef {
        CellRef::from_a1(a1).unwrap()
    }

    fn num(n: f64) -> ParsedExpr {
        Expr::Number(n)
    }

    #[test]
    fn literals_and_operators() {
        assert_eq!(parse_formula("=1.5").unwrap(), num(1.5));
        assert_eq!(
            parse_formula("\"a \"\"quoted\"\" bit\"").unwrap(),
            Expr::Text("a \"quoted\" bit".to_string())
        );
        assert_eq!(parse_formula("#DIV/0!").unwrap(), Expr::Error(ErrorKind::Div0));

        assert_eq!(
            parse_formula("1+2*3").unwrap(),
            Expr::Binary {
                op: BinaryOp::Add,
                left: Box::new(num(1.0)),
                right: Box::new(Expr::Binary {
                    op: BinaryOp::Mul,
                    left: Box::new(num(2.0)),
                    right: Box::new(num(3.0)),
                }),
            }
        );
    }

    #[test]
    fn power_is_right_associative_and_unary_minus_binds_tighter() {
        assert_eq!(
            parse_formula("2^3^2").unwrap(),
            Expr::Binary {
                op: BinaryOp::Pow,
                left: Box::new(num(2.0)),
                right: Box::new(Expr::Binary {
                    op: BinaryOp::Pow,
                    left: Box::new(num(3.0)),
                    right: Box::new(num(2.0)),
                }),
            }
        );

        // Excel parses `-2^2` as `(-2)^2`.
        assert_eq!(
            parse_formula("-2^2").unwrap(),
            Expr::Binary {
                op: BinaryOp::Pow,
                left: Box::new(Expr::Unary {
                    op: UnaryOp::Minus,
                    expr: Box::new(num(2.0)),
                }),
                right: Box::new(num(2.0)),
            }
        );
    }

    #[test]
    fn references_plain_qualified_and_ranged() {
        assert_eq!(
            parse_formula("B2").unwrap(),
            Expr::CellRef(CellRefExpr {
                sheet: SheetRef::Current,
                addr: cell("B2"),
            })
        );
        assert_eq!(
            parse_formula("Params!$B$4").unwrap(),
            Expr::CellRef(CellRefExpr {
                sheet: SheetRef::Sheet("Params".to_string()),
                addr: cell("B4"),
            })
        );
        assert_eq!(
            parse_formula("'Plan d''action'!B3:E20").unwrap(),
            Expr::RangeRef(RangeRefExpr {
                sheet: SheetRef::Sheet("Plan d'action".to_string()),
                start: cell("B3"),
                end: cell("E20"),
            })
        );
    }

    #[test]
    fn calls_names_and_logical_literals() {
        assert_eq!(
            parse_formula("SUM(B2:B9,1)").unwrap(),
            Expr::FunctionCall {
                name: "SUM".to_string(),
                args: vec![
                    Expr::RangeRef(RangeRefExpr {
                        sheet: SheetRef::Current,
                        start: cell("B2"),
                        end: cell("B9"),
                    }),
                    num(1.0),
                ],
            }
        );
        assert_eq!(
            parse_formula("TRUE()").unwrap(),
            Expr::FunctionCall {
                name: "TRUE".to_string(),
                args: vec![],
            }
        );
        assert_eq!(parse_formula("FALSE").unwrap(), Expr::Bool(false));
        assert_eq!(
            parse_formula("taux_co2").unwrap(),
            Expr::NameRef("taux_co2".to_string())
        );
    }

    #[test]
    fn percent_and_concat() {
        assert_eq!(
            parse_formula("20%").unwrap(),
            Expr::Percent(Box::new(num(20.0)))
        );
        assert_eq!(
            parse_formula("\"a\"&\"b\"=\"ab\"").unwrap(),
            Expr::Compare {
                op: CompareOp::Eq,
                left: Box::new(Expr::Binary {
                    op: BinaryOp::Concat,
                    left: Box::new(Expr::Text("a".to_string())),
                    right: Box::new(Expr::Text("b".to_string())),
                }),
                right: Box::new(Expr::Text("ab".to_string())),
            }
        );
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(
            parse_formula("=1+"),
            Err(FormulaParseError::Expected { .. })
        ));
        assert!(matches!(
            parse_formula("=\"open"),
            Err(FormulaParseError::UnterminatedString)
        ));
        assert!(matches!(
            parse_formula("=#BOGUS!"),
            Err(FormulaParseError::UnknownErrorLiteral(_))
        ));
        assert!(matches!(
            parse_formula("=1 2"),
            Err(FormulaParseError::TrailingInput(_))
        ));

        let deep = format!("{}1{}", "(".repeat(80), ")".repeat(80));
        assert!(matches!(
            parse_formula(&deep),
            Err(FormulaParseError::TooDeeplyNested)
        ));
    }

    #[test]
    fn sheet_names_that_look_like_cells_stay_sheet_names() {
        assert_eq!(
            parse_formula("A1!B2").unwrap(),
            Expr::CellRef(CellRefExpr {
                sheet: SheetRef::Sheet("A1".to_string()),
                addr: cell("B2"),
            })
        );
    }
}
