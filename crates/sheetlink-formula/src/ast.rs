//! Formula Abstract Syntax Tree types

use sheetlink_core::{format_number, CellAddress, CellRange};
use std::fmt;

/// Formula expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    // === Literals ===
    /// Numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// Boolean literal
    Boolean(bool),

    // === References ===
    /// Cell, range or cross-page reference
    CellRef(CellReference),

    // === Operators ===
    /// Binary operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },
    /// Unary operation
    UnaryOp {
        op: UnaryOperator,
        operand: Box<FormulaExpr>,
    },

    // === Function call ===
    Function { name: String, args: Vec<FormulaExpr> },
}

/// A reference to one or more cells
#[derive(Debug, Clone, PartialEq)]
pub enum CellReference {
    /// A single cell on the same sheet (`A1`)
    Local(CellAddress),
    /// A range on the same sheet (`A1:B2`)
    LocalRange(CellRange),
    /// A cell, range or the whole grid of another page's sheet
    CrossPage { page: PageRef, target: PageTarget },
}

/// Identifies another page by its opaque identifier, with a human label.
///
/// The label is only used for display; resolution goes by `identifier`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageRef {
    pub identifier: String,
    pub label: String,
}

impl PageRef {
    pub fn new<I: Into<String>, L: Into<String>>(identifier: I, label: L) -> Self {
        Self {
            identifier: identifier.into(),
            label: label.into(),
        }
    }
}

impl fmt::Display for PageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@[{}]({})", self.label, self.identifier)
    }
}

/// What part of a referenced page a cross-page reference reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageTarget {
    /// `@[Label](id)` with no suffix
    WholeSheet,
    /// `@[Label](id):A1`
    Cell(CellAddress),
    /// `@[Label](id):A1:B2`
    Range(CellRange),
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Text
    Concat,
}

impl BinaryOperator {
    /// Operator symbol as written in formulas
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::Concat => "&",
        }
    }

    /// Binding strength; higher binds tighter
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::Equal
            | BinaryOperator::NotEqual
            | BinaryOperator::LessThan
            | BinaryOperator::LessEqual
            | BinaryOperator::GreaterThan
            | BinaryOperator::GreaterEqual => 1,
            BinaryOperator::Concat => 2,
            BinaryOperator::Add | BinaryOperator::Subtract => 3,
            BinaryOperator::Multiply | BinaryOperator::Divide => 4,
        }
    }

    pub fn is_comparison(&self) -> bool {
        self.precedence() == 1
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
}

const UNARY_PRECEDENCE: u8 = 5;

impl FormulaExpr {
    /// Render the expression back to formula text, with the leading `=`.
    ///
    /// Parentheses are emitted only where precedence requires them, so
    /// `parse_formula(&expr.to_formula_string())` yields `expr` again.
    pub fn to_formula_string(&self) -> String {
        let mut out = String::from("=");
        self.write_expr(&mut out, 0);
        out
    }

    /// Every reference in the expression, in source order
    pub fn references(&self) -> Vec<&CellReference> {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a CellReference>) {
        match self {
            FormulaExpr::Number(_) | FormulaExpr::String(_) | FormulaExpr::Boolean(_) => {}
            FormulaExpr::CellRef(reference) => out.push(reference),
            FormulaExpr::BinaryOp { left, right, .. } => {
                left.collect_references(out);
                right.collect_references(out);
            }
            FormulaExpr::UnaryOp { operand, .. } => operand.collect_references(out),
            FormulaExpr::Function { args, .. } => {
                for arg in args {
                    arg.collect_references(out);
                }
            }
        }
    }

    fn write_expr(&self, out: &mut String, min_precedence: u8) {
        match self {
            FormulaExpr::Number(n) => out.push_str(&format_number(*n)),
            FormulaExpr::String(s) => {
                out.push('"');
                out.push_str(&s.replace('"', "\"\""));
                out.push('"');
            }
            FormulaExpr::Boolean(true) => out.push_str("TRUE"),
            FormulaExpr::Boolean(false) => out.push_str("FALSE"),
            FormulaExpr::CellRef(reference) => out.push_str(&reference.to_string()),
            FormulaExpr::BinaryOp { op, left, right } => {
                let precedence = op.precedence();
                let needs_parens = precedence < min_precedence;
                if needs_parens {
                    out.push('(');
                }
                left.write_expr(out, precedence);
                out.push_str(op.symbol());
                // Left-associative: an equal-precedence right operand needs parentheses
                right.write_expr(out, precedence + 1);
                if needs_parens {
                    out.push(')');
                }
            }
            FormulaExpr::UnaryOp {
                op: UnaryOperator::Negate,
                operand,
            } => {
                let needs_parens = UNARY_PRECEDENCE < min_precedence;
                if needs_parens {
                    out.push('(');
                }
                out.push('-');
                operand.write_expr(out, UNARY_PRECEDENCE);
                if needs_parens {
                    out.push(')');
                }
            }
            FormulaExpr::Function { name, args } => {
                out.push_str(name);
                out.push('(');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    arg.write_expr(out, 0);
                }
                out.push(')');
            }
        }
    }
}

impl fmt::Display for CellReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellReference::Local(addr) => write!(f, "{}", addr),
            CellReference::LocalRange(range) => write!(f, "{}", range),
            CellReference::CrossPage { page, target } => match target {
                PageTarget::WholeSheet => write!(f, "{}", page),
                PageTarget::Cell(addr) => write!(f, "{}:{}", page, addr),
                PageTarget::Range(range) => write!(f, "{}:{}", page, range),
            },
        }
    }
}
