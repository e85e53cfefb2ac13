//! Formula parser
//!
//! A recursive descent parser over the token stream produced by
//! [`tokenize`](crate::tokenizer::tokenize), with proper operator precedence.

use std::sync::Arc;

use ahash::AHashMap;

use crate::ast::{BinaryOperator, CellReference, FormulaExpr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::tokenizer::{tokenize, Token};

/// Deepest expression nesting a formula may have
pub const MAX_NESTING: usize = 256;

/// Parse a formula string into an AST
///
/// # Example
/// ```rust
/// use sheetlink_formula::parse_formula;
///
/// let ast = parse_formula("=1+2").unwrap();
/// let ast = parse_formula("=SUM(A1:A10)").unwrap();
/// let ast = parse_formula("=IF(A1>0,\"Yes\",\"No\")").unwrap();
/// let ast = parse_formula("=@[Sales Q1](page-42):B2*2").unwrap();
/// ```
pub fn parse_formula(formula: &str) -> FormulaResult<FormulaExpr> {
    // Formula must start with '='
    let body = formula
        .strip_prefix('=')
        .ok_or_else(|| FormulaError::Parse("Formula must start with '='".into()))?;

    if body.trim().is_empty() {
        return Err(FormulaError::Parse("Empty formula".into()));
    }

    let tokens = tokenize(body)?;
    let mut parser = FormulaParser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.parse_expression()?;

    // Make sure we consumed all input
    if !matches!(parser.current_token(), Token::Eof) {
        return Err(FormulaError::Parse(format!(
            "Unexpected {} after expression",
            describe(parser.current_token())
        )));
    }

    Ok(expr)
}

/// Memoizes parse outcomes by formula source.
///
/// Formulas are parsed once per distinct source text, whether the parse
/// succeeded or failed. Shared between dependency analysis and evaluation so a
/// sheet's formulas are never parsed twice in one pass.
#[derive(Debug, Default)]
pub struct ParseCache {
    entries: AHashMap<String, Arc<FormulaResult<FormulaExpr>>>,
}

impl ParseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `formula`, or return the outcome of an earlier parse of the same text
    pub fn get_or_parse(&mut self, formula: &str) -> Arc<FormulaResult<FormulaExpr>> {
        if let Some(parsed) = self.entries.get(formula) {
            return Arc::clone(parsed);
        }
        let parsed = Arc::new(parse_formula(formula));
        self.entries.insert(formula.to_string(), Arc::clone(&parsed));
        parsed
    }

    /// Number of distinct formulas parsed
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Formula parser
struct FormulaParser {
    tokens: Vec<Token>,
    pos: usize,
    /// Nesting of the node being built; bounds the height of the tree
    depth: usize,
}

impl FormulaParser {
    fn current_token(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn consume(&mut self) -> Token {
        let token = self.current_token().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token) -> FormulaResult<()> {
        if self.current_token() == expected {
            self.consume();
            Ok(())
        } else {
            Err(FormulaError::Parse(format!(
                "Expected {}, got {}",
                describe(expected),
                describe(self.current_token())
            )))
        }
    }

    fn descend(&mut self) -> FormulaResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(FormulaError::Parse("Formula nested too deeply".into()));
        }
        Ok(())
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. Comparison: =, <>, <, <=, >, >=
    // 2. Concatenation: &
    // 3. Addition/Subtraction: +, -
    // 4. Multiplication/Division: *, /
    // 5. Unary: -, +
    // 6. Primary: literals, references, function calls, parentheses

    fn parse_expression(&mut self) -> FormulaResult<FormulaExpr> {
        self.descend()?;
        let expr = self.parse_comparison()?;
        self.depth -= 1;
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_concatenation()?;
        let mut chain = 0;

        loop {
            let op = match self.current_token() {
                Token::Equal => BinaryOperator::Equal,
                Token::NotEqual => BinaryOperator::NotEqual,
                Token::LessThan => BinaryOperator::LessThan,
                Token::LessEqual => BinaryOperator::LessEqual,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };

            self.consume();
            self.descend()?;
            chain += 1;
            let right = self.parse_concatenation()?;
            left = binary(op, left, right);
        }

        self.depth -= chain;
        Ok(left)
    }

    fn parse_concatenation(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_additive()?;
        let mut chain = 0;

        while matches!(self.current_token(), Token::Ampersand) {
            self.consume();
            self.descend()?;
            chain += 1;
            let right = self.parse_additive()?;
            left = binary(BinaryOperator::Concat, left, right);
        }

        self.depth -= chain;
        Ok(left)
    }

    fn parse_additive(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_multiplicative()?;
        let mut chain = 0;

        loop {
            let op = match self.current_token() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.consume();
            self.descend()?;
            chain += 1;
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }

        self.depth -= chain;
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_unary()?;
        let mut chain = 0;

        loop {
            let op = match self.current_token() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                _ => break,
            };

            self.consume();
            self.descend()?;
            chain += 1;
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }

        self.depth -= chain;
        Ok(left)
    }

    fn parse_unary(&mut self) -> FormulaResult<FormulaExpr> {
        // Prefix plus (no-op)
        while matches!(self.current_token(), Token::Plus) {
            self.consume();
        }

        // Prefix unary minus
        if matches!(self.current_token(), Token::Minus) {
            self.consume();
            self.descend()?;
            let operand = self.parse_unary()?;
            self.depth -= 1;
            return Ok(FormulaExpr::UnaryOp {
                op: UnaryOperator::Negate,
                operand: Box::new(operand),
            });
        }

        self.parse_primary()
    }

    fn parse_primary(&mut self) -> FormulaResult<FormulaExpr> {
        match self.consume() {
            Token::Number(n) => Ok(FormulaExpr::Number(n)),
            Token::String(s) => Ok(FormulaExpr::String(s)),
            Token::Boolean(b) => Ok(FormulaExpr::Boolean(b)),

            Token::LeftParen => {
                let expr = self.parse_expression()?;
                self.expect(&Token::RightParen)?;
                Ok(expr)
            }

            Token::CellRef(address) => Ok(FormulaExpr::CellRef(CellReference::Local(address))),
            Token::RangeRef(range) => Ok(FormulaExpr::CellRef(CellReference::LocalRange(range))),
            Token::PageRef { page, target } => {
                Ok(FormulaExpr::CellRef(CellReference::CrossPage { page, target }))
            }

            Token::Identifier(name) => {
                if matches!(self.current_token(), Token::LeftParen) {
                    self.parse_function_call(name)
                } else {
                    Err(FormulaError::Parse(format!("Unknown name '{}'", name)))
                }
            }

            Token::Eof => Err(FormulaError::Parse("Unexpected end of formula".into())),

            other => Err(FormulaError::Parse(format!(
                "Unexpected {}",
                describe(&other)
            ))),
        }
    }

    fn parse_function_call(&mut self, name: String) -> FormulaResult<FormulaExpr> {
        self.expect(&Token::LeftParen)?;

        let mut args = Vec::new();

        // Parse arguments
        if !matches!(self.current_token(), Token::RightParen) {
            args.push(self.parse_expression()?);

            while matches!(self.current_token(), Token::Comma) {
                self.consume();
                args.push(self.parse_expression()?);
            }
        }

        self.expect(&Token::RightParen)?;

        Ok(FormulaExpr::Function {
            name: name.to_uppercase(),
            args,
        })
    }
}

fn binary(op: BinaryOperator, left: FormulaExpr, right: FormulaExpr) -> FormulaExpr {
    FormulaExpr::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Human-readable token name for error messages
fn describe(token: &Token) -> String {
    match token {
        Token::Number(n) => format!("number {}", n),
        Token::String(s) => format!("string \"{}\"", s),
        Token::Boolean(b) => format!("boolean {}", if *b { "TRUE" } else { "FALSE" }),
        Token::Identifier(name) => format!("name '{}'", name),
        Token::CellRef(addr) => format!("reference {}", addr),
        Token::RangeRef(range) => format!("range {}", range),
        Token::PageRef { page, .. } => format!("page reference {}", page),
        Token::Plus => "'+'".into(),
        Token::Minus => "'-'".into(),
        Token::Star => "'*'".into(),
        Token::Slash => "'/'".into(),
        Token::Ampersand => "'&'".into(),
        Token::Equal => "'='".into(),
        Token::NotEqual => "'<>'".into(),
        Token::LessThan => "'<'".into(),
        Token::LessEqual => "'<='".into(),
        Token::GreaterThan => "'>'".into(),
        Token::GreaterEqual => "'>='".into(),
        Token::Comma => "','".into(),
        Token::LeftParen => "'('".into(),
        Token::RightParen => "')'".into(),
        Token::Eof => "end of formula".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{PageRef, PageTarget};
    use pretty_assertions::assert_eq;
    use sheetlink_core::{CellAddress, CellRange};

    #[test]
    fn test_parse_number() {
        let ast = parse_formula("=42").unwrap();
        assert_eq!(ast, FormulaExpr::Number(42.0));

        let ast = parse_formula("=3.14").unwrap();
        assert_eq!(ast, FormulaExpr::Number(3.14));

        let ast = parse_formula("=1e10").unwrap();
        assert_eq!(ast, FormulaExpr::Number(1e10));
    }

    #[test]
    fn test_parse_string() {
        let ast = parse_formula("=\"Hello \"\"World\"\"\"").unwrap();
        assert_eq!(ast, FormulaExpr::String("Hello \"World\"".into()));
    }

    #[test]
    fn test_parse_boolean() {
        assert_eq!(parse_formula("=TRUE").unwrap(), FormulaExpr::Boolean(true));
        assert_eq!(parse_formula("=false").unwrap(), FormulaExpr::Boolean(false));
    }

    #[test]
    fn test_parse_arithmetic_precedence() {
        // 1+(2*3)
        let ast = parse_formula("=1+2*3").unwrap();
        assert_eq!(
            ast,
            binary(
                BinaryOperator::Add,
                FormulaExpr::Number(1.0),
                binary(
                    BinaryOperator::Multiply,
                    FormulaExpr::Number(2.0),
                    FormulaExpr::Number(3.0)
                )
            )
        );

        // Left-associative: (10-4)-3
        let ast = parse_formula("=10-4-3").unwrap();
        assert_eq!(
            ast,
            binary(
                BinaryOperator::Subtract,
                binary(
                    BinaryOperator::Subtract,
                    FormulaExpr::Number(10.0),
                    FormulaExpr::Number(4.0)
                ),
                FormulaExpr::Number(3.0)
            )
        );
    }

    #[test]
    fn test_comparison_binds_loosest() {
        // (A1&"x") = ("a"&"x")
        let ast = parse_formula("=A1&\"x\"=\"a\"&\"x\"").unwrap();
        assert!(matches!(
            ast,
            FormulaExpr::BinaryOp {
                op: BinaryOperator::Equal,
                ..
            }
        ));

        // 1+2 > 2 is (1+2) > 2
        let ast = parse_formula("=1+2>2").unwrap();
        if let FormulaExpr::BinaryOp { op, left, .. } = ast {
            assert_eq!(op, BinaryOperator::GreaterThan);
            assert!(matches!(
                *left,
                FormulaExpr::BinaryOp {
                    op: BinaryOperator::Add,
                    ..
                }
            ));
        } else {
            panic!("Expected BinaryOp");
        }
    }

    #[test]
    fn test_concat_binds_looser_than_addition() {
        // "n="&(1+2)
        let ast = parse_formula("=\"n=\"&1+2").unwrap();
        if let FormulaExpr::BinaryOp { op, right, .. } = ast {
            assert_eq!(op, BinaryOperator::Concat);
            assert!(matches!(
                *right,
                FormulaExpr::BinaryOp {
                    op: BinaryOperator::Add,
                    ..
                }
            ));
        } else {
            panic!("Expected BinaryOp");
        }
    }

    #[test]
    fn test_parse_unary() {
        let ast = parse_formula("=-5").unwrap();
        assert_eq!(
            ast,
            FormulaExpr::UnaryOp {
                op: UnaryOperator::Negate,
                operand: Box::new(FormulaExpr::Number(5.0)),
            }
        );

        // Unary plus is a no-op
        assert_eq!(parse_formula("=+5").unwrap(), FormulaExpr::Number(5.0));
    }

    #[test]
    fn test_parse_references() {
        let ast = parse_formula("=$B$2").unwrap();
        assert_eq!(
            ast,
            FormulaExpr::CellRef(CellReference::Local(CellAddress::new(1, 1)))
        );

        let ast = parse_formula("=B10:A1").unwrap();
        assert_eq!(
            ast,
            FormulaExpr::CellRef(CellReference::LocalRange(CellRange::from_indices(
                0, 0, 9, 1
            )))
        );
    }

    #[test]
    fn test_parse_cross_page_reference() {
        let ast = parse_formula("=@[Sales Q1](sales-1):B2 * 2").unwrap();
        assert_eq!(
            ast,
            binary(
                BinaryOperator::Multiply,
                FormulaExpr::CellRef(CellReference::CrossPage {
                    page: PageRef::new("sales-1", "Sales Q1"),
                    target: PageTarget::Cell(CellAddress::new(1, 1)),
                }),
                FormulaExpr::Number(2.0)
            )
        );
    }

    #[test]
    fn test_parse_function() {
        let ast = parse_formula("=sum(1,2,A1:A3)").unwrap();
        if let FormulaExpr::Function { name, args } = ast {
            assert_eq!(name, "SUM");
            assert_eq!(args.len(), 3);
            assert!(matches!(
                &args[2],
                FormulaExpr::CellRef(CellReference::LocalRange(_))
            ));
        } else {
            panic!("Expected Function");
        }

        let ast = parse_formula("=NOW()").unwrap();
        assert_eq!(
            ast,
            FormulaExpr::Function {
                name: "NOW".into(),
                args: vec![],
            }
        );
    }

    #[test]
    fn test_parse_nested_function() {
        let ast = parse_formula("=IF(AND(A1>0,B1<100),A1*B1/100,0)").unwrap();
        if let FormulaExpr::Function { name, args } = ast {
            assert_eq!(name, "IF");
            assert_eq!(args.len(), 3);
        } else {
            panic!("Expected Function");
        }
    }

    #[test]
    fn test_parse_errors() {
        for bad in [
            "A1+1",
            "=",
            "=   ",
            "=(1+2",
            "=1+2)",
            "=1+",
            "=SUM(1,",
            "=SUM(1 2)",
            "=foo",
            "=A1 B1",
            "=@[Data](d1",
            "=1 # 2",
        ] {
            let result = parse_formula(bad);
            assert!(
                matches!(result, Err(FormulaError::Parse(_))),
                "{:?} should fail to parse, got {:?}",
                bad,
                result
            );
        }
    }

    #[test]
    fn test_render_round_trips() {
        for source in [
            "=1+2*3",
            "=(1+2)*3",
            "=10-(4-3)",
            "=-A1*2",
            "=\"a\"&B2=\"ab\"",
            "=SUM(A1:B3,@[Sales Q1](s-1):C1:C9,@[Data](d1))",
            "=IF(A1>=0,\"pos\",\"neg\")",
        ] {
            let ast = parse_formula(source).unwrap();
            let rendered = ast.to_formula_string();
            assert_eq!(rendered, source);
            assert_eq!(parse_formula(&rendered).unwrap(), ast);
        }
    }

    #[test]
    fn test_nesting_limit() {
        let nested_too_deep = |source: String| {
            assert_eq!(
                parse_formula(&source),
                Err(FormulaError::Parse("Formula nested too deeply".into()))
            );
        };
        let deep = 100_000;
        nested_too_deep(format!("={}1{}", "(".repeat(deep), ")".repeat(deep)));
        nested_too_deep(format!("={}1", "-".repeat(deep)));
        nested_too_deep(format!("=1{}", "+1".repeat(deep)));
        nested_too_deep(format!("=\"a\"{}", "&\"a\"".repeat(deep)));
        nested_too_deep(format!("={}1{}", "ABS(".repeat(deep), ")".repeat(deep)));

        // Plus signs build no nodes
        assert_eq!(
            parse_formula(&format!("={}5", "+".repeat(deep))).unwrap(),
            FormulaExpr::Number(5.0)
        );

        // Ordinary long formulas stay well inside the limit
        let terms: Vec<String> = (1..=200).map(|row| format!("A{}", row)).collect();
        assert!(parse_formula(&format!("={}", terms.join("+"))).is_ok());
        let parens = 100;
        assert_eq!(
            parse_formula(&format!("={}7{}", "(".repeat(parens), ")".repeat(parens))).unwrap(),
            FormulaExpr::Number(7.0)
        );
    }

    #[test]
    fn test_parse_cache_reuses_outcomes() {
        let mut cache = ParseCache::new();
        let first = cache.get_or_parse("=A1+1");
        let second = cache.get_or_parse("=A1+1");
        assert!(Arc::ptr_eq(&first, &second));

        let failed = cache.get_or_parse("=(");
        assert!(failed.is_err());
        assert_eq!(cache.len(), 2);
    }
}
