//! Formula tokenizer
//!
//! Turns the body of a formula (everything after the leading `=`) into a flat
//! token stream. References are lexed as composite tokens: `A1:B2` is a single
//! range token, and a cross-page reference such as `@[Sales Q1](p-42):B2` is a
//! single page token, because its label may contain spaces and punctuation.

use crate::ast::{PageRef, PageTarget};
use crate::error::{FormulaError, FormulaResult};
use sheetlink_core::{CellAddress, CellRange};

/// Token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Number(f64),
    String(String),
    Boolean(bool),

    /// Function name
    Identifier(String),
    /// Local cell reference like A1, $A$1
    CellRef(CellAddress),
    /// Local range reference like A1:B10
    RangeRef(CellRange),
    /// Cross-page reference like @[Label](id):A1
    PageRef { page: PageRef, target: PageTarget },

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Ampersand,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Comma,

    // Delimiters
    LeftParen,
    RightParen,

    // End of input
    Eof,
}

/// Tokenize a formula body. The returned stream always ends with [`Token::Eof`].
pub fn tokenize(input: &str) -> FormulaResult<Vec<Token>> {
    let mut lexer = Lexer { input, pos: 0 };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.scan_token()?;
        let done = token == Token::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn scan_token(&mut self) -> FormulaResult<Token> {
        self.skip_whitespace();

        let c = match self.peek_char() {
            Some(c) => c,
            None => return Ok(Token::Eof),
        };

        // Single-character tokens
        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '&' => Some(Token::Ampersand),
            '=' => Some(Token::Equal),
            ',' => Some(Token::Comma),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return Ok(token);
        }

        // Two-character operators
        if c == '<' {
            self.advance();
            if self.peek_char() == Some('=') {
                self.advance();
                return Ok(Token::LessEqual);
            } else if self.peek_char() == Some('>') {
                self.advance();
                return Ok(Token::NotEqual);
            }
            return Ok(Token::LessThan);
        }

        if c == '>' {
            self.advance();
            if self.peek_char() == Some('=') {
                self.advance();
                return Ok(Token::GreaterEqual);
            }
            return Ok(Token::GreaterThan);
        }

        if c == '"' {
            return self.scan_string();
        }

        if c == '@' {
            return self.scan_page_ref();
        }

        if c.is_ascii_digit() || (c == '.' && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit()))
        {
            return self.scan_number();
        }

        if c.is_ascii_alphabetic() || c == '_' || c == '$' {
            return self.scan_identifier_or_ref();
        }

        Err(FormulaError::Parse(format!(
            "Unexpected character '{}' at position {}",
            c, self.pos
        )))
    }

    fn scan_string(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        self.advance(); // Skip opening quote

        let mut s = String::new();
        loop {
            match self.peek_char() {
                Some('"') if self.peek_char_at(1) == Some('"') => {
                    // Escaped quote ("")
                    s.push('"');
                    self.advance();
                    self.advance();
                }
                Some('"') => {
                    self.advance();
                    return Ok(Token::String(s));
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
                None => {
                    return Err(FormulaError::Parse(format!(
                        "Unterminated string starting at position {}",
                        start
                    )))
                }
            }
        }
    }

    fn scan_number(&mut self) -> FormulaResult<Token> {
        let start = self.pos;

        self.skip_digits();

        if self.peek_char() == Some('.') {
            self.advance();
            self.skip_digits();
        }

        if self.peek_char().map_or(false, |c| c == 'e' || c == 'E') {
            self.advance();
            if self.peek_char().map_or(false, |c| c == '+' || c == '-') {
                self.advance();
            }
            self.skip_digits();
        }

        let num_str = &self.input[start..self.pos];
        num_str
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Token::Number)
            .ok_or_else(|| FormulaError::Parse(format!("Invalid number '{}'", num_str)))
    }

    fn scan_identifier_or_ref(&mut self) -> FormulaResult<Token> {
        let text = self.scan_word();

        // A name directly followed by '(' is a function call, even when it
        // looks like a cell (LOG10)
        if self.peek_char() == Some('(') {
            return Ok(Token::Identifier(text.to_string()));
        }

        let upper = text.to_ascii_uppercase();
        if upper == "TRUE" {
            return Ok(Token::Boolean(true));
        }
        if upper == "FALSE" {
            return Ok(Token::Boolean(false));
        }

        if !looks_like_cell_reference(text) {
            return Ok(Token::Identifier(text.to_string()));
        }

        let start = parse_address(text)?;
        if self.peek_char() != Some(':') {
            return Ok(Token::CellRef(start));
        }

        self.advance(); // Skip ':'
        let end_text = self.scan_word();
        if !looks_like_cell_reference(end_text) {
            return Err(FormulaError::Parse(format!(
                "Expected cell reference after '{}:'",
                text
            )));
        }
        let end = parse_address(end_text)?;
        Ok(Token::RangeRef(CellRange::new(start, end)))
    }

    /// `@[Label](page-id)` with an optional `:A1` or `:A1:B2` suffix
    fn scan_page_ref(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        self.advance(); // Skip '@'

        if self.peek_char() != Some('[') {
            return Err(FormulaError::Parse(format!(
                "Expected '[' after '@' at position {}",
                start
            )));
        }
        self.advance();

        let label = self.scan_until(']').ok_or_else(|| {
            FormulaError::Parse(format!(
                "Unterminated page label starting at position {}",
                start
            ))
        })?;

        if self.peek_char() != Some('(') {
            return Err(FormulaError::Parse(format!(
                "Expected '(' after page label '{}'",
                label
            )));
        }
        self.advance();

        let identifier = self.scan_until(')').ok_or_else(|| {
            FormulaError::Parse(format!("Unterminated page id after label '{}'", label))
        })?;
        if identifier.trim().is_empty() {
            return Err(FormulaError::Parse(format!(
                "Empty page id in reference to '{}'",
                label
            )));
        }

        let page = PageRef::new(identifier, label);

        if self.peek_char() != Some(':') {
            return Ok(Token::PageRef {
                page,
                target: PageTarget::WholeSheet,
            });
        }

        self.advance(); // Skip ':'
        let target = match self.scan_identifier_or_ref()? {
            Token::CellRef(addr) => PageTarget::Cell(addr),
            Token::RangeRef(range) => PageTarget::Range(range),
            _ => {
                return Err(FormulaError::Parse(format!(
                    "Expected cell or range after '{}:'",
                    page
                )))
            }
        };

        Ok(Token::PageRef { page, target })
    }

    // === Helper methods ===

    /// Consume characters up to (and including) `terminator`, returning the
    /// text before it, or `None` if the input ends first.
    fn scan_until(&mut self, terminator: char) -> Option<&'a str> {
        let rest = &self.input[self.pos..];
        let end = rest.find(terminator)?;
        self.pos += end + terminator.len_utf8();
        Some(&rest[..end])
    }

    fn scan_word(&mut self) -> &'a str {
        let start = self.pos;
        while self
            .peek_char()
            .map_or(false, |c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.')
        {
            self.advance();
        }
        &self.input[start..self.pos]
    }

    fn skip_digits(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }
}

/// Shape check for `[$]letters[$]digits`
fn looks_like_cell_reference(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut i = 0;

    if bytes.get(i) == Some(&b'$') {
        i += 1;
    }

    let letter_start = i;
    while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
        i += 1;
    }
    if i == letter_start {
        return false;
    }

    if bytes.get(i) == Some(&b'$') {
        i += 1;
    }

    let digit_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }

    i > digit_start && i == bytes.len()
}

fn parse_address(text: &str) -> FormulaResult<CellAddress> {
    CellAddress::parse(text)
        .map_err(|e| FormulaError::Parse(format!("Invalid cell reference '{}': {}", text, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tokenize_arithmetic() {
        let tokens = tokenize("B1 - B2*2").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::CellRef(CellAddress::new(0, 1)),
                Token::Minus,
                Token::CellRef(CellAddress::new(1, 1)),
                Token::Star,
                Token::Number(2.0),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_tokenize_range_is_one_token() {
        let tokens = tokenize("SUM(A1:B3)").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Identifier("SUM".into()),
                Token::LeftParen,
                Token::RangeRef(CellRange::from_indices(0, 0, 2, 1)),
                Token::RightParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_tokenize_comparisons() {
        let tokens = tokenize("1<>2<=3>=4<5>6=7").unwrap();
        let ops: Vec<Token> = tokens
            .into_iter()
            .filter(|t| !matches!(t, Token::Number(_) | Token::Eof))
            .collect();
        assert_eq!(
            ops,
            vec![
                Token::NotEqual,
                Token::LessEqual,
                Token::GreaterEqual,
                Token::LessThan,
                Token::GreaterThan,
                Token::Equal,
            ]
        );
    }

    #[test]
    fn test_tokenize_page_ref_with_spaces_in_label() {
        let tokens = tokenize("@[Sales Q1, final](page-42):B2 + 1").unwrap();
        assert_eq!(
            tokens[0],
            Token::PageRef {
                page: PageRef::new("page-42", "Sales Q1, final"),
                target: PageTarget::Cell(CellAddress::new(1, 1)),
            }
        );
        assert_eq!(tokens[1], Token::Plus);
    }

    #[test]
    fn test_tokenize_page_ref_range_and_whole_sheet() {
        let tokens = tokenize("@[Data](d1):A1:A3").unwrap();
        assert_eq!(
            tokens[0],
            Token::PageRef {
                page: PageRef::new("d1", "Data"),
                target: PageTarget::Range(CellRange::from_indices(0, 0, 2, 0)),
            }
        );

        let tokens = tokenize("@[Data](d1)").unwrap();
        assert_eq!(
            tokens[0],
            Token::PageRef {
                page: PageRef::new("d1", "Data"),
                target: PageTarget::WholeSheet,
            }
        );
    }

    #[test]
    fn test_tokenize_malformed_page_refs() {
        assert!(tokenize("@Data").is_err());
        assert!(tokenize("@[Data").is_err());
        assert!(tokenize("@[Data]d1").is_err());
        assert!(tokenize("@[Data](d1").is_err());
        assert!(tokenize("@[Data]()").is_err());
        assert!(tokenize("@[Data](d1):").is_err());
        assert!(tokenize("@[Data](d1):SUM").is_err());
    }

    #[test]
    fn test_tokenize_strings() {
        let tokens = tokenize("\"a \"\"b\"\"\"").unwrap();
        assert_eq!(tokens[0], Token::String("a \"b\"".into()));
        assert!(tokenize("\"open").is_err());
    }

    #[test]
    fn test_tokenize_rejects_unknown_characters() {
        let err = tokenize("1 # 2").unwrap_err();
        assert!(matches!(err, FormulaError::Parse(msg) if msg.contains('#')));
        assert!(tokenize("1e").is_err());
    }

    #[test]
    fn test_function_name_that_looks_like_cell() {
        let tokens = tokenize("LOG10(1)").unwrap();
        assert_eq!(tokens[0], Token::Identifier("LOG10".into()));
    }
}
