//! Formula parser
//!
//! A recursive descent parser for A1-style formulas with Excel operator
//! precedence, sheet-qualified and 3-D references, missing arguments and
//! parenthesised reference unions.

use crate::ast::{
    BinaryOperator, CellReference, FormulaExpr, RangeReference, SheetSpan, UnaryOperator,
};
use crate::error::{FormulaError, FormulaResult};
use sheetcalc_core::{CellAddress, CellRange, ErrorCode};

/// Parse a formula string into an AST
///
/// # Example
/// ```rust
/// use sheetcalc_formula::parse_formula;
///
/// let ast = parse_formula("=1+2").unwrap();
/// let ast = parse_formula("=SUM(Sheet1:Sheet3!A1:B2)").unwrap();
/// let ast = parse_formula("=AREAS((A1:B2,C3))").unwrap();
/// ```
pub fn parse_formula(formula: &str) -> FormulaResult<FormulaExpr> {
    if formula.chars().count() > MAX_FORMULA_LENGTH {
        return Err(FormulaError::Parse(format!(
            "Formula is longer than {} characters",
            MAX_FORMULA_LENGTH
        )));
    }
    let formula = formula
        .trim()
        .strip_prefix('=')
        .ok_or_else(|| FormulaError::Parse("Formula must start with '='".into()))?;
    parse_expression_text(formula)
}

/// Parse the refers-to text of a defined name (leading `=` optional)
pub fn parse_defined_name(name: &str, refers_to: &str) -> FormulaResult<FormulaExpr> {
    let text = refers_to.trim();
    let text = text.strip_prefix('=').unwrap_or(text);
    parse_expression_text(text).map_err(|e| FormulaError::InvalidName {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

fn parse_expression_text(text: &str) -> FormulaResult<FormulaExpr> {
    let mut parser = FormulaParser::new(text)?;
    let expr = parser.parse_expression()?;

    if !matches!(parser.current_token(), Token::Eof) {
        return Err(FormulaError::Parse(format!(
            "Unexpected {:?} after expression",
            parser.current_token()
        )));
    }

    Ok(expr)
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Literals
    Number(f64),
    String(String),
    Boolean(bool),
    Error(ErrorCode),

    // Identifiers and references
    Identifier(String),  // Function name or defined name
    CellRef(String),     // Cell reference like A1, $A$1
    SheetRef(SheetSpan), // Sheet prefix like Sheet1! or 'My Sheet'!

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Percent,
    Ampersand,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Colon,
    Comma,
    Semicolon,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,

    // End of input
    Eof,
}

/// Longest formula text accepted, counting the leading `=`
pub const MAX_FORMULA_LENGTH: usize = 8192;

/// Deepest nesting of parentheses, function calls and array constants
pub const MAX_NESTING_DEPTH: usize = 64;

/// Formula parser
struct FormulaParser<'a> {
    input: &'a str,
    pos: usize,
    current_token: Token,
    depth: usize,
}

impl<'a> FormulaParser<'a> {
    fn new(input: &'a str) -> FormulaResult<Self> {
        let mut parser = Self {
            input,
            pos: 0,
            current_token: Token::Eof,
            depth: 0,
        };
        parser.advance_token()?;
        Ok(parser)
    }

    // === Token scanning ===

    fn advance_token(&mut self) -> FormulaResult<()> {
        self.current_token = self.scan_token()?;
        Ok(())
    }

    fn scan_token(&mut self) -> FormulaResult<Token> {
        self.skip_whitespace();

        let Some(c) = self.peek_char() else {
            return Ok(Token::Eof);
        };

        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '^' => Some(Token::Caret),
            '%' => Some(Token::Percent),
            '&' => Some(Token::Ampersand),
            ':' => Some(Token::Colon),
            ',' => Some(Token::Comma),
            ';' => Some(Token::Semicolon),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            '{' => Some(Token::LeftBrace),
            '}' => Some(Token::RightBrace),
            '=' => Some(Token::Equal),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return Ok(token);
        }

        // Two-character operators
        if c == '<' {
            self.advance();
            return Ok(match self.peek_char() {
                Some('=') => {
                    self.advance();
                    Token::LessEqual
                }
                Some('>') => {
                    self.advance();
                    Token::NotEqual
                }
                _ => Token::LessThan,
            });
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

        if c == '\'' {
            return self.scan_quoted_sheet();
        }

        if c.is_ascii_digit()
            || (c == '.' && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit()))
        {
            return self.scan_number();
        }

        if c == '#' {
            return self.scan_error();
        }

        if c.is_alphabetic() || c == '_' || c == '$' || c == '\\' {
            return self.scan_identifier_or_ref();
        }

        Err(FormulaError::Parse(format!(
            "Unexpected character '{}' at position {}",
            c, self.pos
        )))
    }

    fn scan_string(&mut self) -> FormulaResult<Token> {
        self.advance(); // opening quote

        let mut s = String::new();
        loop {
            match self.peek_char() {
                Some('"') if self.peek_char_at(1) == Some('"') => {
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
                None => return Err(FormulaError::Parse("Unterminated string literal".into())),
            }
        }
    }

    /// `'My Sheet'!` or `'First:Last'!`; `''` escapes a quote
    fn scan_quoted_sheet(&mut self) -> FormulaResult<Token> {
        self.advance(); // opening quote

        let mut name = String::new();
        loop {
            match self.peek_char() {
                Some('\'') if self.peek_char_at(1) == Some('\'') => {
                    name.push('\'');
                    self.advance();
                    self.advance();
                }
                Some('\'') => {
                    self.advance();
                    break;
                }
                Some(c) => {
                    name.push(c);
                    self.advance();
                }
                None => return Err(FormulaError::Parse("Unterminated sheet name".into())),
            }
        }

        if self.peek_char() != Some('!') {
            return Err(FormulaError::Parse(format!(
                "Expected '!' after sheet name '{}'",
                name
            )));
        }
        self.advance();

        let span = match name.split_once(':') {
            Some((first, last)) => SheetSpan {
                first: first.to_string(),
                last: Some(last.to_string()),
            },
            None => SheetSpan::single(name),
        };
        Ok(Token::SheetRef(span))
    }

    fn scan_number(&mut self) -> FormulaResult<Token> {
        let start = self.pos;

        self.skip_digits();
        if self.peek_char() == Some('.') {
            self.advance();
            self.skip_digits();
        }
        if matches!(self.peek_char(), Some('e' | 'E')) {
            self.advance();
            if matches!(self.peek_char(), Some('+' | '-')) {
                self.advance();
            }
            self.skip_digits();
        }

        let text = &self.input[start..self.pos];
        text.parse()
            .map(Token::Number)
            .map_err(|_| FormulaError::Parse(format!("Invalid number '{}'", text)))
    }

    fn scan_error(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        self.advance();
        while self
            .peek_char()
            .map_or(false, |c| c.is_ascii_alphanumeric() || c == '/')
        {
            self.advance();
        }
        if matches!(self.peek_char(), Some('!' | '?')) {
            self.advance();
        }

        let text = &self.input[start..self.pos];
        text.parse::<ErrorCode>()
            .map(Token::Error)
            .map_err(|_| FormulaError::Parse(format!("Unknown error literal '{}'", text)))
    }

    fn scan_identifier_or_ref(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        self.skip_identifier_chars();
        let text = &self.input[start..self.pos];

        // Sheet1!A1
        if self.peek_char() == Some('!') {
            self.advance();
            return Ok(Token::SheetRef(SheetSpan::single(text)));
        }

        // Sheet1:Sheet3!A1 - only a sheet span when the second name is followed by '!'
        if self.peek_char() == Some(':') {
            let rest = &self.input[self.pos + 1..];
            let len = rest
                .find(|c: char| !is_identifier_char(c))
                .unwrap_or(rest.len());
            if len > 0 && rest[len..].starts_with('!') {
                let last = rest[..len].to_string();
                self.pos += 1 + len + 1;
                return Ok(Token::SheetRef(SheetSpan {
                    first: text.to_string(),
                    last: Some(last),
                }));
            }
        }

        let followed_by_paren = self.peek_non_whitespace() == Some('(');

        if !followed_by_paren {
            if text.eq_ignore_ascii_case("TRUE") {
                return Ok(Token::Boolean(true));
            }
            if text.eq_ignore_ascii_case("FALSE") {
                return Ok(Token::Boolean(false));
            }
            // LOG10(100) is a function call, LOG10 alone a cell
            if looks_like_cell_reference(text) {
                return Ok(Token::CellRef(text.to_string()));
            }
        }

        Ok(Token::Identifier(text.to_string()))
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn peek_non_whitespace(&self) -> Option<char> {
        self.input[self.pos..].chars().find(|c| !c.is_whitespace())
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, char::is_whitespace) {
            self.advance();
        }
    }

    fn skip_digits(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn skip_identifier_chars(&mut self) {
        while self.peek_char().map_or(false, is_identifier_char) {
            self.advance();
        }
    }

    fn current_token(&self) -> &Token {
        &self.current_token
    }

    fn consume(&mut self) -> FormulaResult<Token> {
        let token = std::mem::replace(&mut self.current_token, Token::Eof);
        self.advance_token()?;
        Ok(token)
    }

    fn expect(&mut self, expected: &Token) -> FormulaResult<()> {
        if self.current_token() == expected {
            self.consume()?;
            Ok(())
        } else {
            Err(FormulaError::Parse(format!(
                "Expected {:?}, got {:?}",
                expected,
                self.current_token()
            )))
        }
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. Comparison: =, <>, <, <=, >, >=
    // 2. Concatenation: &
    // 3. Addition/Subtraction: +, -
    // 4. Multiplication/Division: *, /
    // 5. Exponentiation: ^
    // 6. Unary: -, +, %
    // 7. Range: :
    // 8. Primary: literals, references, function calls, parentheses

    fn parse_expression(&mut self) -> FormulaResult<FormulaExpr> {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_concatenation()?;

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

            self.consume()?;
            let right = self.parse_concatenation()?;
            left = binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_concatenation(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_additive()?;

        while matches!(self.current_token(), Token::Ampersand) {
            self.consume()?;
            let right = self.parse_additive()?;
            left = binary(BinaryOperator::Concat, left, right);
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current_token() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.consume()?;
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_exponent()?;

        loop {
            let op = match self.current_token() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                _ => break,
            };

            self.consume()?;
            let right = self.parse_exponent()?;
            left = binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_exponent(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_unary()?;

        // Excel evaluates 2^3^2 left to right
        while matches!(self.current_token(), Token::Caret) {
            self.consume()?;
            let right = self.parse_unary()?;
            left = binary(BinaryOperator::Power, left, right);
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> FormulaResult<FormulaExpr> {
        let mut prefix = Vec::new();
        loop {
            let op = match self.current_token() {
                Token::Minus => UnaryOperator::Negate,
                Token::Plus => UnaryOperator::Plus,
                _ => break,
            };
            self.consume()?;
            prefix.push(op);
        }

        let mut expr = self.parse_range()?;

        while matches!(self.current_token(), Token::Percent) {
            self.consume()?;
            expr = FormulaExpr::UnaryOp {
                op: UnaryOperator::Percent,
                operand: Box::new(expr),
            };
        }

        // Prefix operators bind looser than a trailing %
        for op in prefix.into_iter().rev() {
            expr = FormulaExpr::UnaryOp {
                op,
                operand: Box::new(expr),
            };
        }

        Ok(expr)
    }

    fn parse_range(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_primary()?;

        while matches!(self.current_token(), Token::Colon) {
            self.consume()?;
            let right = self.parse_primary()?;

            left = match (left, right) {
                (FormulaExpr::CellRef(start), FormulaExpr::CellRef(end))
                    if end.sheet.is_none() || end.sheet == start.sheet =>
                {
                    FormulaExpr::RangeRef(RangeReference {
                        range: CellRange::new(start.address, end.address),
                        sheet: start.sheet,
                    })
                }
                (left, right) => binary(BinaryOperator::Range, left, right),
            };
        }

        Ok(left)
    }

    fn parse_primary(&mut self) -> FormulaResult<FormulaExpr> {
        match self.consume()? {
            Token::Number(n) => Ok(FormulaExpr::Number(n)),
            Token::String(s) => Ok(FormulaExpr::String(s)),
            Token::Boolean(b) => Ok(FormulaExpr::Boolean(b)),
            Token::Error(e) => Ok(FormulaExpr::Error(e)),
            Token::LeftParen => self.nested(Self::parse_parenthesised),
            Token::LeftBrace => self.nested(Self::parse_array),
            Token::SheetRef(sheet) => self.parse_sheet_reference(sheet),
            Token::CellRef(text) => parse_cell_reference(None, &text),
            Token::Identifier(name) => {
                if matches!(self.current_token(), Token::LeftParen) {
                    self.nested(|parser| parser.parse_function_call(name))
                } else {
                    Ok(FormulaExpr::NameRef(name))
                }
            }
            token => Err(FormulaError::Parse(format!("Unexpected token: {:?}", token))),
        }
    }

    /// Run `parse` one nesting level deeper
    fn nested(
        &mut self,
        parse: impl FnOnce(&mut Self) -> FormulaResult<FormulaExpr>,
    ) -> FormulaResult<FormulaExpr> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(FormulaError::Parse(format!(
                "Formula nests deeper than {} levels",
                MAX_NESTING_DEPTH
            )));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// `(expr)` or a reference union `(A1:B2,C3)`
    fn parse_parenthesised(&mut self) -> FormulaResult<FormulaExpr> {
        let mut expr = self.parse_expression()?;
        while matches!(self.current_token(), Token::Comma) {
            self.consume()?;
            let right = self.parse_expression()?;
            expr = binary(BinaryOperator::Union, expr, right);
        }
        self.expect(&Token::RightParen)?;
        Ok(expr)
    }

    fn parse_array(&mut self) -> FormulaResult<FormulaExpr> {
        let mut rows = Vec::new();
        let mut current_row = Vec::new();

        if !matches!(self.current_token(), Token::RightBrace) {
            current_row.push(self.parse_expression()?);

            loop {
                match self.current_token() {
                    Token::Comma => {
                        self.consume()?;
                        current_row.push(self.parse_expression()?);
                    }
                    Token::Semicolon => {
                        self.consume()?;
                        rows.push(std::mem::take(&mut current_row));
                        current_row.push(self.parse_expression()?);
                    }
                    Token::RightBrace => break,
                    _ => {
                        return Err(FormulaError::Parse(
                            "Expected ',' ';' or '}' in array".into(),
                        ))
                    }
                }
            }
        }

        if !current_row.is_empty() {
            rows.push(current_row);
        }
        self.expect(&Token::RightBrace)?;

        if rows.is_empty() {
            return Err(FormulaError::Parse("Empty array constant".into()));
        }
        if rows.iter().any(|row| row.len() != rows[0].len()) {
            return Err(FormulaError::Parse(
                "Array constant rows must have equal length".into(),
            ));
        }
        Ok(FormulaExpr::Array(rows))
    }

    fn parse_function_call(&mut self, name: String) -> FormulaResult<FormulaExpr> {
        self.expect(&Token::LeftParen)?;

        let mut args = Vec::new();

        if !matches!(self.current_token(), Token::RightParen) {
            loop {
                // An empty slot before ',' or ')' is a missing argument
                if matches!(self.current_token(), Token::Comma | Token::RightParen) {
                    args.push(FormulaExpr::Missing);
                } else {
                    args.push(self.parse_expression()?);
                }

                if matches!(self.current_token(), Token::Comma) {
                    self.consume()?;
                } else {
                    break;
                }
            }
        }

        self.expect(&Token::RightParen)?;

        Ok(FormulaExpr::Function {
            name: name.to_uppercase(),
            args,
        })
    }

    fn parse_sheet_reference(&mut self, sheet: SheetSpan) -> FormulaResult<FormulaExpr> {
        match self.consume()? {
            Token::CellRef(text) => parse_cell_reference(Some(sheet), &text),
            token => Err(FormulaError::Parse(format!(
                "Expected cell reference after sheet name, got {:?}",
                token
            ))),
        }
    }
}

fn binary(op: BinaryOperator, left: FormulaExpr, right: FormulaExpr) -> FormulaExpr {
    FormulaExpr::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '.' || c == '\\'
}

/// `[$]letters[$]digits` with at most three column letters
fn looks_like_cell_reference(text: &str) -> bool {
    let rest = text.strip_prefix('$').unwrap_or(text);
    let letters = rest
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    if letters == 0 || letters > 3 {
        return false;
    }
    let rest = &rest[letters..];
    let digits = rest.strip_prefix('$').unwrap_or(rest);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn parse_cell_reference(sheet: Option<SheetSpan>, text: &str) -> FormulaResult<FormulaExpr> {
    let address = CellAddress::parse(text)
        .map_err(|e| FormulaError::InvalidReference(format!("'{}': {}", text, e)))?;
    Ok(FormulaExpr::CellRef(CellReference { sheet, address }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cell(sheet: Option<SheetSpan>, a1: &str) -> FormulaExpr {
        FormulaExpr::CellRef(CellReference {
            sheet,
            address: CellAddress::parse(a1).unwrap(),
        })
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_formula("=42").unwrap(), FormulaExpr::Number(42.0));
        assert_eq!(parse_formula("=3.14").unwrap(), FormulaExpr::Number(3.14));
        assert_eq!(parse_formula("=1e10").unwrap(), FormulaExpr::Number(1e10));
        assert_eq!(parse_formula("=.5").unwrap(), FormulaExpr::Number(0.5));
    }

    #[test]
    fn test_parse_string() {
        assert_eq!(
            parse_formula("=\"Hello \"\"World\"\"\"").unwrap(),
            FormulaExpr::String("Hello \"World\"".into())
        );
        assert!(parse_formula("=\"open").is_err());
    }

    #[test]
    fn test_parse_boolean_and_errors() {
        assert_eq!(parse_formula("=TRUE").unwrap(), FormulaExpr::Boolean(true));
        assert_eq!(parse_formula("=false").unwrap(), FormulaExpr::Boolean(false));
        assert_eq!(
            parse_formula("=#DIV/0!").unwrap(),
            FormulaExpr::Error(ErrorCode::Div0)
        );
        assert_eq!(
            parse_formula("=#N/A").unwrap(),
            FormulaExpr::Error(ErrorCode::Na)
        );
        assert_eq!(
            parse_formula("=#NAME?").unwrap(),
            FormulaExpr::Error(ErrorCode::Name)
        );
        assert!(parse_formula("=#BOGUS!").is_err());
    }

    #[test]
    fn test_parse_precedence() {
        assert_eq!(
            parse_formula("=1+2*3").unwrap(),
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

        // Negation binds tighter than ^
        assert_eq!(
            parse_formula("=-2^2").unwrap(),
            binary(
                BinaryOperator::Power,
                FormulaExpr::UnaryOp {
                    op: UnaryOperator::Negate,
                    operand: Box::new(FormulaExpr::Number(2.0)),
                },
                FormulaExpr::Number(2.0)
            )
        );

        assert!(matches!(
            parse_formula("=A1<>B1").unwrap(),
            FormulaExpr::BinaryOp {
                op: BinaryOperator::NotEqual,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_unary() {
        assert!(matches!(
            parse_formula("=50%").unwrap(),
            FormulaExpr::UnaryOp {
                op: UnaryOperator::Percent,
                ..
            }
        ));
        assert!(matches!(
            parse_formula("=+A1").unwrap(),
            FormulaExpr::UnaryOp {
                op: UnaryOperator::Plus,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_cell_reference() {
        assert_eq!(parse_formula("=A1").unwrap(), cell(None, "A1"));

        let FormulaExpr::CellRef(r) = parse_formula("=$B$2").unwrap() else {
            panic!("Expected CellRef");
        };
        assert_eq!((r.address.row, r.address.col), (1, 1));
        assert!(r.address.row_absolute && r.address.col_absolute);

        assert!(matches!(
            parse_formula("=A1048577"),
            Err(FormulaError::InvalidReference(_))
        ));
    }

    #[test]
    fn test_parse_sheet_references() {
        assert_eq!(
            parse_formula("=Sheet2!C3").unwrap(),
            cell(Some(SheetSpan::single("Sheet2")), "C3")
        );
        assert_eq!(
            parse_formula("='My Sheet'!A1").unwrap(),
            cell(Some(SheetSpan::single("My Sheet")), "A1")
        );
        assert_eq!(
            parse_formula("='It''s'!A1").unwrap(),
            cell(Some(SheetSpan::single("It's")), "A1")
        );

        let FormulaExpr::RangeRef(r) = parse_formula("=Data!A1:B2").unwrap() else {
            panic!("Expected RangeRef");
        };
        assert_eq!(r.sheet, Some(SheetSpan::single("Data")));
        assert_eq!(r.range, CellRange::parse("A1:B2").unwrap());
    }

    #[test]
    fn test_parse_three_d_references() {
        let span = SheetSpan {
            first: "Sheet1".into(),
            last: Some("Sheet3".into()),
        };

        let FormulaExpr::RangeRef(r) = parse_formula("=Sheet1:Sheet3!A1:B2").unwrap() else {
            panic!("Expected RangeRef");
        };
        assert_eq!(r.sheet, Some(span.clone()));
        assert!(r.sheet.as_ref().map_or(false, SheetSpan::is_3d));

        assert_eq!(
            parse_formula("='Sheet1:Sheet3'!B5").unwrap(),
            cell(Some(span), "B5")
        );
    }

    #[test]
    fn test_parse_range_reference() {
        let FormulaExpr::RangeRef(r) = parse_formula("=B10:A1").unwrap() else {
            panic!("Expected RangeRef");
        };
        assert_eq!(r.range, CellRange::parse("A1:B10").unwrap());

        // Range between a reference and a name stays an operator
        assert!(matches!(
            parse_formula("=A1:Corner").unwrap(),
            FormulaExpr::BinaryOp {
                op: BinaryOperator::Range,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_function() {
        let FormulaExpr::Function { name, args } = parse_formula("=sum(A1:A10, 2)").unwrap() else {
            panic!("Expected Function");
        };
        assert_eq!(name, "SUM");
        assert_eq!(args.len(), 2);
        assert!(matches!(&args[0], FormulaExpr::RangeRef(_)));

        // LOG10 is a valid cell address but a call here
        assert!(matches!(
            parse_formula("=LOG10(100)").unwrap(),
            FormulaExpr::Function { .. }
        ));
    }

    #[test]
    fn test_parse_missing_arguments() {
        let FormulaExpr::Function { args, .. } = parse_formula("=PRODUCT(2,)").unwrap() else {
            panic!("Expected Function");
        };
        assert_eq!(args, vec![FormulaExpr::Number(2.0), FormulaExpr::Missing]);

        let FormulaExpr::Function { args, .. } = parse_formula("=IF(,,)").unwrap() else {
            panic!("Expected Function");
        };
        assert_eq!(args, vec![FormulaExpr::Missing; 3]);

        let FormulaExpr::Function { args, .. } = parse_formula("=NA()").unwrap() else {
            panic!("Expected Function");
        };
        assert!(args.is_empty());
    }

    #[test]
    fn test_parse_union() {
        let FormulaExpr::Function { args, .. } = parse_formula("=AREAS((A1:B2,C3,D4:E5))").unwrap()
        else {
            panic!("Expected Function");
        };
        assert_eq!(args.len(), 1);
        let FormulaExpr::BinaryOp { op, left, .. } = &args[0] else {
            panic!("Expected union");
        };
        assert_eq!(*op, BinaryOperator::Union);
        assert!(matches!(
            **left,
            FormulaExpr::BinaryOp {
                op: BinaryOperator::Union,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_array() {
        let FormulaExpr::Array(rows) = parse_formula("={1,2;3,4}").unwrap() else {
            panic!("Expected Array");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec![FormulaExpr::Number(3.0), FormulaExpr::Number(4.0)]);

        assert!(parse_formula("={1,2;3}").is_err());
        assert!(parse_formula("={}").is_err());
    }

    #[test]
    fn test_parse_defined_name_text() {
        assert_eq!(
            parse_defined_name("Rate", "Sheet1!$B$1").unwrap(),
            cell(
                Some(SheetSpan::single("Sheet1")),
                "$B$1"
            )
        );
        assert!(matches!(
            parse_defined_name("Broken", "=1+"),
            Err(FormulaError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_nesting_limit() {
        let parens = |depth: usize| format!("={}1{}", "(".repeat(depth), ")".repeat(depth));
        assert!(parse_formula(&parens(MAX_NESTING_DEPTH)).is_ok());
        assert!(matches!(
            parse_formula(&parens(MAX_NESTING_DEPTH + 1)),
            Err(FormulaError::Parse(_))
        ));
        assert!(parse_formula(&parens(5000)).is_err());

        let calls = |depth: usize| format!("={}1{}", "ABS(".repeat(depth), ")".repeat(depth));
        assert!(parse_formula(&calls(MAX_NESTING_DEPTH)).is_ok());
        assert!(parse_formula(&calls(MAX_NESTING_DEPTH + 1)).is_err());
        assert!(parse_formula(&format!("={}1{}", "{".repeat(100), "}".repeat(100))).is_err());
    }

    #[test]
    fn test_long_unary_chain() {
        let expr = parse_formula(&format!("={}5%", "-".repeat(2000))).unwrap();
        let mut depth = 0;
        let mut node = &expr;
        while let FormulaExpr::UnaryOp { op, operand } = node {
            let expected = if depth < 2000 {
                UnaryOperator::Negate
            } else {
                UnaryOperator::Percent
            };
            assert_eq!(*op, expected);
            depth += 1;
            node = operand;
        }
        assert_eq!(depth, 2001);
        assert_eq!(*node, FormulaExpr::Number(5.0));
    }

    #[test]
    fn test_formula_length_limit() {
        // "=" plus 4095 "1+" pairs plus a final "1" is exactly at the limit
        let at_limit = format!("={}1", "1+".repeat(4095));
        assert_eq!(at_limit.len(), MAX_FORMULA_LENGTH);
        assert!(parse_formula(&at_limit).is_ok());
        let too_long = format!("{}1", at_limit);
        assert!(matches!(parse_formula(&too_long), Err(FormulaError::Parse(_))));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_formula("1+2").is_err());
        assert!(parse_formula("=1+").is_err());
        assert!(parse_formula("=(1").is_err());
        assert!(parse_formula("=1 2").is_err());
        assert!(parse_formula("=1 @ 2").is_err());
    }
}
