//! Expression parser
//!
//! A recursive descent parser for the closed expression grammar that remains
//! once references have been extracted into slots.

use crate::ast::{BinaryOperator, Expr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::reference::{ParsedFormula, Segment};

/// Compile a formula template into an AST
///
/// Reference slots become [`Expr::Slot`] nodes and quoted literals become
/// [`Expr::Text`]; only the remaining text is tokenized.
pub fn compile(formula: &ParsedFormula) -> FormulaResult<Expr> {
    let mut tokens = Vec::new();
    for segment in formula.segments() {
        match segment {
            Segment::Text(text) => Lexer::new(text).tokenize(&mut tokens)?,
            Segment::Literal(text) => tokens.push(Token::String(text.clone())),
            Segment::Ref(index) => tokens.push(Token::Slot(*index)),
        }
    }
    ExprParser::new(tokens).parse()
}

/// Parse plain expression text (no reference syntax)
///
/// # Example
/// ```rust
/// use tabula_formula::parse_expression;
///
/// let ast = parse_expression("1 + 2 * 3").unwrap();
/// let ast = parse_expression("IF(2 > 1, \"yes\", \"no\")").unwrap();
/// ```
pub fn parse_expression(text: &str) -> FormulaResult<Expr> {
    let mut tokens = Vec::new();
    Lexer::new(text).tokenize(&mut tokens)?;
    ExprParser::new(tokens).parse()
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Literals
    Number(f64),
    String(String),
    Boolean(bool),

    // Names
    Identifier(String),
    Slot(usize),

    // Keywords
    And,
    Or,
    Not,

    // Operators
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
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

/// Scanner over one text segment
struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn tokenize(mut self, tokens: &mut Vec<Token>) -> FormulaResult<()> {
        loop {
            self.skip_whitespace();
            let Some(c) = self.peek_char() else {
                return Ok(());
            };
            let token = match c {
                '0'..='9' | '.' => self.scan_number()?,
                '"' | '\'' => self.scan_string(c)?,
                c if c.is_alphabetic() || c == '_' => self.scan_identifier(),
                _ => self.scan_operator(c)?,
            };
            tokens.push(token);
        }
    }

    fn scan_operator(&mut self, c: char) -> FormulaResult<Token> {
        let next = self.peek_char_at(1);
        let (token, len) = match (c, next) {
            ('*', Some('*')) => (Token::StarStar, 2),
            ('=', Some('=')) => (Token::Equal, 2),
            ('!', Some('=')) => (Token::NotEqual, 2),
            ('<', Some('>')) => (Token::NotEqual, 2),
            ('<', Some('=')) => (Token::LessEqual, 2),
            ('>', Some('=')) => (Token::GreaterEqual, 2),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            ('=', _) => (Token::Equal, 1),
            ('<', _) => (Token::LessThan, 1),
            ('>', _) => (Token::GreaterThan, 1),
            (',', _) => (Token::Comma, 1),
            ('(', _) => (Token::LeftParen, 1),
            (')', _) => (Token::RightParen, 1),
            _ => {
                return Err(FormulaError::Parse(format!(
                    "Unexpected character '{}' in '{}'",
                    c, self.input
                )))
            }
        };
        for _ in 0..len {
            self.advance();
        }
        Ok(token)
    }

    fn scan_string(&mut self, quote: char) -> FormulaResult<Token> {
        self.advance(); // Skip opening quote

        let rest = &self.input[self.pos..];
        let len = rest
            .find(quote)
            .ok_or_else(|| FormulaError::Parse("Unterminated string literal".into()))?;
        let s = rest[..len].to_string();
        self.pos += len + quote.len_utf8();

        Ok(Token::String(s))
    }

    fn scan_number(&mut self) -> FormulaResult<Token> {
        let start = self.pos;

        // Integer part
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }

        // Decimal part
        if self.peek_char() == Some('.') {
            self.advance();
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        // Exponent part, only when digits follow
        if self.peek_char().map_or(false, |c| c == 'e' || c == 'E') {
            let sign = self.peek_char_at(1).map_or(false, |c| c == '+' || c == '-');
            let digit_at = if sign { 2 } else { 1 };
            if self
                .peek_char_at(digit_at)
                .map_or(false, |c| c.is_ascii_digit())
            {
                for _ in 0..digit_at {
                    self.advance();
                }
                while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        let num_str = &self.input[start..self.pos];
        num_str
            .parse()
            .map(Token::Number)
            .map_err(|_| FormulaError::Parse(format!("Invalid number '{}'", num_str)))
    }

    fn scan_identifier(&mut self) -> Token {
        let start = self.pos;
        while self
            .peek_char()
            .map_or(false, |c| c.is_alphanumeric() || c == '_')
        {
            self.advance();
        }

        let text = &self.input[start..self.pos];
        match text.to_lowercase().as_str() {
            "true" => Token::Boolean(true),
            "false" => Token::Boolean(false),
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            _ => Token::Identifier(text.to_string()),
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

/// Parser over a token stream
struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl ExprParser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn parse(mut self) -> FormulaResult<Expr> {
        if self.tokens.is_empty() {
            return Err(FormulaError::Parse("Empty expression".into()));
        }

        let expr = self.parse_expression()?;

        // Make sure we consumed all input
        if !matches!(self.current_token(), Token::Eof) {
            return Err(FormulaError::Parse(format!(
                "Unexpected token after expression: {:?}",
                self.current_token()
            )));
        }

        Ok(expr)
    }

    // === Helper methods ===

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
                "Expected {:?}, got {:?}",
                expected,
                self.current_token()
            )))
        }
    }

    fn binary(op: BinaryOperator, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. or
    // 2. and
    // 3. not
    // 4. Comparison: ==, =, !=, <>, <, <=, >, >=
    // 5. Addition/Subtraction: +, -
    // 6. Multiplication/Division/Modulo: *, /, %
    // 7. Unary: -, +
    // 8. Exponentiation: ** (right associative)
    // 9. Primary: literals, slots, function calls, parentheses

    fn parse_expression(&mut self) -> FormulaResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_and()?;
        while matches!(self.current_token(), Token::Or) {
            self.consume();
            let right = self.parse_and()?;
            left = Self::binary(BinaryOperator::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_not()?;
        while matches!(self.current_token(), Token::And) {
            self.consume();
            let right = self.parse_not()?;
            left = Self::binary(BinaryOperator::And, left, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> FormulaResult<Expr> {
        if matches!(self.current_token(), Token::Not) {
            self.consume();
            let operand = self.parse_not()?;
            return Ok(Expr::Unary {
                op: UnaryOperator::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    /// Comparisons chain: `a < b < c` means `a < b and b < c`
    fn parse_comparison(&mut self) -> FormulaResult<Expr> {
        let mut operand = self.parse_additive()?;
        let mut chain: Option<Expr> = None;

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
            let right = self.parse_additive()?;
            let link = Self::binary(op, operand, right.clone());
            chain = Some(match chain {
                Some(chain) => Self::binary(BinaryOperator::And, chain, link),
                None => link,
            });
            operand = right;
        }

        Ok(chain.unwrap_or(operand))
    }

    fn parse_additive(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current_token() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.consume();
            let right = self.parse_multiplicative()?;
            left = Self::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.current_token() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                Token::Percent => BinaryOperator::Modulo,
                _ => break,
            };

            self.consume();
            let right = self.parse_unary()?;
            left = Self::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> FormulaResult<Expr> {
        let op = match self.current_token() {
            Token::Minus => UnaryOperator::Negate,
            Token::Plus => UnaryOperator::Plus,
            _ => return self.parse_power(),
        };

        self.consume();
        let operand = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_power(&mut self) -> FormulaResult<Expr> {
        let base = self.parse_primary()?;

        if matches!(self.current_token(), Token::StarStar) {
            self.consume();
            // Right associative, and the exponent may carry a sign
            let exponent = self.parse_unary()?;
            return Ok(Self::binary(BinaryOperator::Power, base, exponent));
        }

        Ok(base)
    }

    fn parse_primary(&mut self) -> FormulaResult<Expr> {
        match self.consume() {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::String(s) => Ok(Expr::Text(s)),
            Token::Boolean(b) => Ok(Expr::Boolean(b)),
            Token::Slot(index) => Ok(Expr::Slot(index)),

            Token::LeftParen => {
                let expr = self.parse_expression()?;
                self.expect(&Token::RightParen)?;
                Ok(expr)
            }

            Token::Identifier(name) => {
                if matches!(self.current_token(), Token::LeftParen) {
                    self.parse_function_call(name)
                } else {
                    Err(FormulaError::Parse(format!("Unknown identifier '{}'", name)))
                }
            }

            token => Err(FormulaError::Parse(format!(
                "Unexpected token: {:?}",
                token
            ))),
        }
    }

    fn parse_function_call(&mut self, name: String) -> FormulaResult<Expr> {
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

        Ok(Expr::Call {
            name: name.to_uppercase(),
            args,
        })
    }
}
