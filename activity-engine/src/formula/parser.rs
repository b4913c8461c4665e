//! Recursive descent parser for field formulas
//!
//! Grammar:
//! ```text
//! expression = term (("+" | "-") term)*
//! term       = unary (("*" | "/") unary)*
//! unary      = ("-" | "+") unary | primary
//! primary    = number | "[" name "]" | "(" expression ")"
//! ```
//!
//! Anything the lexer does not recognise is rejected as an unsafe
//! expression, so only arithmetic over numbers and field references can
//! ever reach the evaluator.

use rust_decimal::Decimal;

use super::ast::*;
use super::error::FormulaError;
use crate::schema::FieldId;

/// Maximum nesting of parentheses and unary operators
pub const MAX_FORMULA_DEPTH: usize = 64;

/// Parse a formula string into a `Formula` AST
pub fn parse_formula(input: &str) -> Result<Formula, FormulaError> {
    let mut parser = Parser::new(input)?;
    let expr = parser.parse()?;
    Ok(Formula::new(input, expr))
}

impl Formula {
    /// Parse a formula; see [`parse_formula`]
    pub fn parse(input: &str) -> Result<Formula, FormulaError> {
        parse_formula(input)
    }
}

/// Token types for the formula lexer
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(Decimal),
    Field(FieldId),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Eof,
}

/// Lexer for formula tokens
struct Lexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    fn current_pos(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(i, _)| *i)
            .unwrap_or(self.input.len())
    }

    fn skip_whitespace(&mut self) {
        while let Some(&(_, ch)) = self.chars.peek() {
            if ch.is_whitespace() {
                self.chars.next();
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, FormulaError> {
        self.skip_whitespace();

        let Some(&(pos, ch)) = self.chars.peek() else {
            return Ok(Token::Eof);
        };

        let single = match ch {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            _ => None,
        };
        if let Some(token) = single {
            self.chars.next();
            return Ok(token);
        }

        if ch == '[' {
            self.chars.next(); // consume '['
            let start = pos + 1;
            let mut end = None;
            for (i, c) in self.chars.by_ref() {
                if c == ']' {
                    end = Some(i);
                    break;
                }
            }
            let Some(end) = end else {
                return Err(FormulaError::syntax("unclosed field reference, expected ']'", pos));
            };
            let name = &self.input[start..end];
            return FieldId::parse(name)
                .map(Token::Field)
                .map_err(|e| FormulaError::syntax(e.to_string(), pos));
        }

        if ch.is_ascii_digit() {
            return self.lex_number(pos);
        }

        // A separator without a leading digit (".5") is still a number
        if (ch == '.' || ch == ',') && self.next_is_digit(pos + ch.len_utf8()) {
            return self.lex_number(pos);
        }

        Err(FormulaError::UnsafeExpression {
            token: ch.to_string(),
            position: pos,
        })
    }

    fn next_is_digit(&self, byte_pos: usize) -> bool {
        self.input[byte_pos..]
            .chars()
            .next()
            .map(|c| c.is_ascii_digit())
            .unwrap_or(false)
    }

    fn lex_number(&mut self, start: usize) -> Result<Token, FormulaError> {
        let mut has_separator = false;

        while let Some(&(i, c)) = self.chars.peek() {
            if c.is_ascii_digit() {
                self.chars.next();
            } else if (c == '.' || c == ',') && !has_separator && self.next_is_digit(i + 1) {
                has_separator = true;
                self.chars.next();
            } else {
                break;
            }
        }

        let end = self.current_pos();
        let text = self.input[start..end].replace(',', ".");
        let text = if text.starts_with('.') {
            format!("0{}", text)
        } else {
            text
        };
        text.parse::<Decimal>()
            .map(Token::Number)
            .map_err(|_| FormulaError::syntax(format!("invalid number: {}", &self.input[start..end]), start))
    }
}

/// Formula parser
struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    /// Byte offset where `current` starts
    current_start: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Result<Self, FormulaError> {
        let mut lexer = Lexer::new(input);
        lexer.skip_whitespace();
        let current_start = lexer.current_pos();
        let current = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            current_start,
            depth: 0,
        })
    }

    fn advance(&mut self) -> Result<(), FormulaError> {
        self.lexer.skip_whitespace();
        self.current_start = self.lexer.current_pos();
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), FormulaError> {
        if self.current == expected {
            self.advance()
        } else {
            Err(FormulaError::syntax(
                format!("expected {}, found {}", what, describe(&self.current)),
                self.current_start,
            ))
        }
    }

    fn enter(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > MAX_FORMULA_DEPTH {
            return Err(FormulaError::syntax("formula is nested too deeply", self.current_start));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Parse the full formula
    fn parse(&mut self) -> Result<Expr, FormulaError> {
        if self.current == Token::Eof {
            return Err(FormulaError::syntax("formula is empty", 0));
        }

        let expr = self.parse_expression()?;

        if self.current != Token::Eof {
            return Err(FormulaError::syntax(
                format!("unexpected {} after expression", describe(&self.current)),
                self.current_start,
            ));
        }

        Ok(expr)
    }

    /// expression = term (("+"|"-") term)*
    fn parse_expression(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.parse_term()?;

        loop {
            let op = match &self.current {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_term()?;
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// term = unary (("*"|"/") unary)*
    fn parse_term(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match &self.current {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_unary()?;
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// unary = ("-"|"+") unary | primary
    fn parse_unary(&mut self) -> Result<Expr, FormulaError> {
        match self.current {
            Token::Minus => {
                self.advance()?;
                self.enter()?;
                let inner = self.parse_unary()?;
                self.leave();
                Ok(Expr::Negate(Box::new(inner)))
            }
            Token::Plus => {
                self.advance()?;
                self.enter()?;
                let inner = self.parse_unary()?;
                self.leave();
                Ok(inner)
            }
            _ => self.parse_primary(),
        }
    }

    /// primary = "(" expression ")" | field | number
    fn parse_primary(&mut self) -> Result<Expr, FormulaError> {
        match &self.current {
            Token::LParen => {
                self.advance()?;
                self.enter()?;
                let expr = self.parse_expression()?;
                self.leave();
                self.expect(Token::RParen, "')'")?;
                Ok(expr)
            }
            Token::Number(n) => {
                let n = *n;
                self.advance()?;
                Ok(Expr::Number(n))
            }
            Token::Field(id) => {
                let id = id.clone();
                self.advance()?;
                Ok(Expr::Field(id))
            }
            other => Err(FormulaError::syntax(
                format!("expected a number, field or '(', found {}", describe(other)),
                self.current_start,
            )),
        }
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Number(n) => format!("number {}", n),
        Token::Field(id) => format!("field {}", id.reference()),
        Token::Plus => "'+'".to_string(),
        Token::Minus => "'-'".to_string(),
        Token::Star => "'*'".to_string(),
        Token::Slash => "'/'".to_string(),
        Token::LParen => "'('".to_string(),
        Token::RParen => "')'".to_string(),
        Token::Eof => "end of formula".to_string(),
    }
}
