//! Arithmetic calculator tool.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use super::TypedTool;
use crate::types::ToolError;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CalculateInput {
    /// Arithmetic expression, e.g. "2 + 3 * (4 - 1)" or "2^10"
    pub expression: String,
}

/// Evaluates arithmetic expressions over `+ - * / ^` and parentheses.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalculateTool;

#[async_trait]
impl TypedTool for CalculateTool {
    type Input = CalculateInput;
    const NAME: &'static str = "calculate";
    const DESCRIPTION: &'static str =
        "Evaluate an arithmetic expression. Supports + - * / ^ and parentheses.";

    async fn handle(&self, input: CalculateInput) -> Result<String, ToolError> {
        evaluate(&input.expression).map(format_number)
    }
}

const ALLOWED: &str = "0123456789+-*/.()^";
const MAX_LENGTH: usize = 4096;
const MAX_DEPTH: usize = 64;

/// Evaluates `expression`.
///
/// Only digits, `+ - * / . ( ) ^` and whitespace are accepted. `^` is
/// rewritten to the evaluator's power operator `**` first. Precedence
/// follows the usual rules with `**` binding tighter than unary minus
/// (`-2^2 == -4`) and associating to the right. Inputs longer than
/// 4096 bytes or nesting parentheses and signs deeper than 64 are rejected.
pub fn evaluate(expression: &str) -> Result<f64, ToolError> {
    if expression.len() > MAX_LENGTH {
        return Err(ToolError::invalid_expression("expression too long"));
    }
    if let Some(c) = expression
        .chars()
        .find(|c| !ALLOWED.contains(*c) && !c.is_whitespace())
    {
        return Err(ToolError::invalid_expression(format!(
            "invalid character '{}'",
            c
        )));
    }

    let normalized = expression.replace('^', "**");
    let tokens = tokenize(&normalized)?;
    if tokens.is_empty() {
        return Err(ToolError::invalid_expression("empty expression"));
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if let Some(token) = parser.peek() {
        return Err(ToolError::invalid_expression(format!(
            "unexpected {}",
            token
        )));
    }
    if !value.is_finite() {
        return Err(ToolError::invalid_expression("result is not finite"));
    }
    Ok(value)
}

/// Integral values print without a fractional part.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Pow,
    LParen,
    RParen,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Num(n) => write!(f, "number {}", n),
            Token::Plus => f.write_str("'+'"),
            Token::Minus => f.write_str("'-'"),
            Token::Star => f.write_str("'*'"),
            Token::Slash => f.write_str("'/'"),
            Token::Pow => f.write_str("'^'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ToolError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let value = literal.parse::<f64>().map_err(|_| {
                    ToolError::invalid_expression(format!("malformed number '{}'", literal))
                })?;
                tokens.push(Token::Num(value));
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Pow);
                i += 2;
            }
            _ => {
                tokens.push(match c {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    other => {
                        return Err(ToolError::invalid_expression(format!(
                            "invalid character '{}'",
                            other
                        )));
                    }
                });
                i += 1;
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.peek();
        self.pos += 1;
        token
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, ToolError> {
        let mut value = self.term()?;
        while let Some(op @ (Token::Plus | Token::Minus)) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == Token::Plus { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    // term := unary (('*' | '/') unary)*
    fn term(&mut self) -> Result<f64, ToolError> {
        let mut value = self.unary()?;
        while let Some(op @ (Token::Star | Token::Slash)) = self.peek() {
            self.pos += 1;
            let rhs = self.unary()?;
            value = if op == Token::Star {
                value * rhs
            } else {
                if rhs == 0.0 {
                    return Err(ToolError::invalid_expression("division by zero"));
                }
                value / rhs
            };
        }
        Ok(value)
    }

    // Every recursive production passes through here.
    fn unary(&mut self) -> Result<f64, ToolError> {
        if self.depth >= MAX_DEPTH {
            return Err(ToolError::invalid_expression("expression nested too deeply"));
        }
        self.depth += 1;
        let value = self.signed();
        self.depth -= 1;
        value
    }

    // unary := ('+' | '-') unary | power
    fn signed(&mut self) -> Result<f64, ToolError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    // power := atom ('**' unary)?
    fn power(&mut self) -> Result<f64, ToolError> {
        let base = self.atom()?;
        if self.peek() == Some(Token::Pow) {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<f64, ToolError> {
        match self.next() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(ToolError::invalid_expression("missing closing parenthesis")),
                }
            }
            Some(token) => Err(ToolError::invalid_expression(format!(
                "unexpected {}",
                token
            ))),
            None => Err(ToolError::invalid_expression("unexpected end of expression")),
        }
    }
}
