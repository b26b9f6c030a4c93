use std::{iter::Peekable, str::Chars};

use anyhow::{Context, bail};
use serde_json::Value;

use super::{ExpressionLanguage, ExpressionScope};

/// A small expression language.
///
/// Supports single or double quoted strings, numbers, `true`, `false`,
/// `null`, parentheses, calls of registered functions such as
/// `get('..:name')`, and `~` to concatenate as strings, where null is the
/// empty string.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleExpressionLanguage;

impl ExpressionLanguage for SimpleExpressionLanguage {
    fn evaluate(&self, expression: &str, scope: &mut ExpressionScope<'_>) -> anyhow::Result<Value> {
        let tokens = Tokenizer::new(expression)
            .tokenize()
            .with_context(|| format!("Unable to parse expression '{expression}'"))?;
        let mut parser = Parser {
            tokens,
            position: 0,
            scope,
        };
        let value = parser.concat()?;
        if let Some(token) = parser.peek() {
            bail!("Unexpected {token:?} in expression '{expression}'.");
        }
        Ok(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    String(String),
    Number(Value),
    Name(String),
    LParen,
    RParen,
    Comma,
    Tilde,
}

struct Tokenizer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn tokenize(mut self) -> anyhow::Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> anyhow::Result<Option<Token>> {
        while self.chars.next_if(|c| c.is_whitespace()).is_some() {}

        let Some(c) = self.chars.next() else {
            return Ok(None);
        };
        let token = match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            ',' => Token::Comma,
            '~' => Token::Tilde,
            '\'' | '"' => Token::String(self.string(c)?),
            _ if c.is_ascii_digit() || (c == '-' && self.chars.peek().is_some_and(char::is_ascii_digit)) => {
                Token::Number(self.number(c)?)
            }
            _ if c.is_alphabetic() || c == '_' => {
                let mut name = c.to_string();
                while let Some(next) = self.chars.next_if(|c| c.is_alphanumeric() || *c == '_') {
                    name.push(next);
                }
                Token::Name(name)
            }
            _ => bail!("Unexpected character '{c}'."),
        };
        Ok(Some(token))
    }

    fn string(&mut self, quote: char) -> anyhow::Result<String> {
        let mut s = String::new();
        let mut escaped = false;
        for c in self.chars.by_ref() {
            if escaped {
                s.push(c);
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == quote {
                return Ok(s);
            } else {
                s.push(c);
            }
        }
        bail!("Unterminated string.")
    }

    fn number(&mut self, first: char) -> anyhow::Result<Value> {
        let mut s = first.to_string();
        while let Some(c) = self.chars.next_if(|c| c.is_ascii_digit() || *c == '.') {
            s.push(c);
        }
        if !s.contains('.')
            && let Ok(integer) = s.parse::<i64>()
        {
            return Ok(Value::from(integer));
        }
        let number: f64 = s.parse().with_context(|| format!("Invalid number '{s}'."))?;
        Ok(Value::from(number))
    }
}

struct Parser<'s, 'a> {
    tokens: Vec<Token>,
    position: usize,
    scope: &'s mut ExpressionScope<'a>,
}

impl Parser<'_, '_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> anyhow::Result<()> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => bail!("Expected {expected:?}, found {token:?}."),
            None => bail!("Expected {expected:?}, found end of expression."),
        }
    }

    fn concat(&mut self) -> anyhow::Result<Value> {
        let first = self.primary()?;
        if self.peek() != Some(&Token::Tilde) {
            return Ok(first);
        }
        let mut joined = to_string(&first);
        while self.peek() == Some(&Token::Tilde) {
            self.next();
            joined.push_str(&to_string(&self.primary()?));
        }
        Ok(Value::String(joined))
    }

    fn primary(&mut self) -> anyhow::Result<Value> {
        match self.next() {
            Some(Token::String(s)) => Ok(Value::String(s)),
            Some(Token::Number(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.concat()?;
                self.expect(Token::RParen)?;
                Ok(value)
            }
            Some(Token::Name(name)) => match name.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                "null" => Ok(Value::Null),
                _ if self.peek() == Some(&Token::LParen) => {
                    self.next();
                    let args = self.arguments()?;
                    self.scope.call(&name, &args)
                }
                _ => bail!("Unknown name '{name}'."),
            },
            Some(token) => bail!("Unexpected {token:?}."),
            None => bail!("Unexpected end of expression."),
        }
    }

    /// Arguments after the opening parenthesis, up to and including the
    /// closing one.
    fn arguments(&mut self) -> anyhow::Result<Vec<Value>> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.next();
            return Ok(args);
        }
        loop {
            args.push(self.concat()?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                Some(token) => bail!("Expected ',' or ')', found {token:?}."),
                None => bail!("Unclosed argument list."),
            }
        }
    }
}

fn to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
