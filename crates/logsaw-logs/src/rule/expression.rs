use std::fmt;
use std::str::FromStr;

use logsaw_types::{Level, LogEvent};

use super::Rule;
use super::condition::{Condition, Inequality};
use super::pattern::PatternSyntax;
use crate::error::RuleError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Operator {
    And,
    Or,
    Not,
    Exists,
    Equals,
    NotEquals,
    PartialText,
    Like,
    Compare(Inequality),
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    Op(Operator),
    /// Bare word: field name or value
    Word(String),
    /// Single-quoted text, never treated as an operator
    Text(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("("),
            Self::Close => f.write_str(")"),
            Self::Op(op) => write!(f, "{:?}", op),
            Self::Word(w) => f.write_str(w),
            Self::Text(t) => write!(f, "'{}'", t),
        }
    }
}

fn classify(word: String) -> Token {
    let op = match word.as_str() {
        "&&" => Operator::And,
        "||" => Operator::Or,
        "!" => Operator::Not,
        "==" => Operator::Equals,
        "!=" => Operator::NotEquals,
        "~=" => Operator::PartialText,
        other => match Inequality::from_symbol(other) {
            Some(inequality) => Operator::Compare(inequality),
            None if other.eq_ignore_ascii_case("like") => Operator::Like,
            None if other.eq_ignore_ascii_case("exists") => Operator::Exists,
            None => return Token::Word(word),
        },
    };
    Token::Op(op)
}

fn tokenize(expression: &str) -> Result<Vec<Token>, RuleError> {
    let mut tokens = Vec::new();
    let mut chars = expression.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '\'' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => text.push(ch),
                        None => return Err(RuleError::UnterminatedQuote),
                    }
                }
                tokens.push(Token::Text(text));
            }
            _ => {
                let mut word = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_whitespace() || ch == '(' || ch == ')' {
                        break;
                    }
                    word.push(ch);
                    chars.next();
                }
                tokens.push(classify(word));
            }
        }
    }
    Ok(tokens)
}

/// Deepest nesting of parentheses and `!` an expression may use
pub const MAX_NESTING: usize = 64;

/// Recursive-descent parser. `&&` binds tighter than `||`.
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    syntax: PatternSyntax,
    /// Open parentheses and `!` currently being parsed
    depth: usize,
}

impl Parser {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, op: Operator) -> bool {
        if self.tokens.get(self.pos) == Some(&Token::Op(op)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse(mut self) -> Result<Condition, RuleError> {
        if self.tokens.is_empty() {
            return Err(RuleError::Empty);
        }
        let condition = self.parse_or()?;
        match self.next() {
            None => Ok(condition),
            Some(Token::Close) => Err(RuleError::UnbalancedParens),
            Some(token) => Err(RuleError::UnexpectedToken(token.to_string())),
        }
    }

    fn parse_or(&mut self) -> Result<Condition, RuleError> {
        let mut any = vec![self.parse_and()?];
        while self.eat(Operator::Or) {
            any.push(self.parse_and()?);
        }
        Ok(flatten(any, Condition::Or))
    }

    fn parse_and(&mut self) -> Result<Condition, RuleError> {
        let mut all = vec![self.parse_unary()?];
        while self.eat(Operator::And) {
            all.push(self.parse_unary()?);
        }
        Ok(flatten(all, Condition::And))
    }

    fn parse_unary(&mut self) -> Result<Condition, RuleError> {
        match self.next() {
            None => Err(RuleError::UnexpectedEnd),
            Some(Token::Op(Operator::Not)) => {
                let inner = self.nested(Self::parse_unary)?;
                Ok(Condition::Not(Box::new(inner)))
            }
            Some(Token::Op(Operator::Exists)) => Ok(Condition::Exists(self.operand()?)),
            Some(Token::Open) => {
                let inner = self.nested(Self::parse_or)?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    None => Err(RuleError::UnbalancedParens),
                    Some(token) => Err(RuleError::UnexpectedToken(token.to_string())),
                }
            }
            Some(Token::Word(field)) | Some(Token::Text(field)) => self.comparison(field),
            Some(Token::Close) => Err(RuleError::UnbalancedParens),
            Some(token) => Err(RuleError::UnexpectedToken(token.to_string())),
        }
    }

    /// Run `parse` one nesting level deeper, failing past [`MAX_NESTING`]
    fn nested<F>(&mut self, parse: F) -> Result<Condition, RuleError>
    where
        F: FnOnce(&mut Self) -> Result<Condition, RuleError>,
    {
        if self.depth >= MAX_NESTING {
            return Err(RuleError::TooDeep(MAX_NESTING));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn operand(&mut self) -> Result<String, RuleError> {
        match self.next() {
            Some(Token::Word(value)) | Some(Token::Text(value)) => Ok(value),
            Some(token) => Err(RuleError::UnexpectedToken(token.to_string())),
            None => Err(RuleError::UnexpectedEnd),
        }
    }

    fn comparison(&mut self, field: String) -> Result<Condition, RuleError> {
        let op = match self.next() {
            Some(Token::Op(op)) => op,
            Some(token) => return Err(RuleError::UnexpectedToken(token.to_string())),
            None => return Err(RuleError::UnexpectedEnd),
        };
        let value = self.operand()?;
        let is_level = field.eq_ignore_ascii_case("LEVEL");

        let condition = match op {
            Operator::Equals | Operator::NotEquals => {
                let equals = if is_level {
                    Condition::LevelEquals(parse_level(&value)?)
                } else {
                    Condition::Equals { field, value }
                };
                if op == Operator::NotEquals {
                    Condition::Not(Box::new(equals))
                } else {
                    equals
                }
            }
            Operator::PartialText => Condition::PartialText { field, text: value },
            Operator::Like => Condition::Like {
                matcher: self.syntax.compile(&value)?,
                field,
            },
            Operator::Compare(op) if is_level => Condition::LevelCompare {
                op,
                level: parse_level(&value)?,
            },
            Operator::Compare(op) => Condition::Numeric {
                value: value
                    .parse()
                    .map_err(|_| RuleError::InvalidNumber(value.clone()))?,
                field,
                op,
            },
            other => return Err(RuleError::UnexpectedToken(format!("{:?}", other))),
        };
        Ok(condition)
    }
}

fn flatten(mut operands: Vec<Condition>, join: fn(Vec<Condition>) -> Condition) -> Condition {
    if operands.len() == 1 {
        operands.remove(0)
    } else {
        join(operands)
    }
}

fn parse_level(value: &str) -> Result<Level, RuleError> {
    value
        .parse()
        .map_err(|_| RuleError::UnknownLevel(value.to_string()))
}

/// Rule compiled from a filter expression such as
/// `level >= WARN && (logger like 'org.app.*' || msg ~= timeout)`.
///
/// Operators: `||`, `&&`, `!`, `exists`, `==`, `!=`, `~=` (case-insensitive
/// substring), `like`, `<`, `<=`, `>`, `>=`. Field names are resolved with
/// [`logsaw_types::resolve_field`].
#[derive(Debug, Clone)]
pub struct ExpressionRule {
    expression: String,
    condition: Condition,
}

impl ExpressionRule {
    /// Compile with the default pattern syntax
    pub fn parse(expression: &str) -> Result<Self, RuleError> {
        Self::compile(expression, PatternSyntax::default())
    }

    /// Compile using `syntax` for the `like` operator
    pub fn compile(expression: &str, syntax: PatternSyntax) -> Result<Self, RuleError> {
        let parser = Parser {
            tokens: tokenize(expression)?,
            pos: 0,
            syntax,
            depth: 0,
        };
        Ok(Self {
            expression: expression.trim().to_string(),
            condition: parser.parse()?,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }
}

impl FromStr for ExpressionRule {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Rule for ExpressionRule {
    fn evaluate(&self, event: &LogEvent) -> bool {
        self.condition.evaluate(event)
    }

    fn describe(&self) -> String {
        self.expression.clone()
    }
}
