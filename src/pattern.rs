//! Label classification expressions.
//!
//! ```text
//! [contains 'net income' or 'net earnings'] not [contains 'per share']
//! [(contains 'account' or contains 'accounts') and contains 'receivable']
//! [equals to 'total assets'] or [position_before # total_assets and contains 'cash']
//! min{[contains 'basic'] and [datatype = perShare]}
//! ```
//!
//! Text predicates compare against the normalized label (see
//! [`normalize_label`]). `and` binds tighter than `or`; a `not` written
//! directly after a clause reads as `and not`. A bare quoted string or
//! word is shorthand for `contains`.

use crate::utils::normalize_label;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("empty pattern")]
    Empty,

    #[error("unterminated string starting at {0}")]
    UnterminatedString(usize),

    #[error("unexpected character '{ch}' at {pos}")]
    UnexpectedCharacter { ch: char, pos: usize },

    #[error("unbalanced '{bracket}' at {pos}")]
    UnbalancedBracket { bracket: char, pos: usize },

    #[error("unexpected {found} at {pos}, expected {expected}")]
    UnexpectedToken {
        found: String,
        pos: usize,
        expected: &'static str,
    },

    #[error("unexpected end of pattern, expected {0}")]
    UnexpectedEnd(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Str(String),
    Word(String),
    LBracket,
    RBracket,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Hash,
    Equals,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Str(s) => write!(f, "'{}'", s),
            TokenKind::Word(w) => write!(f, "'{}'", w),
            TokenKind::LBracket => f.write_str("'['"),
            TokenKind::RBracket => f.write_str("']'"),
            TokenKind::LParen => f.write_str("'('"),
            TokenKind::RParen => f.write_str("')'"),
            TokenKind::LBrace => f.write_str("'{'"),
            TokenKind::RBrace => f.write_str("'}'"),
            TokenKind::Hash => f.write_str("'#'"),
            TokenKind::Equals => f.write_str("'='"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    pos: usize,
}

fn tokenize(source: &str) -> Result<Vec<Token>, PatternError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        let kind = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '\'' | '"' => {
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                for (_, inner) in chars.by_ref() {
                    if inner == c {
                        closed = true;
                        break;
                    }
                    text.push(inner);
                }
                if !closed {
                    return Err(PatternError::UnterminatedString(pos));
                }
                tokens.push(Token {
                    kind: TokenKind::Str(text),
                    pos,
                });
                continue;
            }
            c if c.is_alphanumeric() || c == '_' => {
                let mut word = String::new();
                while let Some(&(_, w)) = chars.peek() {
                    if w.is_alphanumeric() || w == '_' {
                        word.push(w);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token {
                    kind: TokenKind::Word(word),
                    pos,
                });
                continue;
            }
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '#' => TokenKind::Hash,
            '=' => TokenKind::Equals,
            other => return Err(PatternError::UnexpectedCharacter { ch: other, pos }),
        };
        chars.next();
        tokens.push(Token { kind, pos });
    }

    Ok(tokens)
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Contains(String),
    Equals(String),
    PositionBefore(String),
    PositionAfter(String),
    Datatype(String),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Min(Box<Expr>),
}

#[derive(Clone, Copy, PartialEq)]
enum TextPredicate {
    Contains,
    Equals,
}

impl TextPredicate {
    fn build(self, text: &str) -> Expr {
        let normalized = normalize_label(text);
        match self {
            TextPredicate::Contains => Expr::Contains(normalized),
            TextPredicate::Equals => Expr::Equals(normalized),
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn peek_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(TokenKind::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self, expected: &'static str) -> PatternError {
        match self.tokens.get(self.pos) {
            Some(token) => PatternError::UnexpectedToken {
                found: token.kind.to_string(),
                pos: token.pos,
                expected,
            },
            None => PatternError::UnexpectedEnd(expected),
        }
    }

    fn expect(&mut self, kind: TokenKind, open: Option<(char, usize)>) -> Result<(), PatternError> {
        match self.peek() {
            Some(k) if *k == kind => {
                self.pos += 1;
                Ok(())
            }
            _ => match open {
                Some((bracket, pos)) => Err(PatternError::UnbalancedBracket { bracket, pos }),
                None => Err(self.unexpected("a delimiter")),
            },
        }
    }

    fn parse_or(&mut self) -> Result<Expr, PatternError> {
        let mut terms = vec![self.parse_and()?];
        while self.peek_keyword("or") {
            self.pos += 1;
            terms.push(self.parse_and()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Expr::Or(terms)
        })
    }

    fn parse_and(&mut self) -> Result<Expr, PatternError> {
        let mut terms = vec![self.parse_unary()?];
        loop {
            if self.peek_keyword("and") {
                self.pos += 1;
                terms.push(self.parse_unary()?);
            } else if self.peek_keyword("not") {
                // `[a] not [b]` reads as `[a] and not [b]`
                terms.push(self.parse_unary()?);
            } else {
                break;
            }
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Expr::And(terms)
        })
    }

    fn parse_unary(&mut self) -> Result<Expr, PatternError> {
        if self.peek_keyword("not") {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, PatternError> {
        let token = match self.tokens.get(self.pos) {
            Some(token) => token.clone(),
            None => return Err(PatternError::UnexpectedEnd("a predicate")),
        };

        match &token.kind {
            TokenKind::LBracket => {
                self.pos += 1;
                let inner = self.parse_or()?;
                self.expect(TokenKind::RBracket, Some(('[', token.pos)))?;
                Ok(inner)
            }
            TokenKind::LParen => {
                self.pos += 1;
                let inner = self.parse_or()?;
                self.expect(TokenKind::RParen, Some(('(', token.pos)))?;
                Ok(inner)
            }
            TokenKind::Str(text) => {
                self.pos += 1;
                Ok(TextPredicate::Contains.build(text))
            }
            TokenKind::Word(word) => {
                let keyword = word.to_ascii_lowercase();
                match keyword.as_str() {
                    "contains" => {
                        self.pos += 1;
                        self.parse_text_predicate(TextPredicate::Contains)
                    }
                    "equals" => {
                        self.pos += 1;
                        if self.peek_keyword("to") {
                            self.pos += 1;
                        }
                        self.parse_text_predicate(TextPredicate::Equals)
                    }
                    "position_before" | "position_after" => {
                        self.pos += 1;
                        self.expect(TokenKind::Hash, None)?;
                        let target = self.parse_name("a reference target")?;
                        Ok(if keyword == "position_before" {
                            Expr::PositionBefore(target)
                        } else {
                            Expr::PositionAfter(target)
                        })
                    }
                    "datatype" => {
                        self.pos += 1;
                        self.expect(TokenKind::Equals, None)?;
                        let datatype = self.parse_value("a datatype")?;
                        Ok(Expr::Datatype(datatype))
                    }
                    "min" if matches!(self.peek_at(1), Some(TokenKind::LBrace)) => {
                        let brace = self.tokens[self.pos + 1].pos;
                        self.pos += 2;
                        let inner = self.parse_or()?;
                        self.expect(TokenKind::RBrace, Some(('{', brace)))?;
                        Ok(Expr::Min(Box::new(inner)))
                    }
                    "and" | "or" | "not" | "to" => Err(self.unexpected("a predicate")),
                    _ => {
                        self.pos += 1;
                        Ok(TextPredicate::Contains.build(word))
                    }
                }
            }
            _ => Err(self.unexpected("a predicate")),
        }
    }

    /// `contains 'a' or 'b'` carries the predicate over to each alternative.
    fn parse_text_predicate(&mut self, predicate: TextPredicate) -> Result<Expr, PatternError> {
        let first = self.parse_value("a quoted string")?;
        let mut alternatives = vec![predicate.build(&first)];

        while self.peek_keyword("or") && matches!(self.peek_at(1), Some(TokenKind::Str(_))) {
            self.pos += 1;
            let next = self.parse_value("a quoted string")?;
            alternatives.push(predicate.build(&next));
        }

        Ok(if alternatives.len() == 1 {
            alternatives.remove(0)
        } else {
            Expr::Or(alternatives)
        })
    }

    fn parse_value(&mut self, expected: &'static str) -> Result<String, PatternError> {
        match self.peek() {
            Some(TokenKind::Str(s)) | Some(TokenKind::Word(s)) => {
                let value = s.clone();
                self.pos += 1;
                Ok(value)
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    fn parse_name(&mut self, expected: &'static str) -> Result<String, PatternError> {
        self.parse_value(expected)
            .map(|name| name.trim().to_ascii_lowercase())
    }
}

/// Evaluation context of a single label.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvalContext<'a> {
    pub line: Option<u32>,
    pub datatype: Option<&'a str>,
    pub targets: Option<&'a BTreeMap<String, u32>>,
}

impl<'a> EvalContext<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_datatype(mut self, datatype: Option<&'a str>) -> Self {
        self.datatype = datatype;
        self
    }

    pub fn with_targets(mut self, targets: &'a BTreeMap<String, u32>) -> Self {
        self.targets = Some(targets);
        self
    }

    fn target(&self, name: &str) -> Option<u32> {
        self.targets.and_then(|t| t.get(name).copied())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternMatch {
    pub matched: bool,

    /// Among several matching candidates the caller keeps the one with the
    /// lowest line position.
    pub select_min: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    source: String,
    root: Expr,
    select_min: bool,
}

impl Pattern {
    pub fn parse(source: &str) -> Result<Self, PatternError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(PatternError::Empty);
        }

        let mut parser = Parser { tokens, pos: 0 };
        let root = parser.parse_or()?;

        if let Some(token) = parser.advance() {
            return Err(match token.kind {
                TokenKind::RBracket => PatternError::UnbalancedBracket {
                    bracket: ']',
                    pos: token.pos,
                },
                TokenKind::RParen => PatternError::UnbalancedBracket {
                    bracket: ')',
                    pos: token.pos,
                },
                TokenKind::RBrace => PatternError::UnbalancedBracket {
                    bracket: '}',
                    pos: token.pos,
                },
                other => PatternError::UnexpectedToken {
                    found: other.to_string(),
                    pos: token.pos,
                    expected: "'and', 'or' or end of pattern",
                },
            });
        }

        let select_min = contains_min(&root);
        Ok(Self {
            source: source.to_string(),
            root,
            select_min,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn select_min(&self) -> bool {
        self.select_min
    }

    pub fn evaluate(&self, label: &str, ctx: &EvalContext) -> PatternMatch {
        let normalized = normalize_label(label);
        PatternMatch {
            matched: eval(&self.root, &normalized, ctx),
            select_min: self.select_min,
        }
    }

    /// Text-only evaluation with no positional or datatype context.
    pub fn matches(&self, label: &str) -> bool {
        self.evaluate(label, &EvalContext::default()).matched
    }
}

fn contains_min(expr: &Expr) -> bool {
    match expr {
        Expr::Min(_) => true,
        Expr::Not(inner) => contains_min(inner),
        Expr::And(terms) | Expr::Or(terms) => terms.iter().any(contains_min),
        _ => false,
    }
}

fn eval(expr: &Expr, label: &str, ctx: &EvalContext) -> bool {
    match expr {
        Expr::Contains(text) => label.contains(text.as_str()),
        Expr::Equals(text) => label == text,
        Expr::PositionBefore(target) => match (ctx.line, ctx.target(target)) {
            (Some(line), Some(reference)) => line < reference,
            _ => false,
        },
        Expr::PositionAfter(target) => match (ctx.line, ctx.target(target)) {
            (Some(line), Some(reference)) => line > reference,
            _ => false,
        },
        Expr::Datatype(datatype) => ctx.datatype == Some(datatype.as_str()),
        Expr::Not(inner) => !eval(inner, label, ctx),
        Expr::And(terms) => terms.iter().all(|t| eval(t, label, ctx)),
        Expr::Or(terms) => terms.iter().any(|t| eval(t, label, ctx)),
        Expr::Min(inner) => eval(inner, label, ctx),
    }
}

/// Parses and evaluates in one step. A malformed expression only fails
/// this evaluation.
pub fn evaluate_pattern(
    source: &str,
    label: &str,
    ctx: &EvalContext,
) -> Result<PatternMatch, PatternError> {
    Ok(Pattern::parse(source)?.evaluate(label, ctx))
}
