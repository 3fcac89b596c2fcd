//! JSON with comments
//!
//! Reads the dialect the host writes its config in: standard JSON plus `//`
//! and `/* */` comments and trailing commas. Besides the plain value, the
//! parser keeps a syntax tree with byte spans so [`patch`] can rewrite single
//! values without touching the surrounding text.

use anyhow::{anyhow, bail, Result};
use serde_json::{Map, Value};
use std::ops::Range;

pub mod patch;

pub use patch::{patch_document, FormatOptions};

/// A parsed value and where it sits in the source text
#[derive(Debug, Clone)]
pub struct SyntaxNode {
    pub span: Range<usize>,
    pub kind: SyntaxKind,
}

#[derive(Debug, Clone)]
pub enum SyntaxKind {
    Object(Vec<Property>),
    Array(Vec<SyntaxNode>),
    Scalar(Value),
}

#[derive(Debug, Clone)]
pub struct Property {
    pub key: String,
    /// Span of the quoted key
    pub key_span: Range<usize>,
    pub value: SyntaxNode,
    /// Offset of the comma following the value, if any
    pub comma: Option<usize>,
}

impl SyntaxNode {
    /// Node at the object key path `path` below this one
    pub fn find(&self, path: &[String]) -> Option<&SyntaxNode> {
        let Some((key, rest)) = path.split_first() else {
            return Some(self);
        };
        // Last occurrence wins, same as the value conversion
        let child = &self.properties()?.iter().rev().find(|p| &p.key == key)?.value;
        child.find(rest)
    }

    pub fn properties(&self) -> Option<&[Property]> {
        match &self.kind {
            SyntaxKind::Object(props) => Some(props),
            _ => None,
        }
    }

    /// Plain value for this subtree
    pub fn to_value(&self) -> Value {
        match &self.kind {
            SyntaxKind::Scalar(value) => value.clone(),
            SyntaxKind::Array(items) => Value::Array(items.iter().map(SyntaxNode::to_value).collect()),
            SyntaxKind::Object(props) => {
                let mut map = Map::new();
                for prop in props {
                    map.insert(prop.key.clone(), prop.value.to_value());
                }
                Value::Object(map)
            }
        }
    }
}

/// Parse to a syntax tree
pub fn parse_tree(text: &str) -> Result<SyntaxNode> {
    let mut parser = Parser::new(text);
    parser.skip_trivia()?;
    if parser.at_end() {
        bail!("document is empty");
    }
    let root = parser.parse_value()?;
    parser.skip_trivia()?;
    if !parser.at_end() {
        return Err(parser.error("unexpected content after the top-level value"));
    }
    Ok(root)
}

/// Parse to a plain value, ignoring comments
pub fn parse(text: &str) -> Result<Value> {
    parse_tree(text).map(|root| root.to_value())
}

struct Parser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    /// Error annotated with 1-based line and column of the current position
    fn error(&self, message: &str) -> anyhow::Error {
        let before = self.text.get(..self.pos).unwrap_or(self.text);
        let line = before.matches('\n').count() + 1;
        let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
        anyhow!("{message} at line {line}, column {column}")
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n') => self.pos += 1,
                Some(b'/') => match self.bytes.get(self.pos + 1) {
                    Some(b'/') => {
                        while let Some(b) = self.peek() {
                            if b == b'\n' {
                                break;
                            }
                            self.pos += 1;
                        }
                    }
                    Some(b'*') => {
                        let close = self.text[self.pos + 2..]
                            .find("*/")
                            .ok_or_else(|| self.error("unterminated block comment"))?;
                        self.pos += 2 + close + 2;
                    }
                    _ => return Err(self.error("unexpected '/'")),
                },
                _ => return Ok(()),
            }
        }
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", byte as char)))
        }
    }

    fn parse_value(&mut self) -> Result<SyntaxNode> {
        match self.peek() {
            Some(b'{') => self.parse_object(),
            Some(b'[') => self.parse_array(),
            Some(b'"') => {
                let (value, span) = self.parse_string()?;
                Ok(SyntaxNode {
                    span,
                    kind: SyntaxKind::Scalar(Value::String(value)),
                })
            }
            Some(b'-' | b'0'..=b'9') => self.parse_number(),
            Some(b't' | b'f' | b'n') => self.parse_literal(),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of document")),
        }
    }

    fn parse_object(&mut self) -> Result<SyntaxNode> {
        let start = self.pos;
        self.expect(b'{')?;
        let mut props = Vec::new();

        loop {
            self.skip_trivia()?;
            if self.peek() == Some(b'}') {
                break;
            }
            if self.peek() != Some(b'"') {
                return Err(self.error("expected property name"));
            }
            let (key, key_span) = self.parse_string()?;
            self.skip_trivia()?;
            self.expect(b':')?;
            self.skip_trivia()?;
            let value = self.parse_value()?;
            self.skip_trivia()?;

            let comma = if self.peek() == Some(b',') {
                self.pos += 1;
                Some(self.pos - 1)
            } else {
                None
            };
            props.push(Property {
                key,
                key_span,
                value,
                comma,
            });
            if comma.is_none() {
                self.skip_trivia()?;
                if self.peek() != Some(b'}') {
                    return Err(self.error("expected ',' or '}'"));
                }
                break;
            }
        }

        self.expect(b'}')?;
        Ok(SyntaxNode {
            span: start..self.pos,
            kind: SyntaxKind::Object(props),
        })
    }

    fn parse_array(&mut self) -> Result<SyntaxNode> {
        let start = self.pos;
        self.expect(b'[')?;
        let mut items = Vec::new();

        loop {
            self.skip_trivia()?;
            if self.peek() == Some(b']') {
                break;
            }
            items.push(self.parse_value()?);
            self.skip_trivia()?;
            let comma = self.peek() == Some(b',');
            if comma {
                self.pos += 1;
            } else {
                self.skip_trivia()?;
                if self.peek() != Some(b']') {
                    return Err(self.error("expected ',' or ']'"));
                }
                break;
            }
        }

        self.expect(b']')?;
        Ok(SyntaxNode {
            span: start..self.pos,
            kind: SyntaxKind::Array(items),
        })
    }

    /// Scan a quoted string; escapes are decoded by serde_json
    fn parse_string(&mut self) -> Result<(String, Range<usize>)> {
        let start = self.pos;
        self.expect(b'"')?;
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    self.pos = start;
                    return Err(self.error("unterminated string"));
                }
                Some(b'\\') => self.pos += 2,
                Some(b'"') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => self.pos += 1,
            }
        }
        let text = self.text;
        let raw = &text[start..self.pos];
        let value = serde_json::from_str::<String>(raw)
            .map_err(|e| self.error(&format!("invalid string ({e})")))?;
        Ok((value, start..self.pos))
    }

    fn parse_number(&mut self) -> Result<SyntaxNode> {
        let start = self.pos;
        while let Some(b'-' | b'+' | b'.' | b'e' | b'E' | b'0'..=b'9') = self.peek() {
            self.pos += 1;
        }
        let text = self.text;
        let raw = &text[start..self.pos];
        let value = match serde_json::from_str::<Value>(raw) {
            Ok(value) => value,
            Err(_) => {
                self.pos = start;
                return Err(self.error(&format!("invalid number '{raw}'")));
            }
        };
        Ok(SyntaxNode {
            span: start..self.pos,
            kind: SyntaxKind::Scalar(value),
        })
    }

    fn parse_literal(&mut self) -> Result<SyntaxNode> {
        let start = self.pos;
        let text = self.text;
        let rest = &text[start..];
        let (word, value) = if rest.starts_with("true") {
            ("true", Value::Bool(true))
        } else if rest.starts_with("false") {
            ("false", Value::Bool(false))
        } else if rest.starts_with("null") {
            ("null", Value::Null)
        } else {
            return Err(self.error("unexpected character"));
        };
        self.pos += word.len();
        Ok(SyntaxNode {
            span: start..self.pos,
            kind: SyntaxKind::Scalar(value),
        })
    }
}
