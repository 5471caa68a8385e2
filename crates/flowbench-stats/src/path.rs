//! Metric paths: `navigation[0].load`, `paint["first-paint"]`, `UI Startup`.
//!
//! A path is a sequence of object keys and array indices. Keys are separated
//! by `.`; `[N]` indexes an array and `["key"]` / `['key']` selects a key that
//! would otherwise need escaping. Anything else between separators (spaces
//! included) is part of the key.

use crate::error::{StatsError, StatsResult};
use serde_json::Value;
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricPath {
    raw: String,
    segments: Vec<Segment>,
}

impl MetricPath {
    pub fn parse(raw: &str) -> StatsResult<Self> {
        let invalid = |reason: &str| StatsError::InvalidPath {
            path: raw.to_string(),
            reason: reason.to_string(),
        };

        if raw.trim().is_empty() {
            return Err(invalid("path is empty"));
        }

        let mut segments = Vec::new();
        let mut key = String::new();
        let mut after_bracket = false;
        let mut chars = raw.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if key.is_empty() && !after_bracket {
                        return Err(invalid("empty segment"));
                    }
                    if !key.is_empty() {
                        segments.push(Segment::Key(std::mem::take(&mut key)));
                    }
                    if chars.peek().is_none() {
                        return Err(invalid("trailing '.'"));
                    }
                    after_bracket = false;
                }
                '[' => {
                    if !key.is_empty() {
                        segments.push(Segment::Key(std::mem::take(&mut key)));
                    }
                    segments.push(parse_bracket(&mut chars).map_err(invalid)?);
                    if !matches!(chars.peek(), None | Some('.') | Some('[')) {
                        return Err(invalid("expected '.' or '[' after ']'"));
                    }
                    after_bracket = true;
                }
                ']' => return Err(invalid("unbalanced ']'")),
                _ => key.push(c),
            }
        }

        if !key.is_empty() {
            segments.push(Segment::Key(key));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Walk the path through `root`. Index segments also match object keys
    /// spelled as numbers (`{"0": ...}`).
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(root, |node, segment| match (segment, node) {
                (Segment::Key(k), Value::Object(map)) => map.get(k),
                (Segment::Index(i), Value::Array(items)) => items.get(*i),
                (Segment::Index(i), Value::Object(map)) => map.get(&i.to_string()),
                _ => None,
            })
    }

    /// Resolve to a finite number; anything else is `None`.
    pub fn resolve_number(&self, root: &Value) -> Option<f64> {
        self.resolve(root)
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
    }
}

impl fmt::Display for MetricPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_bracket(chars: &mut Peekable<Chars<'_>>) -> Result<Segment, &'static str> {
    match chars.peek().copied() {
        Some(quote @ ('"' | '\'')) => {
            chars.next();
            let mut key = String::new();
            loop {
                match chars.next() {
                    Some(c) if c == quote => break,
                    Some(c) => key.push(c),
                    None => return Err("unterminated quoted key"),
                }
            }
            match chars.next() {
                Some(']') => Ok(Segment::Key(key)),
                _ => Err("expected ']' after quoted key"),
            }
        }
        _ => {
            let mut digits = String::new();
            loop {
                match chars.next() {
                    Some(']') => break,
                    Some(c) if c.is_ascii_digit() => digits.push(c),
                    Some(_) => return Err("index must be a non-negative integer"),
                    None => return Err("unterminated '['"),
                }
            }
            digits
                .parse::<usize>()
                .map(Segment::Index)
                .map_err(|_| "empty index")
        }
    }
}
