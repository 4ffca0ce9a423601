//! Selector-extended JSON pointer paths.
//!
//! A path is a JSON pointer whose segments may carry an array filter:
//! `/annotations[code=code_a]/text`. Filters are `key=value`, `key!=value`,
//! `key` (truthy) and `!key` (absent or falsy). `null`, `false`, `0` and `""`
//! are falsy; everything else, empty arrays and objects included, is truthy.
//! Values may be double-quoted. Errors report the byte position in the original path.

use crate::json_patch::errors::JsonPatchError;
use crate::json_patch::pointer::{get, render_pointer};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Equals { key: String, value: String },
    NotEquals { key: String, value: String },
    Has { key: String },
    Missing { key: String },
}

fn scalar_matches(actual: &Value, wanted: &str) -> bool {
    match actual {
        Value::String(s) => s == wanted,
        Value::Number(_) | Value::Bool(_) | Value::Null => actual.to_string() == wanted,
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

impl Selector {
    pub fn matches(&self, item: &Value) -> bool {
        let field = |key: &str| item.get(key).filter(|v| !v.is_null());
        match self {
            Selector::Equals { key, value } => field(key).is_some_and(|v| scalar_matches(v, value)),
            Selector::NotEquals { key, value } => !field(key).is_some_and(|v| scalar_matches(v, value)),
            Selector::Has { key } => field(key).is_some_and(is_truthy),
            Selector::Missing { key } => !field(key).is_some_and(is_truthy),
        }
    }

    /// Parse the text between `[` and `]`; `offset` is its position in `path`.
    fn parse(text: &str, path: &str, offset: usize) -> Result<Self, JsonPatchError> {
        let err = |at: usize, message: &str| JsonPatchError::InvalidPath {
            path: path.to_string(),
            position: offset + at,
            message: message.to_string(),
        };
        let key_of = |key: &str, at: usize| -> Result<String, JsonPatchError> {
            let key = key.trim();
            if key.is_empty() {
                return Err(err(at, "empty selector key"));
            }
            Ok(key.to_string())
        };

        if text.trim().is_empty() {
            return Err(err(0, "empty selector"));
        }
        if let Some(key) = text.strip_prefix('!') {
            if let Some(eq) = key.find('=') {
                return Err(err(1 + eq, "unexpected '=' in '!key' selector"));
            }
            return Ok(Selector::Missing { key: key_of(key, 1)? });
        }
        if let Some(pos) = text.find("!=") {
            return Ok(Selector::NotEquals {
                key: key_of(&text[..pos], 0)?,
                value: unquote(&text[pos + 2..]),
            });
        }
        if let Some(pos) = text.find('=') {
            return Ok(Selector::Equals {
                key: key_of(&text[..pos], 0)?,
                value: unquote(&text[pos + 1..]),
            });
        }
        Ok(Selector::Has { key: key_of(text, 0)? })
    }
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
        .to_string()
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Equals { key, value } => write!(f, "{key}={value}"),
            Selector::NotEquals { key, value } => write!(f, "{key}!={value}"),
            Selector::Has { key } => write!(f, "{key}"),
            Selector::Missing { key } => write!(f, "!{key}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    /// Filter the array at `field` (or the current value when `None`).
    Select {
        field: Option<String>,
        selector: Selector,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorPath {
    raw: String,
    segments: Vec<Segment>,
}

impl SelectorPath {
    pub fn parse(path: &str) -> Result<Self, JsonPatchError> {
        let err = |position: usize, message: &str| JsonPatchError::InvalidPath {
            path: path.to_string(),
            position,
            message: message.to_string(),
        };

        let mut segments = Vec::new();
        if path.is_empty() {
            return Ok(Self {
                raw: String::new(),
                segments,
            });
        }
        if !path.starts_with('/') {
            return Err(err(0, "path must start with '/'"));
        }

        let bytes = path.as_bytes();
        let mut pos = 1;
        loop {
            let mut key = String::new();
            let mut selector = None;
            while pos < bytes.len() && bytes[pos] != b'/' {
                match bytes[pos] {
                    b'~' => {
                        match bytes.get(pos + 1) {
                            Some(b'0') => key.push('~'),
                            Some(b'1') => key.push('/'),
                            _ => return Err(err(pos, "'~' must be followed by '0' or '1'")),
                        }
                        pos += 2;
                    }
                    b'[' => {
                        let close = path[pos..]
                            .find(']')
                            .map(|rel| pos + rel)
                            .ok_or_else(|| err(pos, "unterminated selector"))?;
                        selector = Some(Selector::parse(&path[pos + 1..close], path, pos + 1)?);
                        pos = close + 1;
                        if pos < bytes.len() && bytes[pos] != b'/' {
                            return Err(err(pos, "expected '/' after selector"));
                        }
                    }
                    b']' => return Err(err(pos, "unexpected ']'")),
                    _ => {
                        let ch_len = path[pos..].chars().next().map_or(1, char::len_utf8);
                        key.push_str(&path[pos..pos + ch_len]);
                        pos += ch_len;
                    }
                }
            }

            segments.push(match selector {
                Some(selector) => Segment::Select {
                    field: (!key.is_empty()).then_some(key),
                    selector,
                },
                None => Segment::Key(key),
            });

            if pos >= bytes.len() {
                break;
            }
            pos += 1;
        }

        Ok(Self {
            raw: path.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn has_selectors(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Select { .. }))
    }

    /// First plain segment that is a bare array index.
    pub fn numeric_segment(&self) -> Option<&str> {
        self.segments.iter().find_map(|s| match s {
            Segment::Key(k) if !k.is_empty() && k.bytes().all(|b| b.is_ascii_digit()) => Some(k.as_str()),
            _ => None,
        })
    }

    /// Expand selectors against `doc` into concrete pointers, in ascending
    /// index order.
    pub fn expand(&self, doc: &Value) -> Result<Vec<String>, JsonPatchError> {
        let mut prefixes: Vec<Vec<String>> = vec![Vec::new()];
        for segment in &self.segments {
            match segment {
                Segment::Key(key) => {
                    for prefix in &mut prefixes {
                        prefix.push(key.clone());
                    }
                }
                Segment::Select { field, selector } => {
                    let mut next = Vec::new();
                    let mut searched = String::new();
                    for prefix in &prefixes {
                        let mut array_path = prefix.clone();
                        if let Some(field) = field {
                            array_path.push(field.clone());
                        }
                        searched = render_pointer(&array_path);
                        let target = get(doc, &array_path).ok_or_else(|| JsonPatchError::PathNotFound {
                            path: searched.clone(),
                        })?;
                        let items = target.as_array().ok_or_else(|| JsonPatchError::NotAnArray {
                            path: searched.clone(),
                        })?;
                        for (idx, item) in items.iter().enumerate() {
                            if selector.matches(item) {
                                let mut concrete = array_path.clone();
                                concrete.push(idx.to_string());
                                next.push(concrete);
                            }
                        }
                    }
                    if next.is_empty() {
                        return Err(JsonPatchError::NoMatch {
                            selector: selector.to_string(),
                            path: searched,
                        });
                    }
                    prefixes = next;
                }
            }
        }
        Ok(prefixes.iter().map(|p| render_pointer(p)).collect())
    }
}

impl fmt::Display for SelectorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
