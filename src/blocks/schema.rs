//! Structural schemas for the registered block kinds.
//!
//! Each schema is a plain function from a parsed JSON value to the list of
//! complaints about it. Issue paths are dotted (`annotations.2.text`), with
//! the empty path standing for the block root.

use serde_json::{Map, Value};
use std::fmt;

/// One schema or semantic complaint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
    pub expected: Option<String>,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            expected: None,
        }
    }

    pub fn expecting(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    /// Top-level field this issue is about, if any.
    pub fn top_level_field(&self) -> Option<&str> {
        self.path.split('.').next().filter(|f| !f.is_empty())
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "<root>" } else { self.path.as_str() };
        write!(f, "{path}: {}", self.message)?;
        if let Some(expected) = &self.expected {
            write!(f, " (expected {expected})")?;
        }
        Ok(())
    }
}

/// Outcome of validating one block value.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockValidation {
    Valid { data: Value },
    Invalid {
        issues: Vec<ValidationIssue>,
        /// Only the top-level fields implicated by `issues`.
        current: Value,
    },
}

impl BlockValidation {
    pub fn from_issues(value: &Value, issues: Vec<ValidationIssue>) -> Self {
        if issues.is_empty() {
            return BlockValidation::Valid {
                data: value.clone(),
            };
        }
        let current = isolate_current(value, &issues);
        BlockValidation::Invalid { issues, current }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, BlockValidation::Valid { .. })
    }
}

/// Keep only the top-level fields named by `issues`; a root-level issue keeps
/// the whole value.
pub fn isolate_current(value: &Value, issues: &[ValidationIssue]) -> Value {
    let Some(object) = value.as_object() else {
        return value.clone();
    };
    if issues.iter().any(|i| i.top_level_field().is_none()) {
        return value.clone();
    }
    let mut current = Map::new();
    for field in issues.iter().filter_map(ValidationIssue::top_level_field) {
        if let Some(v) = object.get(field) {
            current.insert(field.to_string(), v.clone());
        }
    }
    Value::Object(current)
}

pub const ANNOTATION_COLORS: &[&str] = &["red", "orange", "yellow", "green", "blue", "purple", "gray"];
pub const CALLOUT_KINDS: &[&str] = &["info", "warning", "success", "error"];

/// Accumulates issues while walking a value.
#[derive(Default)]
struct Checker {
    issues: Vec<ValidationIssue>,
}

fn join(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{path}.{field}")
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Checker {
    fn object<'a>(&mut self, path: &str, value: &'a Value) -> Option<&'a Map<String, Value>> {
        match value.as_object() {
            Some(map) => Some(map),
            None => {
                self.issues.push(
                    ValidationIssue::new(path, format!("must be an object, got {}", type_name(value)))
                        .expecting("object"),
                );
                None
            }
        }
    }

    fn known_keys(&mut self, path: &str, map: &Map<String, Value>, allowed: &[&str]) {
        for key in map.keys() {
            if !allowed.contains(&key.as_str()) {
                self.issues.push(
                    ValidationIssue::new(join(path, key), "unknown field")
                        .expecting(format!("one of {}", allowed.join(", "))),
                );
            }
        }
    }

    fn string(&mut self, path: &str, map: &Map<String, Value>, field: &str, required: bool) -> Option<String> {
        let path = join(path, field);
        match map.get(field) {
            None if required => {
                self.issues
                    .push(ValidationIssue::new(path, "is required").expecting("string"));
                None
            }
            None => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                self.issues.push(
                    ValidationIssue::new(path, format!("must be a string, got {}", type_name(other)))
                        .expecting("string"),
                );
                None
            }
        }
    }

    fn non_empty_string(&mut self, path: &str, map: &Map<String, Value>, field: &str, required: bool) {
        if let Some(s) = self.string(path, map, field, required) {
            if s.trim().is_empty() {
                self.issues.push(
                    ValidationIssue::new(join(path, field), "must not be empty")
                        .expecting("non-empty string"),
                );
            }
        }
    }

    fn one_of(&mut self, path: &str, map: &Map<String, Value>, field: &str, allowed: &[&str]) {
        if let Some(s) = self.string(path, map, field, false) {
            if !allowed.contains(&s.as_str()) {
                self.issues.push(
                    ValidationIssue::new(join(path, field), format!("invalid value {s:?}"))
                        .expecting(format!("one of {}", allowed.join(", "))),
                );
            }
        }
    }

    fn array<'a>(&mut self, path: &str, map: &'a Map<String, Value>, field: &str) -> Option<&'a Vec<Value>> {
        match map.get(field)? {
            Value::Array(items) => Some(items),
            other => {
                self.issues.push(
                    ValidationIssue::new(
                        join(path, field),
                        format!("must be an array, got {}", type_name(other)),
                    )
                    .expecting("array"),
                );
                None
            }
        }
    }
}

pub fn attributes_schema(value: &Value) -> Vec<ValidationIssue> {
    let mut check = Checker::default();
    let Some(root) = check.object("", value) else {
        return check.issues;
    };
    check.known_keys("", root, &["tags", "annotations"]);

    if let Some(tags) = check.array("", root, "tags") {
        for (idx, tag) in tags.iter().enumerate() {
            let path = format!("tags.{idx}");
            match tag {
                Value::String(s) if !s.trim().is_empty() => {}
                Value::String(_) => check
                    .issues
                    .push(ValidationIssue::new(path, "must not be empty").expecting("non-empty string")),
                other => check.issues.push(
                    ValidationIssue::new(path, format!("must be a string, got {}", type_name(other)))
                        .expecting("string"),
                ),
            }
        }
    }

    if let Some(annotations) = check.array("", root, "annotations") {
        for (idx, item) in annotations.iter().enumerate() {
            let path = format!("annotations.{idx}");
            let Some(annotation) = check.object(&path, item) else {
                continue;
            };
            check.known_keys(&path, annotation, &["id", "text", "code", "color", "note", "actor"]);
            check.non_empty_string(&path, annotation, "text", true);
            check.string(&path, annotation, "id", false);
            check.string(&path, annotation, "code", false);
            check.string(&path, annotation, "note", false);
            check.string(&path, annotation, "actor", false);
            check.one_of(&path, annotation, "color", ANNOTATION_COLORS);
        }
    }

    check.issues
}

pub fn callout_schema(value: &Value) -> Vec<ValidationIssue> {
    let mut check = Checker::default();
    let Some(root) = check.object("", value) else {
        return check.issues;
    };
    check.known_keys("", root, &["id", "title", "body", "kind", "actor"]);
    check.non_empty_string("", root, "title", true);
    check.string("", root, "id", false);
    check.string("", root, "body", false);
    check.string("", root, "actor", false);
    check.one_of("", root, "kind", CALLOUT_KINDS);
    check.issues
}
