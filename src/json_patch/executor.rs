//! Selector-aware JSON patch execution over one block value.
//!
//! Operations run one at a time against the evolving document. A failing
//! operation is recorded and skipped; it never aborts the batch. Each source
//! operation is atomic: either all of its selector expansions apply or none do.

use crate::blocks::path::ParsedPath;
use crate::blocks::registry::{unwrap_fuzzy, wrap_fuzzy, BlockKind};
use crate::json_patch::errors::JsonPatchError;
use crate::json_patch::pointer::{self, parse_pointer};
use crate::json_patch::selector::SelectorPath;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum JsonPatchOp {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Move { from: String, path: String },
    Test { path: String, value: Value },
}

impl JsonPatchOp {
    pub fn verb(&self) -> &'static str {
        match self {
            JsonPatchOp::Add { .. } => "add",
            JsonPatchOp::Remove { .. } => "remove",
            JsonPatchOp::Replace { .. } => "replace",
            JsonPatchOp::Move { .. } => "move",
            JsonPatchOp::Test { .. } => "test",
        }
    }

    pub fn path(&self) -> &str {
        match self {
            JsonPatchOp::Add { path, .. }
            | JsonPatchOp::Remove { path }
            | JsonPatchOp::Replace { path, .. }
            | JsonPatchOp::Move { path, .. }
            | JsonPatchOp::Test { path, .. } => path.as_str(),
        }
    }

    pub fn from(&self) -> Option<&str> {
        match self {
            JsonPatchOp::Move { from, .. } => Some(from.as_str()),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            JsonPatchOp::Add { value, .. }
            | JsonPatchOp::Replace { value, .. }
            | JsonPatchOp::Test { value, .. } => Some(value),
            JsonPatchOp::Remove { .. } | JsonPatchOp::Move { .. } => None,
        }
    }

    fn with_path(&self, new_path: String) -> Self {
        let mut op = self.clone();
        match &mut op {
            JsonPatchOp::Add { path, .. }
            | JsonPatchOp::Remove { path }
            | JsonPatchOp::Replace { path, .. }
            | JsonPatchOp::Move { path, .. }
            | JsonPatchOp::Test { path, .. } => *path = new_path,
        }
        op
    }

    /// Apply to `doc` assuming the paths are plain pointers.
    fn apply_concrete(&self, doc: &mut Value) -> Result<(), JsonPatchError> {
        match self {
            JsonPatchOp::Add { path, value } => pointer::add(doc, path, value.clone()),
            JsonPatchOp::Remove { path } => pointer::remove(doc, path).map(|_| ()),
            JsonPatchOp::Replace { path, value } => pointer::replace(doc, path, value.clone()),
            JsonPatchOp::Move { from, path } => pointer::move_value(doc, from, path),
            JsonPatchOp::Test { path, value } => pointer::test_value(doc, path, value),
        }
    }
}

impl fmt::Display for JsonPatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.from() {
            Some(from) => write!(f, "{} {} -> {}", self.verb(), from, self.path()),
            None => write!(f, "{} {}", self.verb(), self.path()),
        }
    }
}

fn is_numeric_path(path: &str) -> bool {
    SelectorPath::parse(path).is_ok_and(|p| p.numeric_segment().is_some())
}

/// The path of `op` that addresses an array element by bare index, if any.
fn numeric_index_path(op: &JsonPatchOp) -> Option<&str> {
    if is_numeric_path(op.path()) {
        return Some(op.path());
    }
    op.from().filter(|from| is_numeric_path(from))
}

/// Split `ops` into `(accepted, rejected)`; rejected operations use a bare
/// numeric array index outside `/-` and selector syntax.
pub fn partition_numeric(ops: Vec<JsonPatchOp>) -> (Vec<JsonPatchOp>, Vec<JsonPatchOp>) {
    ops.into_iter().partition(|op| numeric_index_path(op).is_none())
}

/// Expand selectors in `op` against the current `doc`. Multi-match
/// selectors produce one operation per match: descending index order for
/// `remove`, ascending otherwise.
pub fn resolve_selectors(doc: &Value, op: &JsonPatchOp) -> Result<Vec<JsonPatchOp>, JsonPatchError> {
    let path = SelectorPath::parse(op.path())?;

    let mut resolved = op.clone();
    if let Some(from) = op.from() {
        let from_path = SelectorPath::parse(from)?;
        if from_path.has_selectors() {
            let sources = from_path.expand(doc)?;
            let [source] = sources.as_slice() else {
                return Err(JsonPatchError::AmbiguousSource {
                    selector: from.to_string(),
                    path: op.path().to_string(),
                    count: sources.len(),
                });
            };
            if let JsonPatchOp::Move { from, .. } = &mut resolved {
                *from = source.clone();
            }
        }
    }

    if !path.has_selectors() {
        return Ok(vec![resolved]);
    }
    let mut concrete: Vec<JsonPatchOp> = path
        .expand(doc)?
        .into_iter()
        .map(|p| resolved.with_path(p))
        .collect();
    if matches!(op, JsonPatchOp::Remove { .. }) {
        concrete.reverse();
    }
    log::trace!("{op} expanded to {} operation(s)", concrete.len());
    Ok(concrete)
}

fn targets_fuzzy_field(kind: BlockKind, path: &str) -> bool {
    let Ok(tokens) = parse_pointer(path) else {
        return false;
    };
    kind.fuzzy_text_paths().iter().any(|fuzzy| match fuzzy {
        ParsedPath::Root { field } => tokens.len() == 1 && &tokens[0] == field,
        ParsedPath::ArrayItem {
            array_field,
            item_field,
        } => {
            tokens.len() == 3
                && &tokens[0] == array_field
                && (tokens[1] == "-" || tokens[1].bytes().all(|b| b.is_ascii_digit()))
                && &tokens[2] == item_field
        }
    })
}

/// Mark string values written to fuzzy text fields for resolution against
/// prose. `remove` and `test` are left alone, as are non-string values.
pub fn wrap_fuzzy_text(kind: BlockKind, op: JsonPatchOp) -> JsonPatchOp {
    match op {
        JsonPatchOp::Add {
            path,
            value: Value::String(text),
        } if targets_fuzzy_field(kind, &path) && unwrap_fuzzy(&text).is_none() => JsonPatchOp::Add {
            path,
            value: Value::String(wrap_fuzzy(&text)),
        },
        JsonPatchOp::Replace {
            path,
            value: Value::String(text),
        } if targets_fuzzy_field(kind, &path) && unwrap_fuzzy(&text).is_none() => JsonPatchOp::Replace {
            path,
            value: Value::String(wrap_fuzzy(&text)),
        },
        other => other,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationFailure {
    /// Position of the operation in the submitted list.
    pub index: usize,
    pub operation: String,
    pub error: JsonPatchError,
}

impl fmt::Display for OperationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operation {} ({}): {}", self.index + 1, self.operation, self.error)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    pub document: Value,
    pub applied: usize,
    pub failures: Vec<OperationFailure>,
}

impl ExecutionReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run `ops` against `doc`, numeric-index rejection included.
pub fn apply_operations(doc: &Value, ops: Vec<JsonPatchOp>, kind: BlockKind) -> ExecutionReport {
    let mut document = doc.clone();
    let mut applied = 0;
    let mut failures = Vec::new();

    for (index, op) in ops.into_iter().enumerate() {
        if let Some(path) = numeric_index_path(&op) {
            failures.push(OperationFailure {
                index,
                operation: op.to_string(),
                error: JsonPatchError::NumericIndex {
                    path: path.to_string(),
                },
            });
            continue;
        }

        let outcome = resolve_selectors(&document, &op).and_then(|concrete| {
            let mut scratch = document.clone();
            for step in concrete {
                wrap_fuzzy_text(kind, step).apply_concrete(&mut scratch)?;
            }
            Ok(scratch)
        });

        match outcome {
            Ok(next) => {
                document = next;
                applied += 1;
            }
            Err(error) => {
                log::debug!("json patch operation {} failed: {error}", index + 1);
                failures.push(OperationFailure {
                    index,
                    operation: op.to_string(),
                    error,
                });
            }
        }
    }

    ExecutionReport {
        document,
        applied,
        failures,
    }
}
