use crate::blocks::cache::DEFAULT_MAX_ENTRIES;
use crate::matcher::{ANNOTATION_MATCH_THRESHOLD, PREVIEW_CONTEXT_LINES, RANGE_MATCH_THRESHOLD};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// Engine settings. Every field has a default, so an empty file is valid.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub actor: ActorConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MatchingConfig {
    /// Minimum per-line similarity for fuzzy range anchors.
    pub range_threshold: f64,
    /// Minimum similarity for fuzzy annotation text.
    pub annotation_threshold: f64,
    /// Context lines shown around ambiguous candidates.
    pub preview_context: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            range_threshold: RANGE_MATCH_THRESHOLD,
            annotation_threshold: ANNOTATION_MATCH_THRESHOLD,
            preview_context: PREVIEW_CONTEXT_LINES,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ActorConfig {
    pub name: String,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            name: "agent".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct WorkspaceConfig {
    /// Root that range references may read from; the current directory when unset.
    pub root: Option<PathBuf>,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        for (field, value) in [
            ("matching.range_threshold", self.matching.range_threshold),
            ("matching.annotation_threshold", self.matching.annotation_threshold),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                issues.push(ValidationIssue::OutOfRange {
                    field,
                    message: format!("{value} is not in (0, 1]"),
                });
            }
        }

        if self.cache.max_entries == 0 {
            issues.push(ValidationIssue::OutOfRange {
                field: "cache.max_entries",
                message: "must be at least 1".to_string(),
            });
        }

        if self.actor.name.trim().is_empty() {
            issues.push(ValidationIssue::MissingField { field: "actor.name" });
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingField { field: &'static str },
    OutOfRange { field: &'static str, message: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { field } => {
                write!(f, "missing required field '{field}'")
            }
            ValidationIssue::OutOfRange { field, message } => {
                write!(f, "'{field}' out of range: {message}")
            }
        }
    }
}
