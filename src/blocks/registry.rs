//! The closed set of structured block kinds and their static configuration.
//!
//! Adding a block kind means adding a [`BlockKind`] variant, a schema function
//! and a `BlockTypeConfig` constant; nothing else dispatches on language
//! strings.

use crate::blocks::path::ParsedPath;
use crate::blocks::schema::{attributes_schema, callout_schema, ValidationIssue};
use crate::blocks::validator::{validate_attributes, ValidationContext};
use serde_json::Value;

pub type SchemaFn = fn(&Value) -> Vec<ValidationIssue>;
pub type SemanticFn = fn(&Value, &ValidationContext) -> Vec<String>;

/// Marker wrapping annotation text that still needs fuzzy resolution
/// against document prose.
pub const FUZZY_OPEN: &str = "FUZZY[[";
pub const FUZZY_CLOSE: &str = "]]";

pub fn wrap_fuzzy(text: &str) -> String {
    format!("{FUZZY_OPEN}{text}{FUZZY_CLOSE}")
}

pub fn unwrap_fuzzy(text: &str) -> Option<&str> {
    text.strip_prefix(FUZZY_OPEN)?.strip_suffix(FUZZY_CLOSE)
}

pub struct BlockTypeConfig {
    pub language: &'static str,
    /// At most one block of this language per document.
    pub singleton: bool,
    /// Fields that may be set once and never changed, with the reason shown
    /// when a patch tries.
    pub immutable: &'static [(&'static str, &'static str)],
    pub id_paths: &'static [&'static str],
    pub actor_paths: &'static [&'static str],
    /// String fields whose patched values are resolved fuzzily against prose.
    pub fuzzy_text_paths: &'static [&'static str],
    pub schema: SchemaFn,
    pub validate: Option<SemanticFn>,
}

impl std::fmt::Debug for BlockTypeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockTypeConfig")
            .field("language", &self.language)
            .field("singleton", &self.singleton)
            .field("immutable", &self.immutable)
            .field("id_paths", &self.id_paths)
            .field("actor_paths", &self.actor_paths)
            .field("fuzzy_text_paths", &self.fuzzy_text_paths)
            .field("validate", &self.validate.is_some())
            .finish()
    }
}

static ATTRIBUTES: BlockTypeConfig = BlockTypeConfig {
    language: "attributes",
    singleton: true,
    immutable: &[],
    id_paths: &["annotations.*.id"],
    actor_paths: &["annotations.*.actor"],
    fuzzy_text_paths: &["annotations.*.text"],
    schema: attributes_schema,
    validate: Some(validate_attributes),
};

static CALLOUT: BlockTypeConfig = BlockTypeConfig {
    language: "callout",
    singleton: false,
    immutable: &[(
        "kind",
        "callout kind is fixed once created; add a new callout instead",
    )],
    id_paths: &["id"],
    actor_paths: &["actor"],
    fuzzy_text_paths: &[],
    schema: callout_schema,
    validate: None,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Attributes,
    Callout,
}

impl BlockKind {
    pub const ALL: [BlockKind; 2] = [BlockKind::Attributes, BlockKind::Callout];

    pub fn from_language(language: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.language() == language)
    }

    pub fn config(self) -> &'static BlockTypeConfig {
        match self {
            BlockKind::Attributes => &ATTRIBUTES,
            BlockKind::Callout => &CALLOUT,
        }
    }

    pub fn language(self) -> &'static str {
        self.config().language
    }

    pub fn is_singleton(self) -> bool {
        self.config().singleton
    }

    pub fn id_paths(self) -> Vec<ParsedPath> {
        parse_paths(self.config().id_paths)
    }

    pub fn actor_paths(self) -> Vec<ParsedPath> {
        parse_paths(self.config().actor_paths)
    }

    pub fn fuzzy_text_paths(self) -> Vec<ParsedPath> {
        parse_paths(self.config().fuzzy_text_paths)
    }

    /// Field holding the identifier of a whole block, for repeatable kinds.
    pub fn identity_field(self) -> Option<String> {
        if self.is_singleton() {
            return None;
        }
        self.id_paths().into_iter().find_map(|p| match p {
            ParsedPath::Root { field } => Some(field),
            ParsedPath::ArrayItem { .. } => None,
        })
    }

    /// Identifier of a parsed block value, for repeatable kinds.
    pub fn identity(self, value: &Value) -> Option<String> {
        let field = self.identity_field()?;
        value.get(&field)?.as_str().map(str::to_string)
    }

    /// Identifier field used for items of `array_field`, defaulting to `id`.
    pub fn item_id_field(self, array_field: &str) -> String {
        self.id_paths()
            .into_iter()
            .find_map(|p| match p {
                ParsedPath::ArrayItem {
                    array_field: a,
                    item_field,
                } if a == array_field => Some(item_field),
                _ => None,
            })
            .unwrap_or_else(|| "id".to_string())
    }

    pub fn check_schema(self, value: &Value) -> Vec<ValidationIssue> {
        (self.config().schema)(value)
    }

    pub fn check_semantics(self, value: &Value, context: &ValidationContext) -> Vec<String> {
        match self.config().validate {
            Some(validate) => validate(value, context),
            None => Vec::new(),
        }
    }
}

fn parse_paths(raw: &[&str]) -> Vec<ParsedPath> {
    raw.iter()
        .filter_map(|p| match ParsedPath::parse(p) {
            Ok(path) => Some(path),
            Err(err) => {
                log::warn!("ignoring invalid registry path: {err}");
                None
            }
        })
        .collect()
}
