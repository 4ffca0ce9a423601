use crate::blocks::errors::BlockError;
use std::fmt;

/// A parsed `id_paths` / `actor_paths` entry.
///
/// Either a field on the block's root object (`"id"`) or a field on every item
/// of a root-level array (`"annotations.*.id"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParsedPath {
    Root { field: String },
    ArrayItem { array_field: String, item_field: String },
}

impl ParsedPath {
    pub fn parse(input: &str) -> Result<Self, BlockError> {
        let invalid = |message: &str| BlockError::InvalidPath {
            input: input.to_string(),
            message: message.to_string(),
        };

        let parts: Vec<&str> = input.split('.').collect();
        if parts.iter().any(|p| p.trim().is_empty() || p.chars().any(char::is_whitespace)) {
            return Err(invalid("empty or whitespace path segment"));
        }

        match parts.as_slice() {
            [field] if *field != "*" => Ok(ParsedPath::Root {
                field: field.to_string(),
            }),
            [array, "*", item] if *array != "*" && *item != "*" => Ok(ParsedPath::ArrayItem {
                array_field: array.to_string(),
                item_field: item.to_string(),
            }),
            _ => Err(invalid("expected 'field' or 'array.*.field'")),
        }
    }

    /// Prefix for generated identifiers: the block language for root paths,
    /// the singular array name for item paths.
    pub fn id_prefix<'a>(&'a self, language: &'a str) -> &'a str {
        match self {
            ParsedPath::Root { .. } => language,
            ParsedPath::ArrayItem { array_field, .. } => {
                array_field.strip_suffix('s').unwrap_or(array_field.as_str())
            }
        }
    }
}

impl fmt::Display for ParsedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParsedPath::Root { field } => write!(f, "{field}"),
            ParsedPath::ArrayItem {
                array_field,
                item_field,
            } => write!(f, "{array_field}.*.{item_field}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_root_path() {
        let path = ParsedPath::parse("id").unwrap();
        assert_eq!(path, ParsedPath::Root { field: "id".into() });
        assert_eq!(path.id_prefix("callout"), "callout");
    }

    #[test]
    fn parse_array_path() {
        let path = ParsedPath::parse("annotations.*.actor").unwrap();
        assert_eq!(path.id_prefix("attributes"), "annotation");
        assert_eq!(path.to_string(), "annotations.*.actor");
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(ParsedPath::parse("").is_err());
        assert!(ParsedPath::parse("a.b").is_err());
        assert!(ParsedPath::parse("a.*").is_err());
        assert!(ParsedPath::parse("*.*.id").is_err());
    }
}
