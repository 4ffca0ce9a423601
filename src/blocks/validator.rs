//! Whole-document validation of structured blocks.
//!
//! Runs, for every registered block in a document: JSON parsing, the kind's
//! structural schema, singleton counting, immutable-field protection against
//! an original snapshot, identifier continuity, and the kind's semantic hook.
//! Every problem is collected; nothing short-circuits.

use crate::blocks::cache::{parse_block_json, ParseCache};
use crate::blocks::parser::{
    document_prose, parse_code_blocks, replace_block, serialize_block_json, CodeBlock,
};
use crate::blocks::path::ParsedPath;
use crate::blocks::registry::{unwrap_fuzzy, BlockKind};
use crate::blocks::schema::{BlockValidation, ValidationIssue};
use crate::matcher::find_fuzzy_span;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

/// A code identifier annotations may reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeRef {
    pub id: String,
    pub name: String,
}

/// Cross-cutting inputs for semantic checks.
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    /// Document text with all fenced blocks removed.
    pub document_prose: String,
    pub available_codes: Vec<CodeRef>,
}

impl ValidationContext {
    pub fn for_document(document: &str, available_codes: &[CodeRef]) -> Self {
        Self {
            document_prose: document_prose(document),
            available_codes: available_codes.to_vec(),
        }
    }
}

/// Semantic hook for `attributes` blocks.
pub fn validate_attributes(value: &Value, context: &ValidationContext) -> Vec<String> {
    let mut problems = Vec::new();
    let Some(annotations) = value.get("annotations").and_then(Value::as_array) else {
        return problems;
    };
    let prose = context.document_prose.to_lowercase();

    for annotation in annotations {
        if let Some(text) = annotation.get("text").and_then(Value::as_str) {
            let text = unwrap_fuzzy(text).unwrap_or(text);
            if !text.trim().is_empty() && !prose.contains(&text.to_lowercase()) {
                problems.push(format!("Annotation text {text:?} not found in document"));
            }
        }

        if let Some(code) = annotation.get("code").and_then(Value::as_str) {
            if !context.available_codes.iter().any(|c| c.id == code) {
                problems.push(format!(
                    "Code {code:?} not found. {}",
                    code_hint(&context.available_codes)
                ));
            }
        }
    }
    problems
}

fn code_hint(codes: &[CodeRef]) -> String {
    if codes.is_empty() {
        return "No codes are defined.".to_string();
    }
    let pairs: Vec<String> = codes
        .iter()
        .map(|c| format!("{} → {}", c.name, c.id))
        .collect();
    format!("Available codes: {}", pairs.join(", "))
}

/// Validate a single block value against its kind's schema.
pub fn validate_block(kind: BlockKind, value: &Value) -> BlockValidation {
    BlockValidation::from_issues(value, kind.check_schema(value))
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentIssue {
    InvalidJson {
        language: String,
        message: String,
    },
    Schema {
        language: String,
        block_id: Option<String>,
        issue: ValidationIssue,
        current: Value,
    },
    SingletonViolation {
        language: String,
        count: usize,
    },
    ImmutableField {
        language: String,
        block_id: Option<String>,
        field: String,
        reason: String,
    },
    MissingIdentifier {
        language: String,
        missing: Vec<String>,
    },
    Semantic {
        language: String,
        message: String,
    },
}

impl fmt::Display for DocumentIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentIssue::InvalidJson { language, message } => {
                write!(f, "parse error in {language} block: {message}")
            }
            DocumentIssue::Schema {
                language,
                block_id,
                issue,
                ..
            } => match block_id {
                Some(id) => write!(f, "{language} block {id:?}: {issue}"),
                None => write!(f, "{language} block: {issue}"),
            },
            DocumentIssue::SingletonViolation { language, count } => write!(
                f,
                "validation error: only one {language} block is allowed per document, found {count}"
            ),
            DocumentIssue::ImmutableField {
                language,
                block_id,
                field,
                reason,
            } => match block_id {
                Some(id) => write!(f, "{language} block {id:?}: field '{field}' cannot change: {reason}"),
                None => write!(f, "{language} block: field '{field}' cannot change: {reason}"),
            },
            DocumentIssue::MissingIdentifier { language, missing } => write!(
                f,
                "{language} block is missing its identifier; keep the existing id ({}) when editing it",
                missing.join(", ")
            ),
            DocumentIssue::Semantic { language, message } => write!(f, "{language} block: {message}"),
        }
    }
}

/// All problems found in one document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentErrors {
    pub issues: Vec<DocumentIssue>,
}

impl fmt::Display for DocumentErrors {
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

impl std::error::Error for DocumentErrors {}

/// A registered block with its parsed body.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBlock {
    pub kind: BlockKind,
    pub block: CodeBlock,
    pub value: Value,
}

impl ParsedBlock {
    pub fn identity(&self) -> Option<String> {
        self.kind.identity(&self.value)
    }
}

/// Parse every registered block in `document`. Unregistered languages are
/// ignored; JSON failures are returned alongside the successes.
pub fn parse_document_blocks(
    document: &str,
    mut cache: Option<&mut ParseCache>,
) -> (Vec<ParsedBlock>, Vec<DocumentIssue>) {
    let mut parsed = Vec::new();
    let mut failures = Vec::new();
    for block in parse_code_blocks(document) {
        let Some(kind) = BlockKind::from_language(&block.language) else {
            continue;
        };
        match parse_block_json(cache.as_deref_mut(), &block.language, &block.content) {
            Ok(value) => parsed.push(ParsedBlock { kind, block, value }),
            Err(err) => failures.push(DocumentIssue::InvalidJson {
                language: block.language.clone(),
                message: match err {
                    crate::blocks::BlockError::InvalidJson { message, .. } => message,
                    other => other.to_string(),
                },
            }),
        }
    }
    (parsed, failures)
}

/// Find the block in `candidates` that `block` corresponds to: the first of
/// the same kind for singletons, the one with the same identifier otherwise.
pub fn find_counterpart<'a>(block: &ParsedBlock, candidates: &'a [ParsedBlock]) -> Option<&'a ParsedBlock> {
    if block.kind.is_singleton() {
        return candidates.iter().find(|c| c.kind == block.kind);
    }
    let id = block.identity()?;
    candidates
        .iter()
        .find(|c| c.kind == block.kind && c.identity().as_deref() == Some(id.as_str()))
}

/// Validate `document`, comparing against `original` for immutable fields and
/// identifier continuity. Returns the parsed blocks on success.
pub fn validate_document(
    document: &str,
    original: Option<&str>,
    available_codes: &[CodeRef],
    mut cache: Option<&mut ParseCache>,
) -> Result<Vec<ParsedBlock>, DocumentErrors> {
    let (blocks, mut issues) = parse_document_blocks(document, cache.as_deref_mut());
    let original_blocks = original
        .map(|o| parse_document_blocks(o, cache.as_deref_mut()).0)
        .unwrap_or_default();
    let context = ValidationContext::for_document(document, available_codes);

    for kind in BlockKind::ALL {
        let of_kind: Vec<&ParsedBlock> = blocks.iter().filter(|b| b.kind == kind).collect();
        if kind.is_singleton() && of_kind.len() > 1 {
            issues.push(DocumentIssue::SingletonViolation {
                language: kind.language().to_string(),
                count: of_kind.len(),
            });
        }
        if !kind.is_singleton() {
            check_identifiers(kind, &of_kind, &original_blocks, &mut issues);
        }
    }

    for block in &blocks {
        let language = block.kind.language().to_string();
        let block_id = block.identity();

        if let BlockValidation::Invalid { issues: found, current } = validate_block(block.kind, &block.value) {
            issues.extend(found.into_iter().map(|issue| DocumentIssue::Schema {
                language: language.clone(),
                block_id: block_id.clone(),
                issue,
                current: current.clone(),
            }));
            continue;
        }

        if let Some(previous) = find_counterpart(block, &original_blocks) {
            for (field, reason) in block.kind.config().immutable {
                let Some(before) = previous.value.get(*field) else {
                    continue;
                };
                if block.value.get(*field) != Some(before) {
                    issues.push(DocumentIssue::ImmutableField {
                        language: language.clone(),
                        block_id: block_id.clone(),
                        field: field.to_string(),
                        reason: reason.to_string(),
                    });
                }
            }
        }

        issues.extend(
            block
                .kind
                .check_semantics(&block.value, &context)
                .into_iter()
                .map(|message| DocumentIssue::Semantic {
                    language: language.clone(),
                    message,
                }),
        );
    }

    if issues.is_empty() {
        Ok(blocks)
    } else {
        log::debug!("document validation found {} issue(s)", issues.len());
        Err(DocumentErrors { issues })
    }
}

/// An identified block that vanished while an unidentified block of the same
/// kind appeared is an edit that dropped its id, not a delete plus an add.
fn check_identifiers(
    kind: BlockKind,
    blocks: &[&ParsedBlock],
    original: &[ParsedBlock],
    issues: &mut Vec<DocumentIssue>,
) {
    let unidentified = blocks.iter().filter(|b| b.identity().is_none()).count();
    if unidentified == 0 {
        return;
    }
    let present: BTreeSet<String> = blocks.iter().filter_map(|b| b.identity()).collect();
    let missing: Vec<String> = original
        .iter()
        .filter(|b| b.kind == kind)
        .filter_map(ParsedBlock::identity)
        .filter(|id| !present.contains(id))
        .collect();
    if !missing.is_empty() {
        issues.push(DocumentIssue::MissingIdentifier {
            language: kind.language().to_string(),
            missing,
        });
    }
}

/// Rewrite `FUZZY[[...]]` values at the kind's fuzzy text paths to the prose
/// span they best match. Unresolvable values are unwrapped as-is so the
/// containment check reports them. Returns true when anything changed.
pub fn resolve_fuzzy_text(kind: BlockKind, value: &mut Value, prose: &str, threshold: f64) -> bool {
    let mut changed = false;
    for path in kind.fuzzy_text_paths() {
        let targets: Vec<&mut Value> = match &path {
            ParsedPath::Root { field } => value.get_mut(field).into_iter().collect(),
            ParsedPath::ArrayItem {
                array_field,
                item_field,
            } => match value.get_mut(array_field).and_then(Value::as_array_mut) {
                Some(items) => items
                    .iter_mut()
                    .filter_map(|item| item.get_mut(item_field))
                    .collect(),
                None => Vec::new(),
            },
        };

        for target in targets {
            let Some(wrapped) = target.as_str() else {
                continue;
            };
            let Some(inner) = unwrap_fuzzy(wrapped) else {
                continue;
            };
            let found = find_fuzzy_span(prose, inner, threshold)
                .and_then(|span| prose.get(span.start..span.end));
            let resolved = match found {
                Some(text) => text.to_string(),
                None => {
                    log::debug!("no prose span matched fuzzy text {inner:?}");
                    inner.to_string()
                }
            };
            *target = Value::String(resolved);
            changed = true;
        }
    }
    changed
}

/// Apply [`resolve_fuzzy_text`] to every registered block of `document`.
pub fn resolve_document_fuzzy_text(document: &str, threshold: f64) -> String {
    let prose = document_prose(document);
    let (blocks, _) = parse_document_blocks(document, None);
    let mut out = document.to_string();
    // Bottom-up so earlier offsets stay valid.
    for mut parsed in blocks.into_iter().rev() {
        if !resolve_fuzzy_text(parsed.kind, &mut parsed.value, &prose, threshold) {
            continue;
        }
        match replace_block(&out, &parsed.block, &serialize_block_json(&parsed.value)) {
            Ok(updated) => out = updated,
            Err(err) => log::warn!("could not write resolved fuzzy text: {err}"),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::ANNOTATION_MATCH_THRESHOLD;
    use serde_json::json;

    fn doc(prose: &str, attributes: &str) -> String {
        format!("{prose}\n\n```attributes\n{attributes}\n```\n")
    }

    #[test]
    fn annotation_text_found_case_insensitively() {
        let document = doc("CATS are great.", r#"{"annotations": [{"text": "cats", "color": "red"}]}"#);
        assert!(validate_document(&document, None, &[], None).is_ok());
    }

    #[test]
    fn annotation_text_missing_from_prose() {
        let document = doc(
            "This document has no animals.",
            r#"{"annotations": [{"text": "cats", "color": "red"}]}"#,
        );
        let err = validate_document(&document, None, &[], None).unwrap_err();
        assert!(err.to_string().contains("not found in document"));
    }

    #[test]
    fn block_content_is_not_prose() {
        let document = format!(
            "Nothing here.\n\n```callout\n{{\"title\": \"cats\"}}\n```\n\n```attributes\n{}\n```\n",
            r#"{"annotations": [{"text": "cats"}]}"#
        );
        assert!(validate_document(&document, None, &[], None).is_err());
    }

    #[test]
    fn unknown_code_reports_hint() {
        let document = doc("Budget talk.", r#"{"annotations": [{"text": "budget", "code": "Budget"}]}"#);
        let codes = vec![CodeRef {
            id: "code_budget".into(),
            name: "Budget".into(),
        }];
        let err = validate_document(&document, None, &codes, None).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Code \"Budget\" not found"));
        assert!(message.contains("Budget → code_budget"));
    }

    #[test]
    fn second_singleton_is_rejected() {
        let one = doc("Text.", "{}");
        assert!(validate_document(&one, None, &[], None).is_ok());
        let two = format!("{one}\n```attributes\n{{}}\n```\n");
        let err = validate_document(&two, Some(&one), &[], None).unwrap_err();
        assert!(matches!(err.issues[0], DocumentIssue::SingletonViolation { count: 2, .. }));
        assert!(err.to_string().contains("validation error"));
    }

    #[test]
    fn invalid_json_is_reported() {
        let document = doc("Text.", "{not json");
        let err = validate_document(&document, None, &[], None).unwrap_err();
        assert!(matches!(err.issues[0], DocumentIssue::InvalidJson { .. }));
    }

    #[test]
    fn schema_issue_isolates_current() {
        let document = "```callout\n{\"id\": \"c1\", \"title\": \"\", \"body\": \"b\"}\n```\n";
        let err = validate_document(document, None, &[], None).unwrap_err();
        match &err.issues[0] {
            DocumentIssue::Schema { current, block_id, .. } => {
                assert_eq!(current, &json!({"title": ""}));
                assert_eq!(block_id.as_deref(), Some("c1"));
            }
            other => panic!("unexpected issue {other:?}"),
        }
    }

    #[test]
    fn immutable_field_change_uses_reason() {
        let original = "```callout\n{\"id\": \"c1\", \"title\": \"T\", \"kind\": \"info\"}\n```\n";
        let changed = "```callout\n{\"id\": \"c1\", \"title\": \"T\", \"kind\": \"error\"}\n```\n";
        let err = validate_document(changed, Some(original), &[], None).unwrap_err();
        assert!(err.to_string().contains("callout kind is fixed once created"));
        assert!(validate_document(original, Some(original), &[], None).is_ok());
    }

    #[test]
    fn dropped_identifier_is_not_a_new_block() {
        let original = "```callout\n{\"id\": \"c1\", \"title\": \"T\"}\n```\n";
        let changed = "```callout\n{\"title\": \"T2\"}\n```\n";
        let err = validate_document(changed, Some(original), &[], None).unwrap_err();
        assert!(matches!(&err.issues[0], DocumentIssue::MissingIdentifier { missing, .. } if missing == &vec!["c1".to_string()]));
    }

    #[test]
    fn new_unidentified_block_alongside_existing_is_fine() {
        let original = "```callout\n{\"id\": \"c1\", \"title\": \"T\"}\n```\n";
        let changed = format!("{original}\n```callout\n{{\"title\": \"New\"}}\n```\n");
        assert!(validate_document(&changed, Some(original), &[], None).is_ok());
    }

    #[test]
    fn fuzzy_text_resolves_to_prose_span() {
        let document = doc(
            "The committee approved the annual budget today.",
            r#"{"annotations": [{"text": "FUZZY[[approved the anual budget]]"}]}"#,
        );
        let resolved = resolve_document_fuzzy_text(&document, ANNOTATION_MATCH_THRESHOLD);
        assert!(resolved.contains("\"approved the annual budget\""));
        assert!(validate_document(&resolved, None, &[], None).is_ok());
    }
}
