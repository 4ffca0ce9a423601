//! Tool-call surface: patch one block of one file, report a structured result.

use crate::blocks::errors::BlockError;
use crate::blocks::parser::{
    append_block, document_prose, find_blocks_by_language, parse_code_blocks, replace_block,
    serialize_block_json, CodeBlock,
};
use crate::blocks::registry::BlockKind;
use crate::blocks::schema::BlockValidation;
use crate::blocks::validator::{resolve_fuzzy_text, validate_block, validate_document, CodeRef};
use crate::json_patch::errors::JsonPatchError;
use crate::json_patch::executor::{apply_operations, ExecutionReport, JsonPatchOp};
use crate::matcher::ANNOTATION_MATCH_THRESHOLD;
use crate::patch::range_ref::FileReader;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonPatchRequest {
    pub file_path: String,
    pub language: String,
    /// Required for repeatable block kinds.
    #[serde(default)]
    pub block_id: Option<String>,
    pub operations: Vec<JsonPatchOp>,
    #[serde(default)]
    pub available_codes: Vec<CodeRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Ok,
    Partial,
    Error,
}

/// Whole-file replacement for the caller to write back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMutation {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub status: ToolStatus,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub mutations: Vec<FileMutation>,
}

impl ToolResult {
    fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status: ToolStatus::Error,
            output: message.clone(),
            message: Some(message),
            mutations: Vec::new(),
        }
    }

    fn no_changes(report: &ExecutionReport) -> Self {
        let (status, message) = if report.is_complete() {
            (ToolStatus::Ok, None)
        } else {
            (ToolStatus::Partial, Some(failure_message(report)))
        };
        Self {
            status,
            output: "No changes".to_string(),
            message,
            mutations: Vec::new(),
        }
    }
}

fn failure_message(report: &ExecutionReport) -> String {
    let lines: Vec<String> = report.failures.iter().map(|f| format!("- {f}")).collect();
    format!(
        "{} operation(s) failed:\n{}",
        report.failures.len(),
        lines.join("\n")
    )
}

struct Target {
    block: Option<CodeBlock>,
    value: Value,
}

fn locate_block(content: &str, kind: BlockKind, block_id: Option<&str>) -> Result<Target, JsonPatchError> {
    let blocks = parse_code_blocks(content);
    let candidates = find_blocks_by_language(&blocks, kind.language());
    let parse = |block: &CodeBlock| {
        serde_json::from_str::<Value>(&block.content).map_err(|e| BlockError::InvalidJson {
            language: block.language.clone(),
            message: e.to_string(),
        })
    };

    if kind.is_singleton() {
        return match candidates.first() {
            Some(&block) => Ok(Target {
                value: parse(block)?,
                block: Some(block.clone()),
            }),
            None => Ok(Target {
                block: None,
                value: Value::Object(Default::default()),
            }),
        };
    }

    let id = block_id.ok_or_else(|| BlockError::IdRequired {
        language: kind.language().to_string(),
    })?;
    for block in candidates {
        let Ok(value) = parse(block) else {
            continue;
        };
        if kind.identity(&value).as_deref() == Some(id) {
            return Ok(Target {
                block: Some(block.clone()),
                value,
            });
        }
    }
    Err(BlockError::BlockNotFound {
        language: kind.language().to_string(),
        id: id.to_string(),
    }
    .into())
}

fn invalid_block_message(kind: BlockKind, validation: &BlockValidation) -> String {
    let BlockValidation::Invalid { issues, current } = validation else {
        return String::new();
    };
    let lines: Vec<String> = issues.iter().map(|i| format!("- {i}")).collect();
    format!(
        "Patched {} block failed validation:\n{}\nCurrent values:\n{}",
        kind.language(),
        lines.join("\n"),
        serialize_block_json(current)
    )
}

/// [`patch_json_block_with`] at the default annotation threshold.
pub fn patch_json_block<R: FileReader>(request: &JsonPatchRequest, reader: &R) -> ToolResult {
    patch_json_block_with(request, reader, ANNOTATION_MATCH_THRESHOLD)
}

/// Apply `request.operations` to one block of `request.file_path`.
///
/// The result is never an `Err`: every failure is folded into a
/// [`ToolResult`] with status `error` or `partial`.
pub fn patch_json_block_with<R: FileReader>(
    request: &JsonPatchRequest,
    reader: &R,
    annotation_threshold: f64,
) -> ToolResult {
    let Some(content) = reader.read_file(&request.file_path) else {
        return ToolResult::error(
            JsonPatchError::FileNotFound {
                path: request.file_path.clone(),
            }
            .to_string(),
        );
    };
    let Some(kind) = BlockKind::from_language(&request.language) else {
        return ToolResult::error(BlockError::UnknownLanguage(request.language.clone()).to_string());
    };
    let target = match locate_block(&content, kind, request.block_id.as_deref()) {
        Ok(target) => target,
        Err(err) => return ToolResult::error(err.to_string()),
    };

    let report = apply_operations(&target.value, request.operations.clone(), kind);
    log::debug!(
        "{} block in {}: {} applied, {} failed",
        kind.language(),
        request.file_path,
        report.applied,
        report.failures.len()
    );
    if report.applied == 0 && !report.is_complete() {
        return ToolResult::error(failure_message(&report));
    }
    if report.document == target.value {
        return ToolResult::no_changes(&report);
    }

    let mut patched = report.document.clone();
    resolve_fuzzy_text(kind, &mut patched, &document_prose(&content), annotation_threshold);

    let validation = validate_block(kind, &patched);
    if !validation.is_valid() {
        return ToolResult::error(invalid_block_message(kind, &validation));
    }

    let body = serialize_block_json(&patched);
    let updated = match &target.block {
        Some(block) => match replace_block(&content, block, &body) {
            Ok(updated) => updated,
            Err(err) => return ToolResult::error(err.to_string()),
        },
        None => append_block(&content, kind.language(), &body),
    };

    if let Err(errors) = validate_document(&updated, Some(&content), &request.available_codes, None) {
        return ToolResult::error(format!("Patched document failed validation:\n{errors}"));
    }

    let label = match &request.block_id {
        Some(id) => format!("{} block {id:?}", kind.language()),
        None => format!("{} block", kind.language()),
    };
    let output = format!(
        "Updated {label} in {} ({} of {} operations applied)\n{body}",
        request.file_path,
        report.applied,
        request.operations.len()
    );
    let (status, message) = if report.is_complete() {
        (ToolStatus::Ok, None)
    } else {
        (ToolStatus::Partial, Some(failure_message(&report)))
    };
    ToolResult {
        status,
        output,
        message,
        mutations: vec![FileMutation {
            path: request.file_path.clone(),
            content: updated,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn files(content: &str) -> HashMap<String, String> {
        HashMap::from([("doc.md".to_string(), content.to_string())])
    }

    fn request(language: &str, block_id: Option<&str>, ops: Value) -> JsonPatchRequest {
        JsonPatchRequest {
            file_path: "doc.md".into(),
            language: language.into(),
            block_id: block_id.map(str::to_string),
            operations: serde_json::from_value(ops).unwrap(),
            available_codes: Vec::new(),
        }
    }

    #[test]
    fn identical_result_reports_no_changes() {
        let reader = files("Text.\n\n```attributes\n{\"x\": 1}\n```\n");
        let result = patch_json_block(
            &request("attributes", None, json!([{"op": "replace", "path": "/x", "value": 1}])),
            &reader,
        );
        assert_eq!(result.status, ToolStatus::Ok);
        assert!(result.output.contains("No changes"));
        assert!(result.mutations.is_empty());
    }

    #[test]
    fn callout_requires_id() {
        let reader = files("```callout\n{\"id\": \"c1\", \"title\": \"T\"}\n```\n");
        let result = patch_json_block(
            &request("callout", None, json!([{"op": "replace", "path": "/title", "value": "U"}])),
            &reader,
        );
        assert_eq!(result.status, ToolStatus::Error);
        assert!(result.output.contains("id is required"));
    }

    #[test]
    fn missing_singleton_is_created() {
        let reader = files("Cats are great.\n");
        let result = patch_json_block(
            &request("attributes", None, json!([{"op": "add", "path": "/tags", "value": ["pets"]}])),
            &reader,
        );
        assert_eq!(result.status, ToolStatus::Ok);
        assert_eq!(
            result.mutations[0].content,
            "Cats are great.\n\n```attributes\n{\n  \"tags\": [\n    \"pets\"\n  ]\n}\n```\n"
        );
    }

    #[test]
    fn schema_failure_isolates_current() {
        let reader = files("```callout\n{\"id\": \"c1\", \"title\": \"T\", \"body\": \"b\"}\n```\n");
        let result = patch_json_block(
            &request("callout", Some("c1"), json!([{"op": "replace", "path": "/title", "value": ""}])),
            &reader,
        );
        assert_eq!(result.status, ToolStatus::Error);
        let message = result.message.unwrap();
        assert!(message.contains("title: must not be empty"));
        assert!(message.contains("\"title\": \"\""));
        assert!(!message.contains("\"body\""));
    }

    #[test]
    fn partial_when_some_operations_fail() {
        let reader = files("```callout\n{\"id\": \"c1\", \"title\": \"T\"}\n```\n");
        let result = patch_json_block(
            &request(
                "callout",
                Some("c1"),
                json!([
                    {"op": "replace", "path": "/title", "value": "New"},
                    {"op": "remove", "path": "/body"}
                ]),
            ),
            &reader,
        );
        assert_eq!(result.status, ToolStatus::Partial);
        assert!(result.message.unwrap().contains("operation 2"));
        assert!(result.mutations[0].content.contains("\"title\": \"New\""));
    }

    #[test]
    fn all_failed_is_an_error() {
        let reader = files("```attributes\n{\"annotations\": []}\n```\n");
        let result = patch_json_block(
            &request("attributes", None, json!([{"op": "remove", "path": "/annotations/0"}])),
            &reader,
        );
        assert_eq!(result.status, ToolStatus::Error);
        assert!(result.output.contains("numeric array index"));
    }

    #[test]
    fn missing_file() {
        let reader = HashMap::<String, String>::new();
        let result = patch_json_block(&request("attributes", None, json!([])), &reader);
        assert_eq!(result.status, ToolStatus::Error);
        assert_eq!(result.output, "file not found: doc.md");
    }
}
