//! JSON patch tool calls against realistic documents.

use docpatch::engine::Engine;
use docpatch::ids::SequentialIds;
use docpatch::json_patch::{JsonPatchRequest, ToolStatus};
use docpatch::{validate_document, CodeRef, EngineConfig};
use serde_json::json;
use std::collections::HashMap;

const DOC: &str = r#"Cats and dogs are friends. The committee approved the annual budget today.

```attributes
{
  "annotations": [
    {
      "id": "annotation_a",
      "text": "Cats",
      "code": "code_pets",
      "actor": "user"
    },
    {
      "id": "annotation_b",
      "text": "dogs",
      "code": "code_pets",
      "actor": "user"
    }
  ]
}
```

```callout
{
  "id": "callout_1",
  "title": "Reminder",
  "kind": "info",
  "actor": "user"
}
```
"#;

fn files() -> HashMap<String, String> {
    HashMap::from([("doc.md".to_string(), DOC.to_string())])
}

fn engine() -> Engine<SequentialIds> {
    Engine::with_generator(EngineConfig::default(), SequentialIds::default())
}

fn request(language: &str, block_id: Option<&str>, ops: serde_json::Value) -> JsonPatchRequest {
    JsonPatchRequest {
        file_path: "doc.md".into(),
        language: language.into(),
        block_id: block_id.map(str::to_string),
        operations: serde_json::from_value(ops).unwrap(),
        available_codes: vec![CodeRef {
            id: "code_pets".into(),
            name: "Pets".into(),
        }],
    }
}

#[test]
fn selector_updates_only_matching_item() {
    let result = engine().patch_json_block(
        &request(
            "attributes",
            None,
            json!([{"op": "add", "path": "/annotations[id=annotation_b]/color", "value": "red"}]),
        ),
        &files(),
    );

    assert_eq!(result.status, ToolStatus::Ok, "{:?}", result.message);
    let content = &result.mutations[0].content;
    assert!(content.contains("\"color\": \"red\""));
    assert_eq!(content.matches("\"actor\": \"agent\"").count(), 1);
    assert_eq!(content.matches("\"actor\": \"user\"").count(), 2);
    assert!(result.output.contains("(1 of 1 operations applied)"));
}

#[test]
fn selector_remove_drops_every_match() {
    let result = engine().patch_json_block(
        &request(
            "attributes",
            None,
            json!([{"op": "remove", "path": "/annotations[code=code_pets]"}]),
        ),
        &files(),
    );

    assert_eq!(result.status, ToolStatus::Ok);
    let content = &result.mutations[0].content;
    assert!(!content.contains("annotation_a"));
    assert!(!content.contains("annotation_b"));
    assert!(content.contains("\"annotations\": []"));
}

#[test]
fn appended_annotation_is_resolved_and_identified() {
    let result = engine().patch_json_block(
        &request(
            "attributes",
            None,
            json!([{
                "op": "add",
                "path": "/annotations/-",
                "value": {"text": "committee approved the annual budget", "code": "code_pets"}
            }]),
        ),
        &files(),
    );

    assert_eq!(result.status, ToolStatus::Ok, "{:?}", result.message);
    let content = &result.mutations[0].content;
    assert!(content.contains("\"text\": \"committee approved the annual budget\""));
    assert!(!content.contains("FUZZY[["));
    assert!(content.contains("\"id\": \"annotation_00000001\""));
    assert!(result.output.contains("Created 1 new item"));
    let codes = [CodeRef {
        id: "code_pets".into(),
        name: "Pets".into(),
    }];
    assert!(validate_document(content, Some(DOC), &codes, None).is_ok());
}

#[test]
fn unknown_code_is_rejected_with_hint() {
    let result = engine().patch_json_block(
        &request(
            "attributes",
            None,
            json!([{"op": "replace", "path": "/annotations[id=annotation_a]/code", "value": "code_zoo"}]),
        ),
        &files(),
    );

    assert_eq!(result.status, ToolStatus::Error);
    assert!(result.output.contains("code_zoo"));
    assert!(result.output.contains("Pets → code_pets"));
    assert!(result.mutations.is_empty());
}

#[test]
fn immutable_callout_kind() {
    let result = engine().patch_json_block(
        &request(
            "callout",
            Some("callout_1"),
            json!([{"op": "replace", "path": "/kind", "value": "warning"}]),
        ),
        &files(),
    );

    assert_eq!(result.status, ToolStatus::Error);
    assert!(result.output.contains("add a new callout instead"));
}

#[test]
fn callout_by_id_and_partial_failure() {
    let result = engine().patch_json_block(
        &request(
            "callout",
            Some("callout_1"),
            json!([
                {"op": "replace", "path": "/title", "value": "Updated reminder"},
                {"op": "test", "path": "/kind", "value": "error"}
            ]),
        ),
        &files(),
    );

    assert_eq!(result.status, ToolStatus::Partial);
    assert!(result.message.as_deref().unwrap().contains("operation 2 (test /kind)"));
    let content = &result.mutations[0].content;
    assert!(content.contains("\"title\": \"Updated reminder\""));
    // The callout changed, so it is attributed to the acting party.
    assert!(content.contains("\"actor\": \"agent\""));
}

#[test]
fn unknown_callout_id() {
    let result = engine().patch_json_block(
        &request(
            "callout",
            Some("callout_9"),
            json!([{"op": "replace", "path": "/title", "value": "x"}]),
        ),
        &files(),
    );

    assert_eq!(result.status, ToolStatus::Error);
    assert!(result.output.contains("callout_9"));
}

#[test]
fn numeric_index_is_refused() {
    let result = engine().patch_json_block(
        &request(
            "attributes",
            None,
            json!([{"op": "remove", "path": "/annotations/1"}]),
        ),
        &files(),
    );

    assert_eq!(result.status, ToolStatus::Error);
    assert!(result.output.contains("[id=...]"));
}

#[test]
fn request_deserializes_from_tool_call_json() {
    let request: JsonPatchRequest = serde_json::from_value(json!({
        "file_path": "doc.md",
        "language": "callout",
        "block_id": "callout_1",
        "operations": [{"op": "replace", "path": "/title", "value": "From JSON"}],
        "available_codes": [{"id": "code_pets", "name": "Pets"}]
    }))
    .unwrap();
    assert_eq!(request.available_codes[0].name, "Pets");

    let result = engine().patch_json_block(&request, &files());
    assert_eq!(result.status, ToolStatus::Ok);
    let serialized = serde_json::to_value(&result).unwrap();
    assert_eq!(serialized["status"], "ok");
    assert!(serialized.get("message").is_none());
}
