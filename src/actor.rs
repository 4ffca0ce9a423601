//! Attribution of block edits to the acting party.
//!
//! A field or array item keeps its recorded actor while its content is
//! unchanged from the previous snapshot; anything new or modified is stamped
//! with the current actor. The attribution field never takes part in the
//! comparison. Stamping never fails: unparseable blocks are left as they are.

use crate::blocks::parser::{replace_block, serialize_block_json};
use crate::blocks::path::ParsedPath;
use crate::blocks::registry::BlockKind;
use crate::blocks::validator::{find_counterpart, parse_document_blocks};
use serde_json::{Map, Value};

/// Structural equality of two objects ignoring `field`.
fn same_ignoring(a: &Map<String, Value>, b: &Map<String, Value>, field: &str) -> bool {
    let a_len = a.len() - usize::from(a.contains_key(field));
    let b_len = b.len() - usize::from(b.contains_key(field));
    a_len == b_len
        && a
            .iter()
            .filter(|(k, _)| k.as_str() != field)
            .all(|(k, v)| b.get(k) == Some(v))
}

/// Keep `old`'s attribution when `new` is otherwise identical, else stamp.
fn carry_or_stamp(
    new: &mut Map<String, Value>,
    old: Option<&Map<String, Value>>,
    field: &str,
    actor: &str,
) {
    match old {
        Some(old) if same_ignoring(old, new, field) => match old.get(field) {
            Some(previous) => {
                new.insert(field.to_string(), previous.clone());
            }
            None => {
                new.remove(field);
            }
        },
        _ => {
            new.insert(field.to_string(), Value::String(actor.to_string()));
        }
    }
}

fn item_id<'a>(item: &'a Value, id_field: &str) -> Option<&'a str> {
    item.get(id_field)
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

/// Stamp one block value against its previous version.
pub fn stamp_block(kind: BlockKind, old: Option<&Value>, new: &mut Value, actor: &str) {
    for path in kind.actor_paths() {
        match &path {
            ParsedPath::Root { field } => {
                let old_object = old.and_then(Value::as_object);
                if let Some(object) = new.as_object_mut() {
                    carry_or_stamp(object, old_object, field, actor);
                }
            }
            ParsedPath::ArrayItem {
                array_field,
                item_field,
            } => {
                let id_field = kind.item_id_field(array_field);
                let old_items: &[Value] = old
                    .and_then(|o| o.get(array_field))
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                let Some(items) = new.get_mut(array_field).and_then(Value::as_array_mut) else {
                    continue;
                };
                for item in items.iter_mut() {
                    let previous = item_id(item, &id_field).and_then(|id| {
                        old_items
                            .iter()
                            .find(|o| item_id(o, &id_field) == Some(id))
                            .and_then(Value::as_object)
                    });
                    if let Some(object) = item.as_object_mut() {
                        carry_or_stamp(object, previous, item_field, actor);
                    }
                }
            }
        }
    }
}

/// Stamp every registered block of `new_document` against its counterpart in
/// `old_document`.
pub fn stamp_actors(old_document: Option<&str>, new_document: &str, actor: &str) -> String {
    let (blocks, _) = parse_document_blocks(new_document, None);
    let old_blocks = old_document
        .map(|old| parse_document_blocks(old, None).0)
        .unwrap_or_default();

    let mut out = new_document.to_string();
    for parsed in blocks.iter().rev() {
        if parsed.kind.config().actor_paths.is_empty() {
            continue;
        }
        let previous = find_counterpart(parsed, &old_blocks).map(|p| &p.value);
        let mut stamped = parsed.value.clone();
        stamp_block(parsed.kind, previous, &mut stamped, actor);
        if stamped == parsed.value {
            continue;
        }
        match replace_block(&out, &parsed.block, &serialize_block_json(&stamped)) {
            Ok(updated) => out = updated,
            Err(err) => log::warn!("skipping actor stamp on {} block: {err}", parsed.kind.language()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn annotations_keep_stamp_or_get_new_one() {
        let old = json!({"annotations": [
            {"id": "a1", "text": "cats", "actor": "human"},
            {"id": "a2", "text": "dogs", "actor": "human"}
        ]});
        let mut new = json!({"annotations": [
            {"id": "a1", "text": "cats", "actor": "human"},
            {"id": "a2", "text": "dogs", "color": "red", "actor": "human"},
            {"id": "a3", "text": "birds", "actor": "human"}
        ]});
        stamp_block(BlockKind::Attributes, Some(&old), &mut new, "agent");
        assert_eq!(new["annotations"][0]["actor"], "human");
        assert_eq!(new["annotations"][1]["actor"], "agent");
        assert_eq!(new["annotations"][2]["actor"], "agent");
    }

    #[test]
    fn attribution_change_alone_is_not_an_edit() {
        let old = json!({"id": "c1", "title": "T", "actor": "human"});
        let mut new = json!({"id": "c1", "title": "T", "actor": "someone else"});
        stamp_block(BlockKind::Callout, Some(&old), &mut new, "agent");
        assert_eq!(new["actor"], "human");
    }

    #[test]
    fn unchanged_block_without_actor_stays_unstamped() {
        let old = json!({"id": "c1", "title": "T"});
        let mut new = old.clone();
        stamp_block(BlockKind::Callout, Some(&old), &mut new, "agent");
        assert_eq!(new, old);
    }

    #[test]
    fn key_order_does_not_matter() {
        let old: Value = serde_json::from_str(r#"{"title": "T", "id": "c1", "actor": "human"}"#).unwrap();
        let mut new: Value = serde_json::from_str(r#"{"id": "c1", "actor": "human", "title": "T"}"#).unwrap();
        stamp_block(BlockKind::Callout, Some(&old), &mut new, "agent");
        assert_eq!(new["actor"], "human");
    }

    #[test]
    fn document_stamping_matches_callouts_by_id() {
        let old = "```callout\n{\"id\": \"c1\", \"title\": \"Old\", \"actor\": \"human\"}\n```\n\n```callout\n{\"id\": \"c2\", \"title\": \"Same\", \"actor\": \"human\"}\n```\n";
        let new = "```callout\n{\"id\": \"c1\", \"title\": \"New\", \"actor\": \"human\"}\n```\n\n```callout\n{\"id\": \"c2\", \"title\": \"Same\", \"actor\": \"human\"}\n```\n";
        let out = stamp_actors(Some(old), new, "agent");
        let (blocks, _) = parse_document_blocks(&out, None);
        assert_eq!(blocks[0].value["actor"], "agent");
        assert_eq!(blocks[1].value["actor"], "human");
        assert!(out.ends_with("{\"id\": \"c2\", \"title\": \"Same\", \"actor\": \"human\"}\n```\n"));
    }

    #[test]
    fn unparseable_documents_pass_through() {
        let doc = "```callout\n{broken\n```\n";
        assert_eq!(stamp_actors(None, doc, "agent"), doc);
    }
}
