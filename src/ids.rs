//! Identifier generation: `[uuid-<name>]` placeholders and declarative
//! backfill of missing block and item identifiers.
//!
//! Token generation is behind [`IdGenerator`] so tests can run on a
//! deterministic sequence.

use crate::blocks::parser::{replace_blocks, serialize_block_json};
use crate::blocks::path::ParsedPath;
use crate::blocks::registry::BlockKind;
use crate::blocks::validator::parse_document_blocks;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

const PLACEHOLDER_OPEN: &str = "[uuid-";
const TOKEN_RETRIES: usize = 16;

/// Source of short unique tokens.
pub trait IdGenerator {
    fn token(&mut self) -> String;
}

/// Eight hex characters from a fresh v4 UUID.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn token(&mut self) -> String {
        let mut simple = Uuid::new_v4().simple().to_string();
        simple.truncate(8);
        simple
    }
}

/// Deterministic tokens `00000001`, `00000002`, ...
#[derive(Debug, Default, Clone)]
pub struct SequentialIds {
    next: u64,
}

impl SequentialIds {
    pub fn starting_at(next: u64) -> Self {
        Self { next }
    }
}

impl IdGenerator for SequentialIds {
    fn token(&mut self) -> String {
        self.next += 1;
        format!("{:08x}", self.next)
    }
}

/// An identifier minted during a resolution or backfill pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedId {
    pub id: String,
    /// `placeholder`, or the singular kind of the item (`callout`, `annotation`).
    pub kind: String,
    pub label: Option<String>,
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// `note-2` → `note`; names that are all suffix are kept whole.
fn placeholder_base(name: &str) -> &str {
    match name.rsplit_once('-') {
        Some((base, digits))
            if !base.is_empty() && !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) =>
        {
            base
        }
        _ => name,
    }
}

/// Replace every `[uuid-<name>]` in `text`. Repeated names share one value.
pub fn resolve_placeholders<G: IdGenerator + ?Sized>(
    text: &str,
    generator: &mut G,
) -> (String, Vec<GeneratedId>) {
    let mut out = String::with_capacity(text.len());
    let mut assigned: HashMap<String, String> = HashMap::new();
    let mut used: HashSet<String> = HashSet::new();
    let mut generated = Vec::new();
    let mut rest = text;

    while let Some(pos) = rest.find(PLACEHOLDER_OPEN) {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + PLACEHOLDER_OPEN.len()..];
        let name_len = after.find(|c: char| !is_name_char(c)).unwrap_or(after.len());
        let name = &after[..name_len];

        if name.is_empty() || !after[name_len..].starts_with(']') {
            out.push_str(PLACEHOLDER_OPEN);
            rest = after;
            continue;
        }

        let value = match assigned.get(name) {
            Some(existing) => existing.clone(),
            None => {
                let base = placeholder_base(name);
                let mut candidate = format!("{}-{base}-{}", generator.token(), generator.token());
                for _ in 0..TOKEN_RETRIES {
                    if !used.contains(&candidate) {
                        break;
                    }
                    candidate = format!("{}-{base}-{}", generator.token(), generator.token());
                }
                used.insert(candidate.clone());
                assigned.insert(name.to_string(), candidate.clone());
                generated.push(GeneratedId {
                    id: candidate.clone(),
                    kind: "placeholder".to_string(),
                    label: Some(name.to_string()),
                });
                candidate
            }
        };
        out.push_str(&value);
        rest = &after[name_len + 1..];
    }
    out.push_str(rest);

    if !generated.is_empty() {
        log::debug!("resolved {} placeholder name(s)", generated.len());
    }
    (out, generated)
}

fn needs_id(object: &Map<String, Value>, field: &str) -> bool {
    match object.get(field) {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

fn label_of(object: &Map<String, Value>) -> Option<String> {
    ["title", "text", "name"]
        .iter()
        .find_map(|k| object.get(*k).and_then(Value::as_str))
        .map(str::to_string)
}

fn assign<G: IdGenerator + ?Sized>(
    object: &mut Map<String, Value>,
    field: &str,
    prefix: &str,
    generator: &mut G,
) -> GeneratedId {
    let id = format!("{prefix}_{}", generator.token());
    object.insert(field.to_string(), Value::String(id.clone()));
    GeneratedId {
        id,
        kind: prefix.to_string(),
        label: label_of(object),
    }
}

/// Give every object addressed by `kind`'s id paths an identifier if it lacks
/// one. Existing identifiers are never touched.
pub fn fill_ids<G: IdGenerator + ?Sized>(
    kind: BlockKind,
    value: &mut Value,
    generator: &mut G,
) -> Vec<GeneratedId> {
    let mut generated = Vec::new();
    for path in kind.id_paths() {
        let prefix = path.id_prefix(kind.language()).to_string();
        match &path {
            ParsedPath::Root { field } => {
                if let Some(object) = value.as_object_mut() {
                    if needs_id(object, field) {
                        generated.push(assign(object, field, &prefix, generator));
                    }
                }
            }
            ParsedPath::ArrayItem {
                array_field,
                item_field,
            } => {
                let Some(items) = value.get_mut(array_field).and_then(Value::as_array_mut) else {
                    continue;
                };
                for object in items.iter_mut().filter_map(Value::as_object_mut) {
                    if needs_id(object, item_field) {
                        generated.push(assign(object, item_field, &prefix, generator));
                    }
                }
            }
        }
    }
    generated
}

/// Run [`fill_ids`] over every registered block of `document`. Blocks whose
/// JSON does not parse are left alone.
pub fn fill_document_ids<G: IdGenerator + ?Sized>(
    document: &str,
    generator: &mut G,
) -> (String, Vec<GeneratedId>) {
    let (blocks, _) = parse_document_blocks(document, None);
    let mut pending = Vec::new();
    let mut generated = Vec::new();
    for mut parsed in blocks {
        let minted = fill_ids(parsed.kind, &mut parsed.value, generator);
        if !minted.is_empty() {
            generated.extend(minted);
            pending.push(parsed);
        }
    }

    let replacements = pending
        .iter()
        .map(|parsed| (&parsed.block, serialize_block_json(&parsed.value)));
    match replace_blocks(document, replacements) {
        Ok(out) => (out, generated),
        Err(err) => {
            log::warn!("could not write generated ids: {err}");
            (document.to_string(), Vec::new())
        }
    }
}

/// One-line summary for callers, or `None` when nothing was created.
pub fn summarize_generated(generated: &[GeneratedId]) -> Option<String> {
    if generated.is_empty() {
        return None;
    }
    let items: Vec<String> = generated
        .iter()
        .map(|g| match &g.label {
            Some(label) => format!("{} {label:?} ({})", g.kind, g.id),
            None => format!("{} ({})", g.kind, g.id),
        })
        .collect();
    let noun = if generated.len() == 1 { "item" } else { "items" };
    Some(format!(
        "Created {} new {noun}: {}",
        generated.len(),
        items.join(", ")
    ))
}
