//! `#[<id>]` markers for references to identifiers not yet defined anywhere
//! in the file set.
//!
//! A definition is any `"id": "<id>"` pair in any file. Markers are plain
//! text so they survive edits that never parse the surrounding JSON.

use std::collections::BTreeSet;

const MARKER_OPEN: &str = "#[";
const MARKER_CLOSE: char = ']';

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn is_id(text: &str) -> bool {
    !text.is_empty() && text.chars().all(is_id_char)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReference {
    pub id: String,
    /// Span of the whole marker, `#[` through `]`.
    pub start: usize,
    pub end: usize,
}

pub fn find_pending_references(content: &str) -> Vec<PendingReference> {
    let mut found = Vec::new();
    let mut cursor = 0;
    while let Some(rel) = content[cursor..].find(MARKER_OPEN) {
        let start = cursor + rel;
        let id_start = start + MARKER_OPEN.len();
        let id_len = content[id_start..]
            .find(|c: char| !is_id_char(c))
            .unwrap_or(content.len() - id_start);
        let id_end = id_start + id_len;
        if id_len > 0 && content[id_end..].starts_with(MARKER_CLOSE) {
            found.push(PendingReference {
                id: content[id_start..id_end].to_string(),
                start,
                end: id_end + 1,
            });
            cursor = id_end + 1;
        } else {
            cursor = id_start;
        }
    }
    found
}

/// Byte spans of the string values of `"<field>": "<value>"` pairs.
fn string_values<'a>(content: &'a str, field: &'a str) -> impl Iterator<Item = (usize, usize)> + 'a {
    let key = format!("\"{field}\"");
    let mut cursor = 0;
    std::iter::from_fn(move || loop {
        let rel = content[cursor..].find(&key)?;
        let after_key = cursor + rel + key.len();
        cursor = after_key;

        let rest = &content[after_key..];
        let trimmed = rest.trim_start();
        let Some(after_colon) = trimmed.strip_prefix(':') else {
            continue;
        };
        let value = after_colon.trim_start();
        let Some(body) = value.strip_prefix('"') else {
            continue;
        };
        let Some(len) = body.find('"') else {
            continue;
        };
        let start = content.len() - body.len();
        cursor = start + len + 1;
        return Some((start, start + len));
    })
}

/// Every identifier defined by an `"id": "<id>"` pair in `files`.
pub fn collect_defined_ids<'a, I>(files: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    files
        .into_iter()
        .flat_map(|content| string_values(content, "id").map(move |(s, e)| content[s..e].to_string()))
        .filter(|id| is_id(id))
        .collect()
}

/// Strip markers whose identifier is now defined. Returns the new content
/// and the identifiers that were resolved.
pub fn resolve_pending_references(content: &str, defined: &BTreeSet<String>) -> (String, Vec<String>) {
    let mut out = String::with_capacity(content.len());
    let mut resolved = Vec::new();
    let mut cursor = 0;
    for marker in find_pending_references(content) {
        if !defined.contains(&marker.id) {
            continue;
        }
        out.push_str(&content[cursor..marker.start]);
        out.push_str(&marker.id);
        cursor = marker.end;
        resolved.push(marker.id);
    }
    out.push_str(&content[cursor..]);
    if !resolved.is_empty() {
        log::debug!("resolved {} pending reference(s)", resolved.len());
    }
    (out, resolved)
}

/// Wrap undefined identifiers in the string values of `fields` as pending.
pub fn mark_pending_references(content: &str, fields: &[&str], defined: &BTreeSet<String>) -> String {
    let mut spans: Vec<(usize, usize)> = fields
        .iter()
        .flat_map(|field| string_values(content, field))
        .filter(|&(s, e)| is_id(&content[s..e]) && !defined.contains(&content[s..e]))
        .collect();
    spans.sort_unstable();
    spans.dedup();

    let mut out = String::with_capacity(content.len());
    let mut cursor = 0;
    for (start, end) in spans {
        out.push_str(&content[cursor..start]);
        out.push_str(MARKER_OPEN);
        out.push_str(&content[start..end]);
        out.push(MARKER_CLOSE);
        cursor = end;
    }
    out.push_str(&content[cursor..]);
    out
}
