//! Sequential application of parsed hunks to document content.
//!
//! Each hunk is located by literal substring search of its old text. The
//! first occurrence wins, so documents with repeated text are patched at the
//! earliest copy; callers that need a specific copy must include enough
//! context to make the old text unique.

use crate::patch::errors::PatchError;
use crate::patch::parser::{parse_patch, FileAction, Hunk, ParsedPatch};

const PREVIEW_CHARS: usize = 50;

/// Result of a successful patch application.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "PatchApplication carries the patched content"]
pub struct PatchApplication {
    pub content: String,
    pub hunks_applied: usize,
}

impl PatchApplication {
    pub fn changed(&self, original: &str) -> bool {
        self.content != original
    }
}

/// Parse `patch_text` (either dialect) and apply every hunk to `content`.
pub fn apply_patch(content: &str, patch_text: &str) -> Result<PatchApplication, PatchError> {
    let parsed = parse_patch(patch_text)?;
    apply_parsed(content, &parsed, None)
}

/// Like [`apply_patch`], but only sections of a headered patch that name
/// `path` (or name no file at all) are applied.
pub fn apply_patch_to_file(
    path: &str,
    content: &str,
    patch_text: &str,
) -> Result<PatchApplication, PatchError> {
    let parsed = parse_patch(patch_text)?;
    apply_parsed(content, &parsed, Some(path))
}

pub fn apply_parsed(
    content: &str,
    parsed: &ParsedPatch,
    only_path: Option<&str>,
) -> Result<PatchApplication, PatchError> {
    let sections: Vec<_> = parsed
        .files
        .iter()
        .filter(|f| match (only_path, f.path.as_deref()) {
            (Some(wanted), Some(path)) => wanted == path,
            _ => true,
        })
        .collect();

    let has_delete = sections.iter().any(|f| f.action == FileAction::Delete);
    if !has_delete && sections.iter().all(|f| f.hunks.is_empty()) {
        return Err(PatchError::Empty);
    }

    let mut current = content.to_string();
    let mut hunks_applied = 0;
    for section in sections {
        if section.action == FileAction::Delete {
            log::debug!("deleting {}", section.path.as_deref().unwrap_or("<target>"));
            current.clear();
            continue;
        }
        current = apply_hunks_from(&current, &section.hunks, hunks_applied)?;
        hunks_applied += section.hunks.len();
    }

    Ok(PatchApplication {
        content: current,
        hunks_applied,
    })
}

/// Apply hunks in order, stopping at the first one whose old text is absent.
pub fn apply_hunks(content: &str, hunks: &[Hunk]) -> Result<String, PatchError> {
    apply_hunks_from(content, hunks, 0)
}

fn apply_hunks_from(content: &str, hunks: &[Hunk], first_index: usize) -> Result<String, PatchError> {
    let mut current = content.to_string();
    for (offset, hunk) in hunks.iter().enumerate() {
        current = apply_hunk(&current, hunk).map_err(|err| match err {
            PatchError::TextNotFound { preview, .. } => PatchError::TextNotFound {
                hunk: first_index + offset,
                preview,
            },
            other => other,
        })?;
    }
    Ok(current)
}

/// Apply one hunk.
///
/// The old text's trailing newline is ignored while searching. When the
/// located text is followed by a newline and the hunk's old text carried one,
/// that newline is replaced along with it. Old text without a newline that
/// ends the document is replaced by the new text exactly. Otherwise the new
/// text's trailing newline is dropped so line structure is preserved.
pub fn apply_hunk(content: &str, hunk: &Hunk) -> Result<String, PatchError> {
    let (old, old_had_newline) = strip_newline(&hunk.old_text);

    if old.is_empty() {
        let mut out = content.to_string();
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&hunk.new_text);
        return Ok(out);
    }

    let Some(pos) = content.find(old) else {
        return Err(PatchError::TextNotFound {
            hunk: 0,
            preview: preview(old),
        });
    };

    let after = pos + old.len();
    let (end, replacement) = if old_had_newline && content[after..].starts_with('\n') {
        (after + 1, hunk.new_text.as_str())
    } else if !old_had_newline && after == content.len() {
        (after, hunk.new_text.as_str())
    } else {
        (after, strip_newline(&hunk.new_text).0)
    };

    let mut out = String::with_capacity(content.len() + replacement.len());
    out.push_str(&content[..pos]);
    out.push_str(replacement);
    out.push_str(&content[end..]);
    Ok(out)
}

fn strip_newline(text: &str) -> (&str, bool) {
    match text.strip_suffix('\n') {
        Some(stripped) => (stripped, true),
        None => (text, false),
    }
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_first_occurrence() {
        let out = apply_patch("a\nb\na\n", "-a\n+z\n").unwrap();
        assert_eq!(out.content, "z\nb\na\n");
        assert_eq!(out.hunks_applied, 1);
    }

    #[test]
    fn context_lines_select_location() {
        let out = apply_patch("a\nb\na\nc\n", " a\n-c\n+d\n").unwrap();
        assert_eq!(out.content, "a\nb\na\nd\n");
    }

    #[test]
    fn appends_when_old_text_empty() {
        let out = apply_patch("first line", "+second line\n").unwrap();
        assert_eq!(out.content, "first line\nsecond line\n");
    }

    #[test]
    fn deletes_whole_lines() {
        let out = apply_patch("keep\ndrop\nkeep2\n", "-drop\n").unwrap();
        assert_eq!(out.content, "keep\nkeep2\n");
    }

    #[test]
    fn unterminated_old_text_at_end_is_replaced_exactly() {
        let out = apply_patch("x\na", "-a\n\\ No newline at end of file\n+a\n").unwrap();
        assert_eq!(out.content, "x\na\n");
        let out = apply_patch("x\na\n", " x\n-a\n+a\n\\ No newline at end of file\n").unwrap();
        assert_eq!(out.content, "x\na");
    }

    #[test]
    fn missing_text_reports_truncated_preview() {
        let long = "x".repeat(80);
        let err = apply_patch("content", &format!("-{long}\n+y\n")).unwrap_err();
        match err {
            PatchError::TextNotFound { preview, .. } => {
                assert_eq!(preview, format!("{}...", "x".repeat(50)));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn stops_at_first_failing_hunk() {
        let patch = "*** Begin Patch\n*** Update File: doc.md\n@@@ one @@@\n-missing\n+x\n@@@ two @@@\n-a\n+b\n*** End Patch\n";
        let err = apply_patch("a\n", patch).unwrap_err();
        assert!(matches!(err, PatchError::TextNotFound { hunk: 0, .. }));
    }

    #[test]
    fn hunks_apply_in_order() {
        let patch = "*** Begin Patch\n*** Update File: doc.md\n@@@ one @@@\n-a\n+b\n@@@ two @@@\n-b\n+c\n*** End Patch\n";
        let out = apply_patch("a\n", patch).unwrap();
        assert_eq!(out.content, "c\n");
        assert_eq!(out.hunks_applied, 2);
    }

    #[test]
    fn filters_sections_by_path() {
        let patch = "*** Begin Patch\n*** Update File: a.md\n-x\n+y\n*** Update File: b.md\n-x\n+z\n*** End Patch\n";
        let out = apply_patch_to_file("b.md", "x\n", patch).unwrap();
        assert_eq!(out.content, "z\n");
    }

    #[test]
    fn delete_file_empties_content() {
        let out = apply_patch("gone\n", "*** Begin Patch\n*** Delete File: a.md\n*** End Patch\n").unwrap();
        assert_eq!(out.content, "");
    }

    #[test]
    fn add_file_creates_content() {
        let out = apply_patch("", "*** Begin Patch\n*** Add File: a.md\n+# Title\n+body\n*** End Patch\n").unwrap();
        assert_eq!(out.content, "# Title\nbody\n");
    }

    #[test]
    fn empty_patch_is_error() {
        assert!(matches!(apply_patch("x", "no diff here"), Err(PatchError::Empty)));
    }
}
