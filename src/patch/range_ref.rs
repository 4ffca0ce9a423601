//! Expansion of compact range references into literal diff lines.
//!
//! A reference looks like:
//!
//! ```text
//! -<< notes.md
//! -  ## Decisions
//! -  ...
//! -  Next steps are tracked elsewhere.
//! ```
//!
//! The header names an optional file (defaulting to the patch target), the
//! body carries a start anchor, a literal `...` separator and an end anchor.
//! The whole inclusive line range between the anchors is re-emitted with the
//! header's diff prefix, so the applier sees an ordinary literal hunk.

use crate::matcher::{
    find_line_matches, render_preview, split_lines, Match, PREVIEW_CONTEXT_LINES,
    RANGE_MATCH_THRESHOLD,
};
use crate::patch::errors::RangeRefError;
use std::collections::{BTreeMap, HashMap};

/// Indentation that marks a line as belonging to a reference body.
const BODY_INDENT: &str = "  ";
const SEPARATOR: &str = "...";

/// Source of file contents for cross-file references.
pub trait FileReader {
    fn read_file(&self, path: &str) -> Option<String>;
}

impl FileReader for HashMap<String, String> {
    fn read_file(&self, path: &str) -> Option<String> {
        self.get(path).cloned()
    }
}

impl FileReader for BTreeMap<String, String> {
    fn read_file(&self, path: &str) -> Option<String> {
        self.get(path).cloned()
    }
}

impl<T: FileReader + ?Sized> FileReader for &T {
    fn read_file(&self, path: &str) -> Option<String> {
        (**self).read_file(path)
    }
}

/// Adapter turning a closure into a [`FileReader`].
pub struct FnReader<F>(pub F);

impl<F> FileReader for FnReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn read_file(&self, path: &str) -> Option<String> {
        (self.0)(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header<'a> {
    prefix: char,
    file: Option<&'a str>,
}

fn parse_header(line: &str) -> Option<Header<'_>> {
    let mut chars = line.chars();
    let prefix = chars.next()?;
    if prefix != '+' && prefix != '-' {
        return None;
    }
    let rest = line[1..].strip_prefix("<<")?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let file = rest.trim();
    let file = file
        .strip_prefix('[')
        .and_then(|f| f.strip_suffix(']'))
        .unwrap_or(file)
        .trim();
    Some(Header {
        prefix,
        file: (!file.is_empty()).then_some(file),
    })
}

/// Resolves range references against files supplied by a [`FileReader`].
#[derive(Debug, Clone, Copy)]
pub struct RangeRefResolver {
    pub threshold: f64,
    pub preview_context: usize,
}

impl Default for RangeRefResolver {
    fn default() -> Self {
        Self {
            threshold: RANGE_MATCH_THRESHOLD,
            preview_context: PREVIEW_CONTEXT_LINES,
        }
    }
}

/// Expand every range reference in `patch` using default matcher settings.
pub fn resolve_range_refs(
    patch: &str,
    default_file: &str,
    reader: &impl FileReader,
) -> Result<String, RangeRefError> {
    RangeRefResolver::default().resolve(patch, default_file, reader)
}

/// True when `patch` contains at least one reference header.
pub fn has_range_refs(patch: &str) -> bool {
    patch.lines().any(|line| parse_header(line).is_some())
}

impl RangeRefResolver {
    pub fn resolve(
        &self,
        patch: &str,
        default_file: &str,
        reader: &impl FileReader,
    ) -> Result<String, RangeRefError> {
        let lines: Vec<&str> = patch.lines().collect();
        let mut out: Vec<String> = Vec::with_capacity(lines.len());
        let mut idx = 0;

        while idx < lines.len() {
            let Some(header) = parse_header(lines[idx]) else {
                out.push(lines[idx].to_string());
                idx += 1;
                continue;
            };

            let body_prefix = format!("{}{}", header.prefix, BODY_INDENT);
            let mut body = Vec::new();
            let mut next = idx + 1;
            while next < lines.len() {
                match lines[next].strip_prefix(body_prefix.as_str()) {
                    Some(text) => body.push(text),
                    None => break,
                }
                next += 1;
            }

            let file = header.file.unwrap_or(default_file);
            log::debug!(
                "resolving range reference at line {} against {file} ({} body lines)",
                idx + 1,
                body.len()
            );
            let expanded = self.expand(&body, idx + 1, file, reader)?;
            out.extend(
                expanded
                    .into_iter()
                    .map(|line| format!("{}{line}", header.prefix)),
            );
            idx = next;
        }

        let mut joined = out.join("\n");
        if patch.ends_with('\n') && !joined.is_empty() {
            joined.push('\n');
        }
        Ok(joined)
    }

    fn expand(
        &self,
        body: &[&str],
        line: usize,
        file: &str,
        reader: &impl FileReader,
    ) -> Result<Vec<String>, RangeRefError> {
        let sep = body
            .iter()
            .position(|text| text.trim() == SEPARATOR)
            .ok_or(RangeRefError::MissingSeparator { line })?;
        if sep == 0 {
            return Err(RangeRefError::MissingStartAnchor { line });
        }
        if sep == body.len() - 1 {
            return Err(RangeRefError::MissingEndAnchor { line });
        }

        let content = reader
            .read_file(file)
            .ok_or_else(|| RangeRefError::FileNotFound {
                path: file.to_string(),
            })?;
        let file_lines = split_lines(&content);

        let start = self.locate(&file_lines, &body[..sep], 0).map_err(|found| match found {
            Located::None => RangeRefError::StartAnchorNotFound {
                path: file.to_string(),
            },
            Located::Many(previews) => RangeRefError::StartAnchorAmbiguous {
                path: file.to_string(),
                previews,
            },
        })?;

        let end = self
            .locate(&file_lines, &body[sep + 1..], start.start)
            .map_err(|found| match found {
                Located::None => RangeRefError::EndAnchorNotFound {
                    path: file.to_string(),
                    after: start.start + 1,
                },
                Located::Many(previews) => RangeRefError::EndAnchorAmbiguous {
                    path: file.to_string(),
                    previews,
                },
            })?;

        Ok(file_lines[start.start..=end.end]
            .iter()
            .map(|l| l.to_string())
            .collect())
    }

    /// Find exactly one match for `anchor` in `file_lines[from..]`, reporting
    /// the result in absolute coordinates.
    fn locate(&self, file_lines: &[&str], anchor: &[&str], from: usize) -> Result<Match, Located> {
        let matches: Vec<Match> = find_line_matches(&file_lines[from..], anchor, self.threshold)
            .into_iter()
            .map(|m| m.offset(from))
            .collect();

        match matches.as_slice() {
            [] => Err(Located::None),
            [only] => Ok(*only),
            many => Err(Located::Many(
                many.iter()
                    .map(|m| render_preview(file_lines, *m, self.preview_context))
                    .collect(),
            )),
        }
    }
}

enum Located {
    None,
    Many(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    const NOTES: &str = "# Meeting\nIntro line\n## Decisions\nWe ship Friday.\nBudget approved.\n## Next\nFollow up.\n";

    #[test]
    fn header_parsing() {
        assert_eq!(
            parse_header("-<< notes.md"),
            Some(Header {
                prefix: '-',
                file: Some("notes.md")
            })
        );
        assert_eq!(
            parse_header("+<< [other.md]"),
            Some(Header {
                prefix: '+',
                file: Some("other.md")
            })
        );
        assert_eq!(
            parse_header("+<<"),
            Some(Header {
                prefix: '+',
                file: None
            })
        );
        assert_eq!(parse_header(" << notes.md"), None);
        assert_eq!(parse_header("+<<<x"), None);
    }

    #[test]
    fn expands_reference_into_literal_lines() {
        let reader = files(&[("notes.md", NOTES)]);
        let patch = "-<< notes.md\n-  ## Decisions\n-  ...\n-  Budget approved.\n+## Decisions\n+Postponed.\n";
        let out = resolve_range_refs(patch, "notes.md", &reader).unwrap();
        assert_eq!(
            out,
            "-## Decisions\n-We ship Friday.\n-Budget approved.\n+## Decisions\n+Postponed.\n"
        );
    }

    #[test]
    fn several_references_between_context_lines() {
        let doc = "a\nb\nc\nd\ne\n";
        let reader = files(&[("doc.md", doc), ("other.md", "x\ny\nz\n")]);
        let patch = " a\n-<<\n-  b\n-  ...\n-  c\n d\n+<< other.md\n+  x\n+  ...\n+  z\n e\n";
        let expanded = resolve_range_refs(patch, "doc.md", &reader).unwrap();
        assert_eq!(expanded, " a\n-b\n-c\n d\n+x\n+y\n+z\n e\n");

        let applied = crate::patch::apply_patch(doc, &expanded).unwrap();
        assert_eq!(applied.content, "a\nd\nx\ny\nz\ne\n");
    }

    #[test]
    fn defaults_to_target_file() {
        let reader = files(&[("doc.md", NOTES)]);
        let patch = "-<<\n-  # Meeting\n-  ...\n-  Intro line";
        let out = resolve_range_refs(patch, "doc.md", &reader).unwrap();
        assert_eq!(out, "-# Meeting\n-Intro line");
    }

    #[test]
    fn missing_separator() {
        let reader = files(&[("doc.md", NOTES)]);
        let err = resolve_range_refs("-<<\n-  # Meeting\n-  Intro line", "doc.md", &reader)
            .unwrap_err();
        assert!(matches!(err, RangeRefError::MissingSeparator { .. }));
        assert!(err.to_string().contains("missing ... separator"));
    }

    #[test]
    fn missing_anchors() {
        let reader = files(&[("doc.md", NOTES)]);
        let err = resolve_range_refs("-<<\n-  ...\n-  Intro line", "doc.md", &reader).unwrap_err();
        assert!(err.to_string().contains("missing start anchor"));
        let err = resolve_range_refs("-<<\n-  Intro line\n-  ...", "doc.md", &reader).unwrap_err();
        assert!(err.to_string().contains("missing end anchor"));
    }

    #[test]
    fn file_not_found() {
        let reader = files(&[]);
        let err = resolve_range_refs("+<< gone.md\n+  a\n+  ...\n+  b", "doc.md", &reader)
            .unwrap_err();
        assert_eq!(err.to_string(), "file not found: gone.md");
    }

    #[test]
    fn end_anchor_searched_after_start() {
        let doc = "end\nstart\nmiddle\nend\n";
        let reader = files(&[("doc.md", doc)]);
        let out = resolve_range_refs("-<<\n-  start\n-  ...\n-  end", "doc.md", &reader).unwrap();
        assert_eq!(out, "-start\n-middle\n-end");
    }

    #[test]
    fn ambiguous_start_anchor() {
        let doc = "The team discussed the timeline.\nA decision was made to extend.\nThe team discussed the timeline.\nA decision was made to extend.\n";
        let reader = files(&[("doc.md", doc)]);
        let patch = "-<<\n-  The team discussed the timeline.\n-  ...\n-  A decision was made to extend.";
        let err = resolve_range_refs(patch, "doc.md", &reader).unwrap_err();
        match &err {
            RangeRefError::StartAnchorAmbiguous { previews, .. } => assert_eq!(previews.len(), 2),
            other => panic!("expected ambiguity, got {other:?}"),
        }
        assert!(err.to_string().contains("start anchor ambiguous"));
    }

    #[test]
    fn ambiguous_end_anchor_uses_absolute_lines() {
        let doc = "head\nstart\nx\nend\ny\nend\n";
        let reader = files(&[("doc.md", doc)]);
        let err = resolve_range_refs("-<<\n-  start\n-  ...\n-  end", "doc.md", &reader).unwrap_err();
        match err {
            RangeRefError::EndAnchorAmbiguous { previews, .. } => {
                assert!(previews[0].contains("> 4 | end"));
                assert!(previews[1].contains("> 6 | end"));
            }
            other => panic!("expected end ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn non_reference_lines_pass_through() {
        let reader = files(&[]);
        let patch = " context\n-old\n+new\n";
        assert_eq!(resolve_range_refs(patch, "doc.md", &reader).unwrap(), patch);
        assert!(!has_range_refs(patch));
    }

    #[test]
    fn closure_reader() {
        let reader = FnReader(|path: &str| (path == "a.md").then(|| "x\ny\nz".to_string()));
        let out = resolve_range_refs("+<< a.md\n+  x\n+  ...\n+  z", "doc.md", &reader).unwrap();
        assert_eq!(out, "+x\n+y\n+z");
    }
}
