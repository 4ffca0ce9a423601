//! Fenced block extraction and in-place replacement.
//!
//! A block opens with three backticks at the start of a line, immediately
//! followed by a non-whitespace language tag, optional horizontal whitespace
//! and a `\n` or `\r\n` line ending. It closes at the next line that starts
//! with three backticks. Fences without a language tag are skipped whole so
//! their bodies are never mistaken for blocks.

use crate::blocks::errors::BlockError;
use crate::edit::Edit;

const FENCE: &str = "```";

/// A fenced block and its byte span in the parent document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub language: String,
    /// Body with leading and trailing whitespace trimmed.
    pub content: String,
    /// Offset of the opening fence.
    pub start: usize,
    /// Offset just past the closing fence.
    pub end: usize,
}

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    start: usize,
    /// Offset just past the line terminator (or end of input).
    next: usize,
    text: &'a str,
    terminated: bool,
}

fn lines_with_offsets(text: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut start = 0;
    while start < text.len() {
        let (text_end, next, terminated) = match text[start..].find('\n') {
            Some(rel) => (start + rel, start + rel + 1, true),
            None => (text.len(), text.len(), false),
        };
        lines.push(Line {
            start,
            next,
            text: &text[start..text_end],
            terminated,
        });
        start = next;
    }
    lines
}

/// Language tag of an opening fence, `Some("")` for an untagged fence, or
/// `None` when the line is not an opening fence at all.
fn opening_tag<'a>(line: &Line<'a>) -> Option<&'a str> {
    let rest = line.text.strip_prefix(FENCE)?;
    let rest = rest.strip_suffix('\r').unwrap_or(rest);
    if rest.starts_with('`') {
        return None;
    }
    let tag_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let (tag, trailing) = rest.split_at(tag_end);
    if !trailing.chars().all(|c| c == ' ' || c == '\t') {
        return None;
    }
    // A tagged fence must be terminated by a line ending.
    if !tag.is_empty() && !line.terminated {
        return None;
    }
    Some(tag)
}

fn is_closing(line: &Line<'_>) -> bool {
    line.text
        .strip_prefix(FENCE)
        .is_some_and(|rest| rest.trim().is_empty())
}

pub fn parse_code_blocks(markdown: &str) -> Vec<CodeBlock> {
    let lines = lines_with_offsets(markdown);
    let mut blocks = Vec::new();
    let mut idx = 0;

    while idx < lines.len() {
        let Some(tag) = opening_tag(&lines[idx]) else {
            idx += 1;
            continue;
        };
        let Some(close) = (idx + 1..lines.len()).find(|&j| is_closing(&lines[j])) else {
            idx += 1;
            continue;
        };

        if !tag.is_empty() {
            let body_start = lines[idx].next;
            let body_end = lines[close].start;
            blocks.push(CodeBlock {
                language: tag.to_string(),
                content: markdown[body_start..body_end].trim().to_string(),
                start: lines[idx].start,
                end: lines[close].start + FENCE.len(),
            });
        }
        idx = close + 1;
    }

    blocks
}

pub fn find_blocks_by_language<'a>(blocks: &'a [CodeBlock], language: &str) -> Vec<&'a CodeBlock> {
    blocks.iter().filter(|b| b.language == language).collect()
}

/// First block of `language`, if any.
pub fn find_singleton_block<'a>(blocks: &'a [CodeBlock], language: &str) -> Option<&'a CodeBlock> {
    blocks.iter().find(|b| b.language == language)
}

pub fn format_block(language: &str, content: &str) -> String {
    format!("{FENCE}{language}\n{}\n{FENCE}", content.trim())
}

/// The edit that swaps `block`'s fence for one holding `content`.
pub fn block_edit(markdown: &str, block: &CodeBlock, content: &str) -> Edit {
    let current = markdown.get(block.start..block.end).unwrap_or_default();
    Edit::new(
        block.start,
        block.end,
        format_block(&block.language, content),
        current,
    )
}

/// Splice new content into `block`'s span of `markdown`.
pub fn replace_block(markdown: &str, block: &CodeBlock, content: &str) -> Result<String, BlockError> {
    Ok(block_edit(markdown, block, content).apply_to(markdown)?)
}

/// Rewrite several blocks in one pass. Blocks must come from parsing
/// `markdown` itself, so their spans do not overlap.
pub fn replace_blocks<'a, I>(markdown: &str, replacements: I) -> Result<String, BlockError>
where
    I: IntoIterator<Item = (&'a CodeBlock, String)>,
{
    let edits = replacements
        .into_iter()
        .map(|(block, content)| block_edit(markdown, block, &content))
        .collect();
    Ok(Edit::apply_batch(markdown, edits)?)
}

/// Replace the singleton block of `language`, creating it at the end of the
/// document when absent.
pub fn replace_singleton_block(
    markdown: &str,
    language: &str,
    content: &str,
) -> Result<String, BlockError> {
    let blocks = parse_code_blocks(markdown);
    if let Some(block) = find_singleton_block(&blocks, language) {
        return replace_block(markdown, block, content);
    }
    Ok(append_block(markdown, language, content))
}

/// Append a freshly formatted block after the trimmed document.
pub fn append_block(markdown: &str, language: &str, content: &str) -> String {
    let trimmed = markdown.trim_end();
    let block = format_block(language, content);
    if trimmed.is_empty() {
        format!("{block}\n")
    } else {
        format!("{trimmed}\n\n{block}\n")
    }
}

/// Document text with every fenced block removed.
pub fn document_prose(markdown: &str) -> String {
    let mut prose = String::with_capacity(markdown.len());
    let mut cursor = 0;
    for block in parse_code_blocks(markdown) {
        prose.push_str(&markdown[cursor..block.start]);
        cursor = block.end;
    }
    prose.push_str(&markdown[cursor..]);
    prose
}

/// Serialize a block body the way blocks are written back into documents.
pub fn serialize_block_json(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "Intro text.\n\n```attributes\n{\"tags\": [\"a\"]}\n```\n\nMiddle.\n\n```callout  \r\n{\"id\": \"c1\", \"title\": \"Note\"}\r\n```\n";

    #[test]
    fn parses_tagged_blocks_with_offsets() {
        let blocks = parse_code_blocks(DOC);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].language, "attributes");
        assert_eq!(blocks[0].content, "{\"tags\": [\"a\"]}");
        assert_eq!(&DOC[blocks[0].start..blocks[0].end], "```attributes\n{\"tags\": [\"a\"]}\n```");
        assert_eq!(blocks[1].language, "callout");
        assert_eq!(blocks[1].content, "{\"id\": \"c1\", \"title\": \"Note\"}");
    }

    #[test]
    fn untagged_fences_hide_their_bodies() {
        let doc = "```\n```attributes\n{}\n```\n";
        assert!(parse_code_blocks(doc).is_empty());
    }

    #[test]
    fn unterminated_block_is_ignored() {
        assert!(parse_code_blocks("```attributes\n{}\n").is_empty());
    }

    #[test]
    fn language_filters() {
        let blocks = parse_code_blocks(DOC);
        assert_eq!(find_blocks_by_language(&blocks, "callout").len(), 1);
        assert!(find_singleton_block(&blocks, "missing").is_none());
    }

    #[test]
    fn replace_singleton_in_place() {
        let out = replace_singleton_block(DOC, "attributes", "{\"tags\": []}").unwrap();
        assert!(out.starts_with("Intro text.\n\n```attributes\n{\"tags\": []}\n```\n\nMiddle."));
    }

    #[test]
    fn replace_singleton_creates_missing_block() {
        let out = replace_singleton_block("Just prose.\n\n", "attributes", "{}").unwrap();
        assert_eq!(out, "Just prose.\n\n```attributes\n{}\n```\n");
    }

    #[test]
    fn replace_several_blocks_at_once() {
        let blocks = parse_code_blocks(DOC);
        let out = replace_blocks(
            DOC,
            [
                (&blocks[0], "{}".to_string()),
                (&blocks[1], "{\"id\": \"c1\", \"title\": \"New\"}".to_string()),
            ],
        )
        .unwrap();
        assert_eq!(
            out,
            "Intro text.\n\n```attributes\n{}\n```\n\nMiddle.\n\n```callout\n{\"id\": \"c1\", \"title\": \"New\"}\n```\n"
        );

        let overlapping = replace_blocks(DOC, [(&blocks[0], "{}".to_string()), (&blocks[0], "[]".to_string())]);
        assert!(matches!(overlapping, Err(BlockError::Edit(_))));
    }

    #[test]
    fn prose_excludes_blocks() {
        let prose = document_prose(DOC);
        assert!(prose.contains("Intro text."));
        assert!(prose.contains("Middle."));
        assert!(!prose.contains("tags"));
    }
}
