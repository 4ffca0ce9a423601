//! Line-range matching with exact-then-fuzzy fallback.
//!
//! Used by the range-ref resolver to locate anchors and by the annotation
//! pipeline to locate quoted prose. Exact matches always win: fuzzy scoring
//! only runs when no window matches exactly, and the two kinds never share a
//! result set.

use strsim::normalized_levenshtein;

/// Minimum per-line similarity for a fuzzy anchor match.
pub const RANGE_MATCH_THRESHOLD: f64 = 0.90;

/// Minimum similarity for locating an annotation quote in document prose.
///
/// Tuned separately from [`RANGE_MATCH_THRESHOLD`]; the two are not meant to
/// be unified.
pub const ANNOTATION_MATCH_THRESHOLD: f64 = 0.85;

/// Lines of context shown around each candidate in ambiguity previews.
pub const PREVIEW_CONTEXT_LINES: usize = 3;

/// An inclusive, zero-based line range inside a line-split text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub start: usize,
    pub end: usize,
    /// True when accepted by similarity scoring rather than equality.
    pub fuzzy: bool,
}

impl Match {
    pub fn exact(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            fuzzy: false,
        }
    }

    pub fn line_count(&self) -> usize {
        self.end - self.start + 1
    }

    /// Shift both ends by `offset` lines (used to translate suffix-relative
    /// matches back into absolute coordinates).
    pub fn offset(self, offset: usize) -> Self {
        Self {
            start: self.start + offset,
            end: self.end + offset,
            fuzzy: self.fuzzy,
        }
    }
}

/// Split text into lines, tolerating `\r\n` endings.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.lines().collect()
}

/// Find every location of `needle` in `content` using the general-purpose
/// fuzzy threshold.
pub fn find_matches(content: &str, needle: &str) -> Vec<Match> {
    find_matches_with(content, needle, RANGE_MATCH_THRESHOLD)
}

/// Find every location of `needle` in `content`.
///
/// Returns all exact hits in document order. If there are none, returns the
/// fuzzy windows whose every line scores at least `threshold`, sorted by
/// descending mean score.
pub fn find_matches_with(content: &str, needle: &str, threshold: f64) -> Vec<Match> {
    let haystack = split_lines(content);
    let needle = split_lines(needle);
    find_line_matches(&haystack, &needle, threshold)
}

/// Line-slice form of [`find_matches_with`].
pub fn find_line_matches(haystack: &[&str], needle: &[&str], threshold: f64) -> Vec<Match> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return Vec::new();
    }

    let window = needle.len();
    let exact: Vec<Match> = haystack
        .windows(window)
        .enumerate()
        .filter(|(_, lines)| *lines == needle)
        .map(|(start, _)| Match::exact(start, start + window - 1))
        .collect();

    if !exact.is_empty() {
        return exact;
    }

    let mut scored: Vec<(f64, Match)> = haystack
        .windows(window)
        .enumerate()
        .filter_map(|(start, lines)| {
            let score = block_score(lines, needle, threshold)?;
            Some((
                score,
                Match {
                    start,
                    end: start + window - 1,
                    fuzzy: true,
                },
            ))
        })
        .collect();

    // Stable sort keeps document order between equal scores.
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    log::trace!("fuzzy match produced {} candidate windows", scored.len());
    scored.into_iter().map(|(_, m)| m).collect()
}

/// Mean line similarity of a window, or `None` when any line falls below
/// `threshold`.
fn block_score(window: &[&str], needle: &[&str], threshold: f64) -> Option<f64> {
    let mut total = 0.0;
    for (candidate, wanted) in window.iter().zip(needle) {
        let score = line_similarity(candidate, wanted);
        if score < threshold {
            return None;
        }
        total += score;
    }
    let mean = total / needle.len() as f64;
    (mean >= threshold).then_some(mean)
}

/// Normalized edit-distance similarity in `[0, 1]`.
pub fn line_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    normalized_levenshtein(a, b)
}

/// Grow a match by `n` lines on both sides, clamped to the document.
pub fn expand_match(m: Match, n: usize, total_lines: usize) -> Match {
    let last = total_lines.saturating_sub(1);
    Match {
        start: m.start.saturating_sub(n).min(last),
        end: m.end.saturating_add(n).min(last),
        fuzzy: m.fuzzy,
    }
}

/// Render a line-numbered excerpt of `lines` around `m`, marking the matched
/// lines with `>`.
pub fn render_preview(lines: &[&str], m: Match, context: usize) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let shown = expand_match(m, context, lines.len());
    let width = (shown.end + 1).to_string().len();
    let mut out = String::new();
    for idx in shown.start..=shown.end {
        let marker = if idx >= m.start && idx <= m.end { '>' } else { ' ' };
        out.push_str(&format!(
            "{marker} {:>width$} | {}\n",
            idx + 1,
            lines[idx],
            width = width
        ));
    }
    out
}

/// A byte span inside prose located for an annotation quote.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
    pub score: f64,
}

/// Locate `needle` inside `haystack` for annotation resolution.
///
/// Case-insensitive containment is tried first. Otherwise every run of
/// whitespace-separated words with the same word count as the needle (plus or
/// minus one) is scored, and the best window at or above `threshold` wins.
pub fn find_fuzzy_span(haystack: &str, needle: &str, threshold: f64) -> Option<TextSpan> {
    let needle = needle.trim();
    if needle.is_empty() {
        return None;
    }

    let (lower_hay, origin) = lowercase_with_origins(haystack);
    let lower_needle = needle.to_lowercase();
    if let Some(pos) = lower_hay.find(&lower_needle) {
        let last = origin[pos + lower_needle.len() - 1];
        let last_len = haystack[last..].chars().next().map_or(0, char::len_utf8);
        return Some(TextSpan {
            start: origin[pos],
            end: last + last_len,
            score: 1.0,
        });
    }

    let words = word_spans(haystack);
    let wanted = needle.split_whitespace().count();
    if words.is_empty() || wanted == 0 {
        return None;
    }

    let mut best: Option<TextSpan> = None;
    let min_len = wanted.saturating_sub(1).max(1);
    let max_len = wanted + 1;
    for len in min_len..=max_len {
        if len > words.len() {
            break;
        }
        for window in words.windows(len) {
            let start = window[0].0;
            let end = window[len - 1].1;
            let candidate = &haystack[start..end];
            let score = normalized_levenshtein(&candidate.to_lowercase(), &lower_needle);
            if score < threshold {
                continue;
            }
            let better = best.as_ref().map_or(true, |b| score > b.score);
            if better {
                best = Some(TextSpan { start, end, score });
            }
        }
    }
    best
}

/// Lowercase `text` and record, for every byte of the result, the offset of
/// the source char it came from. Lowercasing can change byte lengths.
fn lowercase_with_origins(text: &str) -> (String, Vec<usize>) {
    let mut lower = String::with_capacity(text.len());
    let mut origin = Vec::with_capacity(text.len());
    for (idx, ch) in text.char_indices() {
        for lc in ch.to_lowercase() {
            lower.push(lc);
            origin.resize(lower.len(), idx);
        }
    }
    (lower, origin)
}

fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (idx, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some(s) = start.take() {
                spans.push((s, idx));
            }
        } else if start.is_none() {
            start = Some(idx);
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_matches_in_document_order() {
        let content = "a\nb\nc\na\nb\n";
        let matches = find_matches(content, "a\nb");
        assert_eq!(matches, vec![Match::exact(0, 1), Match::exact(3, 4)]);
    }

    #[test]
    fn empty_or_oversized_needle_matches_nothing() {
        assert!(find_matches("a\nb", "").is_empty());
        assert!(find_matches("a", "a\nb").is_empty());
    }

    #[test]
    fn exact_match_suppresses_fuzzy() {
        let content = "let value = compute();\nlet value = compute()\n";
        let matches = find_matches(content, "let value = compute();");
        assert_eq!(matches.len(), 1);
        assert!(!matches[0].fuzzy);
    }

    #[test]
    fn fuzzy_match_when_no_exact() {
        let content = "fn main() {\n    println!(\"hello world\");\n}\n";
        let matches = find_matches(content, "    println!(\"hello world!\");");
        assert_eq!(matches.len(), 1);
        assert!(matches[0].fuzzy);
        assert_eq!(matches[0].start, 1);
    }

    #[test]
    fn one_weak_line_zeroes_the_window() {
        let content = "alpha beta gamma\ncompletely different\n";
        let matches = find_matches(content, "alpha beta gamma\nsomething else entirely");
        assert!(matches.is_empty());
    }

    #[test]
    fn fuzzy_results_sorted_by_score() {
        let content = "the quick brown fox\nthe quick brown fax\n";
        let matches = find_matches_with(content, "the quick brown fix", 0.8);
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(|m| m.fuzzy));
    }

    #[test]
    fn expand_clamps_to_bounds() {
        let m = Match::exact(1, 2);
        assert_eq!(expand_match(m, 5, 4), Match::exact(0, 3));
        assert_eq!(expand_match(m, 0, 4), m);
    }

    #[test]
    fn preview_marks_matched_lines() {
        let lines = vec!["one", "two", "three"];
        let preview = render_preview(&lines, Match::exact(1, 1), 1);
        assert!(preview.contains("> 2 | two"));
        assert!(preview.contains("  1 | one"));
    }

    #[test]
    fn fuzzy_span_prefers_case_insensitive_containment() {
        let span = find_fuzzy_span("CATS are great.", "cats", ANNOTATION_MATCH_THRESHOLD).unwrap();
        assert_eq!((span.start, span.end), (0, 4));
    }

    #[test]
    fn fuzzy_span_maps_back_through_case_folding() {
        // "İ" grows and "ẞ" shrinks when lowercased, so the total length is unchanged.
        let prose = "İ café ẞ";
        let span = find_fuzzy_span(prose, "CAF", ANNOTATION_MATCH_THRESHOLD).unwrap();
        assert_eq!(&prose[span.start..span.end], "caf");
        let span = find_fuzzy_span(prose, "café", ANNOTATION_MATCH_THRESHOLD).unwrap();
        assert_eq!(&prose[span.start..span.end], "café");
        let span = find_fuzzy_span("İstanbul", "i", ANNOTATION_MATCH_THRESHOLD).unwrap();
        assert_eq!((span.start, span.end), (0, 2));
    }

    #[test]
    fn fuzzy_span_tolerates_typos() {
        let prose = "The committee approved the annual budget yesterday.";
        let span = find_fuzzy_span(prose, "approved the anual budget", ANNOTATION_MATCH_THRESHOLD)
            .unwrap();
        assert_eq!(&prose[span.start..span.end], "approved the annual budget");
    }

    #[test]
    fn fuzzy_span_rejects_unrelated_text() {
        assert!(find_fuzzy_span("No animals here.", "giraffes", ANNOTATION_MATCH_THRESHOLD).is_none());
    }
}
