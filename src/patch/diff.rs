//! Hunk generation from two document states.
//!
//! Produces the smallest raw-dialect hunk that, applied to the old state with
//! [`apply_patch`](crate::patch::apply_patch), yields the new state. Because
//! the applier patches the first literal occurrence, the changed region is
//! widened with context lines until its first occurrence is the intended one.
//! A line without a terminator is followed by [`NO_NEWLINE_MARKER`].

use crate::patch::applicator::apply_hunk;
use crate::patch::parser::{Hunk, NO_NEWLINE_MARKER};
use similar::{ChangeTag, DiffTag, TextDiff};

#[derive(Debug, Clone, Copy)]
struct Region {
    old_start: usize,
    old_end: usize,
    new_start: usize,
    new_end: usize,
}

/// Compute a hunk turning `old` into `new`, or `None` when they are equal.
pub fn hunk_between(old: &str, new: &str) -> Option<Hunk> {
    if old == new {
        return None;
    }

    let old_lines: Vec<&str> = old.split_inclusive('\n').collect();
    let new_lines: Vec<&str> = new.split_inclusive('\n').collect();
    let changed = changed_region(old, new)?;

    let mut before = 0;
    let mut after = 0;
    loop {
        let region = Region {
            old_start: changed.old_start - before,
            old_end: changed.old_end + after,
            new_start: changed.new_start - before,
            new_end: changed.new_end + after,
        };
        let hunk = Hunk::new(
            old_lines[region.old_start..region.old_end].concat(),
            new_lines[region.new_start..region.new_end].concat(),
        );

        let usable = !hunk.old_text.is_empty() || old.is_empty();
        if usable && apply_hunk(old, &hunk).is_ok_and(|out| out == new) {
            return Some(hunk);
        }

        let can_before = region.old_start > 0 && region.new_start > 0;
        let can_after = region.old_end < old_lines.len() && region.new_end < new_lines.len();
        if can_before && (before <= after || !can_after) {
            before += 1;
        } else if can_after {
            after += 1;
        } else {
            log::warn!("could not isolate a unique hunk; falling back to whole-document replacement");
            return Some(hunk);
        }
    }
}

/// Line bounds of everything between the first and last difference.
fn changed_region(old: &str, new: &str) -> Option<Region> {
    let diff = TextDiff::from_lines(old, new);
    let mut changes = diff
        .ops()
        .iter()
        .map(|op| op.as_tag_tuple())
        .filter(|(tag, _, _)| *tag != DiffTag::Equal);

    let (_, first_old, first_new) = changes.next()?;
    let (last_old, last_new) = changes
        .last()
        .map(|(_, o, n)| (o, n))
        .unwrap_or((first_old.clone(), first_new.clone()));

    Some(Region {
        old_start: first_old.start,
        old_end: last_old.end,
        new_start: first_new.start,
        new_end: last_new.end,
    })
}

/// Render the hunk between `old` and `new` in the raw diff dialect.
pub fn render_raw_diff(old: &str, new: &str) -> String {
    let Some(hunk) = hunk_between(old, new) else {
        return String::new();
    };

    let diff = TextDiff::from_lines(&hunk.old_text, &hunk.new_text);
    let mut out = String::new();
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => '-',
            ChangeTag::Insert => '+',
            ChangeTag::Equal => ' ',
        };
        let line = change.value();
        out.push(sign);
        match line.strip_suffix('\n') {
            Some(text) => out.push_str(text),
            None => {
                out.push_str(line);
                out.push('\n');
                out.push_str(NO_NEWLINE_MARKER);
            }
        }
        out.push('\n');
    }
    out
}
