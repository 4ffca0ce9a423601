use crate::patch::errors::PatchError;

/// Literal find-and-replace unit produced by both patch dialects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hunk {
    pub old_text: String,
    pub new_text: String,
}

impl Hunk {
    pub fn new(old_text: impl Into<String>, new_text: impl Into<String>) -> Self {
        Self {
            old_text: old_text.into(),
            new_text: new_text.into(),
        }
    }

    /// Empty old text means "append the new text".
    pub fn is_append(&self) -> bool {
        self.old_text.is_empty()
    }

    fn is_empty(&self) -> bool {
        self.old_text.is_empty() && self.new_text.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchDialect {
    /// Bare `+`/`-`/` ` lines forming a single hunk.
    Raw,
    /// `*** Begin Patch` envelope with per-file sections and `@@@` separators.
    Headered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Add,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePatch {
    /// `None` for raw diffs, which never name a file.
    pub path: Option<String>,
    pub action: FileAction,
    pub hunks: Vec<Hunk>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPatch {
    pub dialect: PatchDialect,
    pub files: Vec<FilePatch>,
}

impl ParsedPatch {
    pub fn hunk_count(&self) -> usize {
        self.files.iter().map(|f| f.hunks.len()).sum()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().filter_map(|f| f.path.as_deref())
    }
}

const BEGIN: &str = "*** Begin Patch";
const END: &str = "*** End Patch";
const END_OF_FILE: &str = "*** End of File";
const ADD: &str = "*** Add File:";
const UPDATE: &str = "*** Update File:";
const DELETE: &str = "*** Delete File:";

/// Follows a diff line whose text has no line terminator.
pub const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file";

pub fn detect_dialect(text: &str) -> PatchDialect {
    let headered = text.lines().any(|line| {
        let line = line.trim_end();
        line.starts_with(BEGIN)
            || line.starts_with(ADD)
            || line.starts_with(UPDATE)
            || line.starts_with(DELETE)
            || line.starts_with("@@@")
    });
    if headered {
        PatchDialect::Headered
    } else {
        PatchDialect::Raw
    }
}

pub fn parse_patch(text: &str) -> Result<ParsedPatch, PatchError> {
    match detect_dialect(text) {
        PatchDialect::Raw => Ok(ParsedPatch {
            dialect: PatchDialect::Raw,
            files: vec![FilePatch {
                path: None,
                action: FileAction::Update,
                hunks: parse_raw(text),
            }],
        }),
        PatchDialect::Headered => parse_headered(text),
    }
}

/// Lines that matter, with trailing blank lines dropped.
fn patch_lines(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = text.lines().collect();
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind<'a> {
    Added(&'a str),
    Removed(&'a str),
    Context(&'a str),
    /// `\ No newline at end of file`, applying to the previous line.
    NoNewline,
    Other,
}

fn classify(line: &str) -> LineKind<'_> {
    if line.is_empty() {
        return LineKind::Context("");
    }
    match line.as_bytes()[0] {
        b'+' => LineKind::Added(&line[1..]),
        b'-' => LineKind::Removed(&line[1..]),
        b' ' => LineKind::Context(&line[1..]),
        b'\\' => LineKind::NoNewline,
        _ => LineKind::Other,
    }
}

fn push_line(buf: &mut String, text: &str) {
    buf.push_str(text);
    buf.push('\n');
}

/// Drop the terminator of the line `last` wrote, on the side(s) it went to.
fn unterminate(hunk: &mut Hunk, last: Option<LineKind<'_>>) {
    let trim = |buf: &mut String| {
        if buf.ends_with('\n') {
            buf.pop();
        }
    };
    match last {
        Some(LineKind::Added(_)) => trim(&mut hunk.new_text),
        Some(LineKind::Removed(_)) => trim(&mut hunk.old_text),
        Some(LineKind::Context(_)) => {
            trim(&mut hunk.old_text);
            trim(&mut hunk.new_text);
        }
        _ => log::debug!("no-newline marker without a preceding diff line"),
    }
}

fn parse_raw(text: &str) -> Vec<Hunk> {
    let mut hunk = Hunk::default();
    let mut last = None;
    for line in patch_lines(text) {
        let kind = classify(line);
        match kind {
            LineKind::Added(t) => push_line(&mut hunk.new_text, t),
            LineKind::Removed(t) => push_line(&mut hunk.old_text, t),
            LineKind::Context(t) => {
                push_line(&mut hunk.old_text, t);
                push_line(&mut hunk.new_text, t);
            }
            LineKind::NoNewline => unterminate(&mut hunk, last),
            LineKind::Other => log::debug!("ignoring non-diff line in raw patch: {line:?}"),
        }
        last = Some(kind);
    }
    if hunk.is_empty() {
        Vec::new()
    } else {
        vec![hunk]
    }
}

struct HeaderedState<'a> {
    files: Vec<FilePatch>,
    current: Option<FilePatch>,
    hunk: Hunk,
    last: Option<LineKind<'a>>,
}

impl<'a> HeaderedState<'a> {
    fn flush_hunk(&mut self) {
        self.last = None;
        let hunk = std::mem::take(&mut self.hunk);
        if hunk.is_empty() {
            return;
        }
        let file = self.current.get_or_insert_with(|| FilePatch {
            path: None,
            action: FileAction::Update,
            hunks: Vec::new(),
        });
        file.hunks.push(hunk);
    }

    fn start_file(&mut self, path: &str, action: FileAction) {
        self.flush_hunk();
        if let Some(done) = self.current.take() {
            self.files.push(done);
        }
        self.current = Some(FilePatch {
            path: Some(path.trim().to_string()),
            action,
            hunks: Vec::new(),
        });
    }

    fn in_add_section(&self) -> bool {
        matches!(
            self.current,
            Some(FilePatch {
                action: FileAction::Add,
                ..
            })
        )
    }

    fn finish(mut self) -> Vec<FilePatch> {
        self.flush_hunk();
        if let Some(done) = self.current.take() {
            self.files.push(done);
        }
        self.files
    }
}

fn parse_headered(text: &str) -> Result<ParsedPatch, PatchError> {
    let mut state = HeaderedState {
        files: Vec::new(),
        current: None,
        hunk: Hunk::default(),
        last: None,
    };

    for (idx, line) in patch_lines(text).into_iter().enumerate() {
        let trimmed = line.trim_end();
        if trimmed.starts_with(BEGIN) || trimmed.starts_with(END_OF_FILE) {
            continue;
        }
        if trimmed.starts_with(END) {
            break;
        }
        if let Some(path) = trimmed.strip_prefix(ADD) {
            state.start_file(path, FileAction::Add);
            continue;
        }
        if let Some(path) = trimmed.strip_prefix(UPDATE) {
            state.start_file(path, FileAction::Update);
            continue;
        }
        if let Some(path) = trimmed.strip_prefix(DELETE) {
            state.start_file(path, FileAction::Delete);
            continue;
        }
        if trimmed.starts_with("@@") {
            state.flush_hunk();
            continue;
        }
        if trimmed.starts_with("***") {
            return Err(PatchError::Malformed {
                line: idx + 1,
                message: format!("unknown directive {trimmed:?}"),
            });
        }

        let adding = state.in_add_section();
        let kind = classify(line);
        match kind {
            LineKind::Added(t) => push_line(&mut state.hunk.new_text, t),
            LineKind::Removed(t) if !adding => push_line(&mut state.hunk.old_text, t),
            LineKind::Context(t) if !adding => {
                push_line(&mut state.hunk.old_text, t);
                push_line(&mut state.hunk.new_text, t);
            }
            LineKind::Removed(_) | LineKind::Context(_) => {
                log::debug!("ignoring non-addition line {} inside Add File section", idx + 1);
                continue;
            }
            LineKind::NoNewline => {
                unterminate(&mut state.hunk, state.last);
                continue;
            }
            LineKind::Other => {
                return Err(PatchError::Malformed {
                    line: idx + 1,
                    message: format!("expected '+', '-' or ' ' prefix, found {line:?}"),
                })
            }
        }
        state.last = Some(kind);
    }

    Ok(ParsedPatch {
        dialect: PatchDialect::Headered,
        files: state.finish(),
    })
}
