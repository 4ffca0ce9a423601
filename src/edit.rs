use std::fs;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// The splice primitive: byte-span replacement with verification.
///
/// Block replacement, singleton upserts and id/actor normalization all compile
/// down to this. A span is only replaced when the text currently occupying it
/// is the text the caller saw when the offsets were computed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Edit does nothing until apply_to() is called"]
pub struct Edit {
    /// Starting byte offset (inclusive)
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
    /// New text to insert at [byte_start, byte_end)
    pub new_text: String,
    /// What we expect to find before applying
    pub expected_before: EditVerification,
}

/// Verification strategy for edit safety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (cheaper for large blocks)
    Hash(u64),
}

impl EditVerification {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Create verification from text, using hash for text over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            EditVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            EditVerification::ExactMatch(text.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("Before-text verification failed at byte {byte_start}")]
    BeforeTextMismatch {
        byte_start: usize,
        byte_end: usize,
        found: String,
    },

    #[error("Invalid byte range: [{byte_start}, {byte_end}) in text of length {len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        len: usize,
    },

    #[error("Byte range [{byte_start}, {byte_end}) does not fall on character boundaries")]
    NotCharBoundary { byte_start: usize, byte_end: usize },

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Edit {
    pub fn new(
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<String>,
        expected_before: impl AsRef<str>,
    ) -> Self {
        Self {
            byte_start,
            byte_end,
            new_text: new_text.into(),
            expected_before: EditVerification::from_text(expected_before.as_ref()),
        }
    }

    /// Insertion at a single offset; nothing is expected there.
    pub fn insert(at: usize, new_text: impl Into<String>) -> Self {
        Self::new(at, at, new_text, "")
    }

    fn validate<'a>(&self, content: &'a str) -> Result<&'a str, EditError> {
        if self.byte_start > self.byte_end || self.byte_end > content.len() {
            return Err(EditError::InvalidByteRange {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                len: content.len(),
            });
        }
        if !content.is_char_boundary(self.byte_start) || !content.is_char_boundary(self.byte_end)
        {
            return Err(EditError::NotCharBoundary {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
            });
        }

        let current = &content[self.byte_start..self.byte_end];
        if current == self.new_text || self.expected_before.matches(current) {
            return Ok(current);
        }

        Err(EditError::BeforeTextMismatch {
            byte_start: self.byte_start,
            byte_end: self.byte_end,
            found: current.to_string(),
        })
    }

    /// Apply this edit to `content`, returning the spliced text.
    pub fn apply_to(&self, content: &str) -> Result<String, EditError> {
        let current = self.validate(content)?;
        if current == self.new_text {
            return Ok(content.to_string());
        }

        let mut out =
            String::with_capacity(content.len() + self.new_text.len() - current.len());
        out.push_str(&content[..self.byte_start]);
        out.push_str(&self.new_text);
        out.push_str(&content[self.byte_end..]);
        Ok(out)
    }

    /// Apply several non-overlapping edits to the same text.
    ///
    /// Edits are applied bottom-to-top so earlier offsets stay valid.
    pub fn apply_batch(content: &str, mut edits: Vec<Edit>) -> Result<String, EditError> {
        edits.sort_by(|a, b| b.byte_start.cmp(&a.byte_start));

        for edit in &edits {
            edit.validate(content)?;
        }
        for window in edits.windows(2) {
            let (later, earlier) = (&window[0], &window[1]);
            if earlier.byte_end > later.byte_start {
                return Err(EditError::InvalidByteRange {
                    byte_start: later.byte_start,
                    byte_end: earlier.byte_end,
                    len: content.len(),
                });
            }
        }

        let mut out = content.to_string();
        for edit in &edits {
            out.replace_range(edit.byte_start..edit.byte_end, &edit.new_text);
        }
        Ok(out)
    }
}

/// Atomic file write: tempfile + fsync + rename.
pub fn atomic_write(path: &Path, content: &str) -> Result<(), EditError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    let now = filetime::FileTime::now();
    filetime::set_file_mtime(path, now)?;
    Ok(())
}

/// Read a file, mapping the error into the edit taxonomy.
pub fn read_text(path: &Path) -> Result<String, EditError> {
    Ok(fs::read_to_string(path)?)
}
