use thiserror::Error;

/// Failures while expanding `+<<` / `-<<` range references.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeRefError {
    #[error("missing ... separator in range reference at line {line}")]
    MissingSeparator { line: usize },

    #[error("missing start anchor in range reference at line {line}")]
    MissingStartAnchor { line: usize },

    #[error("missing end anchor in range reference at line {line}")]
    MissingEndAnchor { line: usize },

    #[error("file not found: {path}")]
    FileNotFound { path: String },

    #[error("start anchor not found in {path}")]
    StartAnchorNotFound { path: String },

    #[error("end anchor not found in {path} after line {after}")]
    EndAnchorNotFound { path: String, after: usize },

    #[error("start anchor ambiguous in {path}: {} candidates\n{}", .previews.len(), .previews.join("\n"))]
    StartAnchorAmbiguous { path: String, previews: Vec<String> },

    #[error("end anchor ambiguous in {path}: {} candidates\n{}", .previews.len(), .previews.join("\n"))]
    EndAnchorAmbiguous { path: String, previews: Vec<String> },
}

/// Failures while applying a parsed patch to content.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("Could not find text to replace: \"{preview}\"")]
    TextNotFound { hunk: usize, preview: String },

    #[error("patch contains no hunks")]
    Empty,

    #[error("malformed patch at line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error(transparent)]
    RangeRef(#[from] RangeRefError),
}
