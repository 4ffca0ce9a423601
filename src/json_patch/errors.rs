use crate::blocks::errors::BlockError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JsonPatchError {
    #[error("invalid path '{path}' at position {position}: {message}")]
    InvalidPath {
        path: String,
        position: usize,
        message: String,
    },

    #[error("No items match selector [{selector}] at {path}")]
    NoMatch { selector: String, path: String },

    #[error("selector [{selector}] at {path} must match exactly one item, matched {count}")]
    AmbiguousSource {
        selector: String,
        path: String,
        count: usize,
    },

    #[error("{path} is not an array")]
    NotAnArray { path: String },

    #[error("path not found: {path}")]
    PathNotFound { path: String },

    #[error("array index {index} out of bounds at {path} (length {len})")]
    IndexOutOfBounds { path: String, index: usize, len: usize },

    #[error("numeric array index in {path}; address array items with a selector such as [id=...]")]
    NumericIndex { path: String },

    #[error("test failed at {path}")]
    TestFailed { path: String },

    #[error("cannot move {from} into its own child {path}")]
    MoveIntoChild { from: String, path: String },

    #[error("cannot {op} the document root")]
    RootTarget { op: String },

    #[error("file not found: {path}")]
    FileNotFound { path: String },

    #[error("{0}")]
    Block(String),
}

impl From<BlockError> for JsonPatchError {
    fn from(err: BlockError) -> Self {
        JsonPatchError::Block(err.to_string())
    }
}
