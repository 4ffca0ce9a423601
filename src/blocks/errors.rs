use crate::edit::EditError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlockError {
    #[error("invalid JSON in {language} block: {message}")]
    InvalidJson { language: String, message: String },

    #[error("unknown block language: {0}")]
    UnknownLanguage(String),

    #[error("no {language} block with id {id:?}")]
    BlockNotFound { language: String, id: String },

    #[error("{language} blocks are not singletons; an id is required to select one")]
    IdRequired { language: String },

    #[error("invalid block path '{input}': {message}")]
    InvalidPath { input: String, message: String },

    #[error("edit error: {0}")]
    Edit(#[from] EditError),
}
