//! Structured JSON blocks embedded in markdown documents.

pub mod cache;
pub mod errors;
pub mod parser;
pub mod path;
pub mod registry;
pub mod schema;
pub mod validator;

pub use cache::{parse_block_json, ParseCache};
pub use errors::BlockError;
pub use parser::{
    append_block, block_edit, document_prose, find_blocks_by_language, find_singleton_block,
    format_block, parse_code_blocks, replace_block, replace_blocks, replace_singleton_block,
    serialize_block_json, CodeBlock,
};
pub use path::ParsedPath;
pub use registry::{unwrap_fuzzy, wrap_fuzzy, BlockKind, BlockTypeConfig};
pub use schema::{BlockValidation, ValidationIssue};
pub use validator::{
    find_counterpart, parse_document_blocks, resolve_document_fuzzy_text, resolve_fuzzy_text,
    validate_attributes, validate_block, validate_document, CodeRef, DocumentErrors,
    DocumentIssue, ParsedBlock, ValidationContext,
};
