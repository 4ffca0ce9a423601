//! JSON patch over structured blocks, with array selectors in paths.

pub mod errors;
pub mod executor;
pub mod pointer;
pub mod selector;
pub mod tool;

pub use errors::JsonPatchError;
pub use executor::{
    apply_operations, partition_numeric, resolve_selectors, wrap_fuzzy_text, ExecutionReport,
    JsonPatchOp, OperationFailure,
};
pub use selector::{Segment, Selector, SelectorPath};
pub use tool::{
    patch_json_block, patch_json_block_with, FileMutation, JsonPatchRequest, ToolResult,
    ToolStatus,
};
