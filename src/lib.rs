//! docpatch: text-anchored patching for markdown documents with embedded
//! structured JSON blocks.
//!
//! # Architecture
//!
//! Every document change ends as a literal text splice. Text patches locate
//! their target by substring search (after compact range references are
//! expanded by line matching); block edits splice re-serialized JSON back
//! into the fence's byte span through [`Edit`]. Around that sit validation
//! of the registered block kinds, identifier generation, actor attribution
//! and a selector-aware JSON patch executor.
//!
//! # Guarantees
//!
//! - Domain failures are returned as values, never panics
//! - Hunks apply in order and stop at the first one that does not match
//! - JSON patch batches continue past failing operations
//! - Identifier generation is injectable and deterministic in tests
//! - No global state; the parse cache is owned by the caller
//!
//! # Example
//!
//! ```
//! use docpatch::{apply_patch, validate_document};
//!
//! let doc = "CATS are great.\n";
//! let patched = apply_patch(doc, "+\n+```attributes\n+{\"annotations\": [{\"text\": \"cats\"}]}\n+```\n")
//!     .unwrap();
//! assert!(validate_document(&patched.content, Some(doc), &[], None).is_ok());
//! ```

pub mod actor;
pub mod blocks;
pub mod config;
pub mod edit;
pub mod engine;
pub mod ids;
pub mod json_patch;
pub mod matcher;
pub mod patch;
pub mod pending;
pub mod safety;

// Re-exports
pub use actor::{stamp_actors, stamp_block};
pub use blocks::{
    parse_code_blocks, replace_singleton_block, validate_block, validate_document, BlockError,
    BlockKind, CodeBlock, CodeRef, DocumentErrors, ParseCache,
};
pub use config::{discover, load_from_path, load_from_str, ConfigError, EngineConfig, LoadedConfig};
pub use edit::{atomic_write, Edit, EditError, EditVerification};
pub use engine::{Engine, EngineError, EngineOutput, TextPatchRequest};
pub use ids::{GeneratedId, IdGenerator, RandomIds, SequentialIds};
pub use json_patch::{
    apply_operations, patch_json_block, JsonPatchError, JsonPatchOp, JsonPatchRequest,
    ToolResult, ToolStatus,
};
pub use matcher::{expand_match, find_matches, Match};
pub use patch::{
    apply_patch, hunk_between, render_raw_diff, resolve_range_refs, FileReader, PatchError,
    RangeRefError,
};
pub use safety::{FsReader, SafetyError, WorkspaceGuard};
