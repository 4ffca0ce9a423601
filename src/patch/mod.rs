pub mod applicator;
pub mod diff;
pub mod errors;
pub mod parser;
pub mod range_ref;

pub use applicator::{
    apply_hunk, apply_hunks, apply_parsed, apply_patch, apply_patch_to_file, PatchApplication,
};
pub use diff::{hunk_between, render_raw_diff};
pub use errors::{PatchError, RangeRefError};
pub use parser::{
    detect_dialect, parse_patch, FileAction, FilePatch, Hunk, ParsedPatch, PatchDialect,
};
pub use range_ref::{
    has_range_refs, resolve_range_refs, FileReader, FnReader, RangeRefResolver,
};
