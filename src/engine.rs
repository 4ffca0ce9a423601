//! End-to-end pipelines over one document.
//!
//! Text patches: range references → hunk application → placeholder
//! resolution → fuzzy annotation text → validation → id backfill → actor
//! stamping → pending-reference resolution. JSON patches go through
//! [`crate::json_patch`] and then the same id, actor and reference passes on
//! the produced mutation.

use crate::actor::stamp_actors;
use crate::blocks::cache::ParseCache;
use crate::blocks::validator::{resolve_document_fuzzy_text, validate_document, CodeRef, DocumentErrors};
use crate::config::EngineConfig;
use crate::ids::{fill_document_ids, resolve_placeholders, summarize_generated, GeneratedId, IdGenerator, RandomIds};
use crate::json_patch::tool::{patch_json_block_with, JsonPatchRequest, ToolResult};
use crate::patch::applicator::apply_parsed;
use crate::patch::errors::{PatchError, RangeRefError};
use crate::patch::parser::{parse_patch, FileAction};
use crate::patch::range_ref::{has_range_refs, FileReader, RangeRefResolver};
use crate::pending::{collect_defined_ids, resolve_pending_references};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("file not found: {path}")]
    FileNotFound { path: String },

    #[error(transparent)]
    RangeRef(#[from] RangeRefError),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error("validation failed:\n{0}")]
    Validation(#[from] DocumentErrors),
}

#[derive(Debug, Clone, Default)]
pub struct TextPatchRequest {
    /// Target document, also the default file for range references.
    pub path: String,
    pub patch: String,
    pub available_codes: Vec<CodeRef>,
    /// Identifiers defined elsewhere in the file set.
    pub known_ids: BTreeSet<String>,
}

impl TextPatchRequest {
    pub fn new(path: impl Into<String>, patch: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            patch: patch.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineOutput {
    pub path: String,
    pub original: String,
    pub content: String,
    pub hunks_applied: usize,
    pub generated: Vec<GeneratedId>,
    pub resolved_references: Vec<String>,
}

impl EngineOutput {
    pub fn changed(&self) -> bool {
        self.content != self.original
    }

    pub fn summary(&self) -> Option<String> {
        summarize_generated(&self.generated)
    }
}

pub struct Engine<G: IdGenerator = RandomIds> {
    config: EngineConfig,
    generator: G,
    cache: ParseCache,
}

impl Engine<RandomIds> {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_generator(config, RandomIds)
    }
}

impl<G: IdGenerator> Engine<G> {
    pub fn with_generator(config: EngineConfig, generator: G) -> Self {
        let cache = ParseCache::new(config.cache.max_entries);
        Self {
            config,
            generator,
            cache,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &ParseCache {
        &self.cache
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    fn range_resolver(&self) -> RangeRefResolver {
        RangeRefResolver {
            threshold: self.config.matching.range_threshold,
            preview_context: self.config.matching.preview_context,
        }
    }

    pub fn apply_text_patch<R: FileReader>(
        &mut self,
        request: &TextPatchRequest,
        reader: &R,
    ) -> Result<EngineOutput, EngineError> {
        let path = request.path.as_str();
        let patch = if has_range_refs(&request.patch) {
            self.range_resolver().resolve(&request.patch, path, reader)?
        } else {
            request.patch.clone()
        };
        let parsed = parse_patch(&patch)?;

        let original = match reader.read_file(path) {
            Some(content) => content,
            None if parsed.files.iter().any(|f| f.action == FileAction::Add) => String::new(),
            None => {
                return Err(EngineError::FileNotFound {
                    path: path.to_string(),
                })
            }
        };

        let application = apply_parsed(&original, &parsed, Some(path))?;
        log::debug!("{path}: applied {} hunk(s)", application.hunks_applied);

        let (content, mut generated) = resolve_placeholders(&application.content, &mut self.generator);
        let content = resolve_document_fuzzy_text(&content, self.config.matching.annotation_threshold);
        validate_document(&content, Some(&original), &request.available_codes, Some(&mut self.cache))?;

        let (content, resolved_references) = self.finish(&original, &content, &request.known_ids, &mut generated);
        Ok(EngineOutput {
            path: path.to_string(),
            original,
            content,
            hunks_applied: application.hunks_applied,
            generated,
            resolved_references,
        })
    }

    /// Id backfill, actor stamping and pending-reference resolution.
    fn finish(
        &mut self,
        original: &str,
        content: &str,
        known_ids: &BTreeSet<String>,
        generated: &mut Vec<GeneratedId>,
    ) -> (String, Vec<String>) {
        let (content, backfilled) = fill_document_ids(content, &mut self.generator);
        generated.extend(backfilled);
        let content = stamp_actors(Some(original), &content, &self.config.actor.name);

        let mut defined = collect_defined_ids([content.as_str()]);
        defined.extend(known_ids.iter().cloned());
        resolve_pending_references(&content, &defined)
    }

    /// Run a JSON patch tool call and post-process its mutation.
    pub fn patch_json_block<R: FileReader>(&mut self, request: &JsonPatchRequest, reader: &R) -> ToolResult {
        let mut result = patch_json_block_with(request, reader, self.config.matching.annotation_threshold);
        let mut generated = Vec::new();

        for mutation in &mut result.mutations {
            let original = reader.read_file(&mutation.path).unwrap_or_default();
            let (content, placeholders) = resolve_placeholders(&mutation.content, &mut self.generator);
            generated.extend(placeholders);
            let (content, _) = self.finish(&original, &content, &BTreeSet::new(), &mut generated);
            mutation.content = content;
        }

        if let Some(summary) = summarize_generated(&generated) {
            result.output = format!("{}\n{summary}", result.output);
        }
        result
    }
}
