//! Memoization of block JSON parses.
//!
//! Keyed by `(language, raw content)`. The cache is an explicit value owned by
//! the caller; nothing is global, and dropping or clearing it only costs
//! re-parsing. Capped at a fixed number of entries; when full, the cache is
//! cleared and rebuilt on demand.

use crate::blocks::errors::BlockError;
use serde_json::Value;
use std::collections::HashMap;

pub const DEFAULT_MAX_ENTRIES: usize = 256;

#[derive(Debug, Clone)]
pub struct ParseCache {
    entries: HashMap<(String, String), Result<Value, String>>,
    max_entries: usize,
    hits: u64,
}

impl Default for ParseCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl ParseCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries: max_entries.max(1),
            hits: 0,
        }
    }

    /// Parse `content` as JSON, reusing an earlier result for identical input.
    pub fn parse(&mut self, language: &str, content: &str) -> Result<Value, BlockError> {
        let key = (language.to_string(), content.to_string());
        if let Some(cached) = self.entries.get(&key) {
            self.hits += 1;
            return to_block_result(language, cached.clone());
        }

        if self.entries.len() >= self.max_entries {
            log::debug!("parse cache full ({} entries); clearing", self.entries.len());
            self.entries.clear();
        }

        let parsed = serde_json::from_str::<Value>(content).map_err(|e| e.to_string());
        self.entries.insert(key, parsed.clone());
        to_block_result(language, parsed)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }
}

fn to_block_result(language: &str, parsed: Result<Value, String>) -> Result<Value, BlockError> {
    parsed.map_err(|message| BlockError::InvalidJson {
        language: language.to_string(),
        message,
    })
}

/// Parse a block body, through `cache` when one is supplied.
pub fn parse_block_json(
    cache: Option<&mut ParseCache>,
    language: &str,
    content: &str,
) -> Result<Value, BlockError> {
    match cache {
        Some(cache) => cache.parse(language, content),
        None => to_block_result(
            language,
            serde_json::from_str::<Value>(content).map_err(|e| e.to_string()),
        ),
    }
}
