//! Reading `docpatch.toml` and resolving the workspace it governs.
//!
//! [`discover`] looks for [`CONFIG_FILE`] in a workspace root and falls back
//! to defaults when it is absent. A configured `[workspace] root` is resolved
//! against the directory holding the config file.

use crate::config::schema::{EngineConfig, ValidationError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE: &str = "docpatch.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{}: malformed TOML: {}", origin(.path), .source)]
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    #[error("{}: {}", origin(.path), .source)]
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
    #[error("configured workspace root {} is not usable: {}", .path.display(), .source)]
    Workspace {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn origin(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map_or_else(|| "engine config".to_string(), |p| p.display().to_string())
}

/// Configuration together with the file it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    pub config: EngineConfig,
    /// `None` when no file was found and defaults apply.
    pub source: Option<PathBuf>,
}

impl LoadedConfig {
    fn defaults() -> Self {
        Self {
            config: EngineConfig::default(),
            source: None,
        }
    }

    /// The configured `[workspace] root`, canonicalized, or `fallback` when
    /// none is set. Relative roots are taken from the config file's directory.
    pub fn workspace_root(&self, fallback: &Path) -> Result<PathBuf, ConfigError> {
        let Some(root) = &self.config.workspace.root else {
            return Ok(fallback.to_path_buf());
        };
        let base = self
            .source
            .as_deref()
            .and_then(Path::parent)
            .unwrap_or(fallback);
        let joined = base.join(root);
        joined.canonicalize().map_err(|source| ConfigError::Workspace {
            path: joined.clone(),
            source,
        })
    }
}

/// Load `CONFIG_FILE` from `workspace_root`, or defaults when it is absent.
pub fn discover(workspace_root: &Path) -> Result<LoadedConfig, ConfigError> {
    let candidate = workspace_root.join(CONFIG_FILE);
    if !candidate.is_file() {
        log::debug!("no {CONFIG_FILE} in {}; using defaults", workspace_root.display());
        return Ok(LoadedConfig::defaults());
    }
    log::info!("using config {}", candidate.display());
    load_file(&candidate)
}

/// Load an explicitly named config file.
pub fn load_file(path: &Path) -> Result<LoadedConfig, ConfigError> {
    Ok(LoadedConfig {
        config: load_from_path(path)?,
        source: Some(path.to_path_buf()),
    })
}

pub fn load_from_str(input: &str) -> Result<EngineConfig, ConfigError> {
    let config: EngineConfig =
        toml_edit::de::from_str(input).map_err(|source| ConfigError::Toml { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<EngineConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|err| match err {
        ConfigError::Toml { path: None, source } => ConfigError::Toml {
            path: Some(path.to_path_buf()),
            source,
        },
        ConfigError::Validation { path: None, source } => ConfigError::Validation {
            path: Some(path.to_path_buf()),
            source,
        },
        other => other,
    })
}
