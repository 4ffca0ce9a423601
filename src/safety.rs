use crate::patch::range_ref::FileReader;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Keeps reads and writes inside one document workspace.
#[derive(Debug, Clone)]
pub struct WorkspaceGuard {
    /// Canonical workspace root
    workspace_root: PathBuf,
    /// Canonical directories that stay off limits even inside the root
    forbidden_paths: Vec<PathBuf>,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("Path is outside workspace: {path} (workspace: {workspace})")]
    OutsideWorkspace { path: PathBuf, workspace: PathBuf },

    #[error("Path is in forbidden directory: {path} (forbidden: {forbidden})")]
    ForbiddenPath { path: PathBuf, forbidden: PathBuf },

    #[error("Failed to canonicalize path: {0}")]
    Canonicalize(#[from] std::io::Error),
}

impl WorkspaceGuard {
    /// Create a guard rooted at `workspace_root` (canonicalized).
    pub fn new(workspace_root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let workspace_root = workspace_root.as_ref().canonicalize()?;

        let mut forbidden_paths = Vec::new();

        // Version control internals
        if let Ok(git_dir) = workspace_root.join(".git").canonicalize() {
            forbidden_paths.push(git_dir);
        }

        // Credentials under the home directory, for roots that contain it
        if let Some(home) = home::home_dir() {
            for dir in [".ssh", ".gnupg"] {
                if let Ok(path) = home.join(dir).canonicalize() {
                    forbidden_paths.push(path);
                }
            }
        }

        Ok(Self {
            workspace_root,
            forbidden_paths,
        })
    }

    /// Resolve `path` (relative to the root when not absolute) and check it.
    ///
    /// Returns the canonical path if it is inside the workspace.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        };

        let canonical = absolute.canonicalize()?;
        self.check_canonical(&canonical)?;
        Ok(canonical)
    }

    fn check_canonical(&self, canonical: &Path) -> Result<(), SafetyError> {
        if !canonical.starts_with(&self.workspace_root) {
            return Err(SafetyError::OutsideWorkspace {
                path: canonical.to_path_buf(),
                workspace: self.workspace_root.clone(),
            });
        }

        for forbidden in &self.forbidden_paths {
            if canonical.starts_with(forbidden) {
                return Err(SafetyError::ForbiddenPath {
                    path: canonical.to_path_buf(),
                    forbidden: forbidden.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    #[cfg(test)]
    pub fn with_forbidden(
        workspace_root: impl AsRef<Path>,
        forbidden: Vec<PathBuf>,
    ) -> Result<Self, SafetyError> {
        let workspace_root = workspace_root.as_ref().canonicalize()?;
        Ok(Self {
            workspace_root,
            forbidden_paths: forbidden,
        })
    }
}

/// Reads range-reference targets from disk, confined to a workspace.
#[derive(Debug, Clone)]
pub struct FsReader {
    guard: WorkspaceGuard,
}

impl FsReader {
    pub fn new(workspace_root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        Ok(Self {
            guard: WorkspaceGuard::new(workspace_root)?,
        })
    }

    pub fn guard(&self) -> &WorkspaceGuard {
        &self.guard
    }
}

impl FileReader for FsReader {
    fn read_file(&self, path: &str) -> Option<String> {
        let canonical = match self.guard.validate_path(path) {
            Ok(canonical) => canonical,
            Err(err) => {
                log::debug!("refusing to read {path}: {err}");
                return None;
            }
        };
        match fs::read_to_string(&canonical) {
            Ok(content) => Some(content),
            Err(err) => {
                log::debug!("failed to read {}: {err}", canonical.display());
                None
            }
        }
    }
}
