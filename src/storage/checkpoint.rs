use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while persisting the checkpoint
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// Durable marker of the next unprocessed target index
///
/// The file holds a single integer: the absolute index into the full target
/// list at which the next batch starts. It is only written after a batch has
/// fully drained, so after a crash the interrupted batch is replayed from its
/// first target.
#[derive(Debug, Clone)]
pub struct ProgressCheckpoint {
    path: PathBuf,
}

impl ProgressCheckpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored index; absent, empty or corrupt files mean 0
    pub fn load(&self) -> usize {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    "No progress file at {}, starting from index 0",
                    self.path.display()
                );
                return 0;
            }
            Err(e) => {
                tracing::error!(
                    "Failed to read progress file {}: {}. Starting from index 0",
                    self.path.display(),
                    e
                );
                return 0;
            }
        };

        let trimmed = content.trim();
        if trimmed.is_empty() {
            tracing::info!("Progress file {} is empty, starting from index 0", self.path.display());
            return 0;
        }

        match trimmed.parse::<usize>() {
            Ok(index) => {
                tracing::info!("Resuming from target index {}", index);
                index
            }
            Err(_) => {
                tracing::warn!(
                    "Progress file {} holds '{}', not an index. Starting from index 0",
                    self.path.display(),
                    trimmed
                );
                0
            }
        }
    }

    /// Atomically replaces the stored index
    ///
    /// The value is written to a sibling temp file and renamed over the
    /// checkpoint, so readers see either the old or the new value.
    pub fn save(&self, next_index: usize) -> Result<(), CheckpointError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let tmp_path = self.tmp_path();
        std::fs::write(&tmp_path, next_index.to_string()).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| self.io_error(e))?;

        tracing::info!(
            "Progress saved to {}: next batch starts at index {}",
            self.path.display(),
            next_index
        );
        Ok(())
    }

    /// Removes the checkpoint so the next run starts from index 0
    pub fn reset(&self) -> Result<(), CheckpointError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> CheckpointError {
        CheckpointError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}
