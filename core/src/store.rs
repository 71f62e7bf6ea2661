//! Document persistence
//!
//! Update mode reads a document, rewrites some code blocks and hands the
//! whole text back here. A store only needs whole-resource read and write.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub trait DocumentStore: Send + Sync {
    fn read(&self, id: &Path) -> Result<String, StoreError>;

    fn write(&self, id: &Path, contents: &str) -> Result<(), StoreError>;
}

/// Documents are files on disk, identified by path
#[derive(Debug, Clone, Copy, Default)]
pub struct FileStore;

impl DocumentStore for FileStore {
    fn read(&self, id: &Path) -> Result<String, StoreError> {
        std::fs::read_to_string(id).map_err(|source| StoreError::Read {
            path: id.to_path_buf(),
            source,
        })
    }

    fn write(&self, id: &Path, contents: &str) -> Result<(), StoreError> {
        // Write beside the target and rename so a failed write leaves the
        // original untouched
        let tmp = id.with_extension("litmus.tmp");
        let to_write_error = |source| StoreError::Write {
            path: id.to_path_buf(),
            source,
        };
        std::fs::write(&tmp, contents).map_err(to_write_error)?;
        std::fs::rename(&tmp, id).map_err(to_write_error)?;
        debug!(path = %id.display(), bytes = contents.len(), "document written");
        Ok(())
    }
}
