use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, VfsError>;

#[derive(Debug, Error)]
pub enum VfsError {
    /// The existence probe came back negative for a mode that requires the
    /// file to already exist. A normal, expected outcome, not a crash path.
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// The host refused to open the file (permissions, exhausted
    /// descriptors, ...). Surfaced to the caller, not retried here.
    #[error("could not open {path}: {source}")]
    ResourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
