use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures of the durable audit log.
#[derive(Debug, Error)]
pub enum AuditLogError {
    /// The mirror file could not be created in the working directory.
    #[error("unable to create mirror file in '{dir}': {source}")]
    MirrorCreate {
        /// Directory the mirror was to be created in.
        dir: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The permanent log could not be opened or created.
    #[error("unable to create log file '{path}': {source}")]
    Open {
        /// Permanent log path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Writing a record failed.
    #[error("unable to write to log file '{path}': {source}")]
    Write {
        /// File being written.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Writing a start, stop or signal marker to the permanent log failed.
    #[error("unable to write marker to log file '{path}': {source}")]
    Marker {
        /// Permanent log path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Locking or reading the mirror failed.
    #[error("unable to read mirror file '{path}': {source}")]
    Mirror {
        /// Mirror path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Archival is active but the permanent log is closed.
    #[error("permanent log is not open")]
    NotOpen,
    /// Moving the permanent log to its archive name failed.
    #[error("unable to rename '{from}' to '{to}': {source}")]
    Rename {
        /// Permanent log path.
        from: PathBuf,
        /// Archive path.
        to: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Formatting the record timestamp failed.
    #[error("unable to format timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}
