use std::path::PathBuf;

/// Failures that abort a directory search
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// Directory traversal failed
    #[error("cannot search {path}: {source}")]
    Walk {
        /// Path being visited
        path: PathBuf,
        /// Underlying traversal error
        #[source]
        source: walkdir::Error,
    },

    /// A package file could not be read for checksumming
    #[error("cannot read {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
