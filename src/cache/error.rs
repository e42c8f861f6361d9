//! Cache error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors while loading, storing or updating the compiled content cache.
///
/// A missing cache file or an incompatible format version is not an error
/// (the cache simply starts cold); everything below is.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error when reading `{0}`")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("IO error when writing `{0}`")]
    Write(PathBuf, #[source] std::io::Error),

    #[error("corrupt cache file `{0}`")]
    Parse(PathBuf, #[source] serde_json::Error),

    #[error("failed to serialize cache file `{0}`")]
    Serialize(PathBuf, #[source] serde_json::Error),
}
