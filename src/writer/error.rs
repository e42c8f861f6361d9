//! Write error types.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::rep::RepId;

/// Failure to materialize one destination path.
///
/// `RelativePath` and `MissingContent` mean an upstream contract was broken;
/// `Io` is a filesystem failure that local fallbacks could not absorb.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("output path `{0}` is not absolute")]
    RelativePath(PathBuf),

    #[error("no compiled content for snapshot `{snapshot}` of {rep} (writing `{path}`)")]
    MissingContent {
        rep: RepId,
        snapshot: String,
        path: PathBuf,
    },

    #[error("IO error when writing `{0}`")]
    Io(PathBuf, #[source] std::io::Error),
}

impl WriteError {
    pub(super) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |e| Self::Io(path.to_path_buf(), e)
    }

    /// Destination path the error refers to.
    pub fn path(&self) -> &Path {
        match self {
            Self::RelativePath(path) | Self::Io(path, _) => path,
            Self::MissingContent { path, .. } => path,
        }
    }
}
