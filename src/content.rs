//! Compiled content values.
//!
//! A snapshot of a representation is either text held in memory or a binary
//! file on disk. The two cases never mix: asking a binary value for its text
//! (or a textual value for its file) is an error.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Wrong accessor used on a [`Content`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContentError {
    #[error("expected {expected} content, found {found} content")]
    WrongVariant {
        expected: &'static str,
        found: &'static str,
    },
}

/// Immutable compiled content of one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// In-memory text
    Textual(String),
    /// Backing file holding the bytes
    Binary(PathBuf),
}

impl Content {
    pub fn textual(text: impl Into<String>) -> Self {
        Self::Textual(text.into())
    }

    pub fn binary(path: impl Into<PathBuf>) -> Self {
        Self::Binary(path.into())
    }

    #[inline]
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }

    #[inline]
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::Textual(_))
    }

    /// The text of a textual value.
    pub fn string(&self) -> Result<&str, ContentError> {
        match self {
            Self::Textual(text) => Ok(text),
            Self::Binary(_) => Err(self.wrong("textual")),
        }
    }

    /// The backing file of a binary value.
    pub fn filename(&self) -> Result<&Path, ContentError> {
        match self {
            Self::Binary(path) => Ok(path),
            Self::Textual(_) => Err(self.wrong("binary")),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Textual(_) => "textual",
            Self::Binary(_) => "binary",
        }
    }

    fn wrong(&self, expected: &'static str) -> ContentError {
        ContentError::WrongVariant {
            expected,
            found: self.kind(),
        }
    }
}
