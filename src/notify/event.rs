//! Events published by the output writer.
//!
//! ```text
//! WriteStarted(rep, path) → [ReadyForDiff(path, old, new)] → WriteEnded(rep, ...)
//! ```

use std::path::Path;

use crate::rep::ItemRep;

/// Event name used to register handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    WriteStarted,
    ReadyForDiff,
    WriteEnded,
}

/// A single notification, borrowed from the publisher for the duration of
/// the synchronous dispatch.
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    /// Destination is about to be written (it may or may not exist yet)
    WriteStarted { rep: &'a ItemRep, path: &'a Path },
    /// Existing textual destination is about to change; `old` is the
    /// pre-write text
    ReadyForDiff {
        path: &'a Path,
        old: &'a str,
        new: &'a str,
    },
    /// Destination write finished
    WriteEnded {
        rep: &'a ItemRep,
        binary: bool,
        path: &'a Path,
        is_created: bool,
        is_modified: bool,
    },
}

impl Event<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::WriteStarted { .. } => EventKind::WriteStarted,
            Self::ReadyForDiff { .. } => EventKind::ReadyForDiff,
            Self::WriteEnded { .. } => EventKind::WriteEnded,
        }
    }
}
