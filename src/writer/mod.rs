//! Output writer: compiled content → files on disk.
//!
//! Every registered raw path of every snapshot is written at most once per
//! run, and only when its bytes actually change:
//!
//! ```text
//! claim path → mkdir -p → WriteStarted → source file → compare
//!     → [ReadyForDiff] → clone | hardlink | copy → WriteEnded
//! ```
//!
//! Textual content is first written to a private temp file, so an
//! unchanged destination is detected by comparison and never touched. A
//! changed destination is staged under a fresh name beside it and renamed
//! over it: it is never written in place, and a failed write keeps the old
//! file.

mod compare;
mod error;
mod transfer;
mod written;

pub use compare::files_identical;
pub use error::WriteError;
pub use transfer::{PlatformTransfer, Transfer};
pub use written::WrittenPaths;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;

use crate::content::Content;
use crate::notify::{Event, NotificationCenter};
use crate::rep::ItemRep;
use crate::store::CompiledContentStore;

/// Temp sub-directory for materialized textual content
pub const TEXT_ITEMS_DIR: &str = "text_items";

/// Name prefix of files staged next to their destination
const STAGING_PREFIX: &str = ".tola-staged-";

/// Result of a single `write_one` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Path was already written this run
    Skipped,
    Written { created: bool, modified: bool },
}

impl WriteOutcome {
    pub fn is_modified(self) -> bool {
        matches!(self, Self::Written { modified: true, .. })
    }
}

/// Writes representations for one compile run.
///
/// Shareable between worker threads; the written-path set lives as long as
/// the writer, so create one writer per run.
pub struct ItemRepWriter {
    bus: Arc<NotificationCenter>,
    text_dir: PathBuf,
    transfer: Box<dyn Transfer>,
    written: WrittenPaths,
}

impl ItemRepWriter {
    /// Writer publishing to `bus`, keeping temp files under `temp_dir`.
    ///
    /// `temp_dir` should be on the same filesystem as the output so the
    /// hardlink strategy applies.
    pub fn new(bus: Arc<NotificationCenter>, temp_dir: &Path) -> Self {
        Self {
            bus,
            text_dir: temp_dir.join(TEXT_ITEMS_DIR),
            transfer: Box::new(PlatformTransfer),
            written: WrittenPaths::new(),
        }
    }

    /// Replace the platform transfer strategy.
    pub fn with_transfer(mut self, transfer: impl Transfer + 'static) -> Self {
        self.transfer = Box::new(transfer);
        self
    }

    pub fn written_paths(&self) -> &WrittenPaths {
        &self.written
    }

    /// Write every raw path of every snapshot of `rep`, in snapshot order.
    pub fn write_all(
        &self,
        rep: &ItemRep,
        store: &CompiledContentStore,
    ) -> Result<Vec<(PathBuf, WriteOutcome)>, WriteError> {
        let mut outcomes = Vec::new();
        for def in rep.snapshot_defs() {
            outcomes.extend(self.write(rep, store, &def.name)?);
        }
        Ok(outcomes)
    }

    /// Write every raw path registered for one snapshot.
    pub fn write(
        &self,
        rep: &ItemRep,
        store: &CompiledContentStore,
        snapshot: &str,
    ) -> Result<Vec<(PathBuf, WriteOutcome)>, WriteError> {
        rep.raw_paths(snapshot)
            .iter()
            .map(|path| {
                self.write_one(rep, store, snapshot, path)
                    .map(|outcome| (path.clone(), outcome))
            })
            .collect()
    }

    /// Materialize one snapshot at one destination path.
    pub fn write_one(
        &self,
        rep: &ItemRep,
        store: &CompiledContentStore,
        snapshot: &str,
        path: &Path,
    ) -> Result<WriteOutcome, WriteError> {
        if !path.is_absolute() {
            return Err(WriteError::RelativePath(path.to_path_buf()));
        }

        // Several snapshots may share a destination
        if !self.written.insert(path) {
            return Ok(WriteOutcome::Skipped);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(WriteError::io(path))?;
        }

        let is_created = !path.is_file();

        self.bus.publish(&Event::WriteStarted { rep, path });

        let content =
            store
                .get(rep.id(), snapshot)
                .ok_or_else(|| WriteError::MissingContent {
                    rep: rep.id().clone(),
                    snapshot: snapshot.to_string(),
                    path: path.to_path_buf(),
                })?;

        // Kept alive until the destination is linked or copied
        let temp;
        let source: &Path = match &content {
            Content::Binary(backing) => backing,
            Content::Textual(text) => {
                temp = self.materialize(text).map_err(WriteError::io(path))?;
                temp.path()
            }
        };

        let is_modified = is_created
            || !files_identical(path, source).map_err(WriteError::io(path))?;

        // Old text must be captured before the destination is replaced
        if !is_created
            && is_modified
            && let Content::Textual(new) = &content
        {
            let old = fs::read(path).map_err(WriteError::io(path))?;
            self.bus.publish(&Event::ReadyForDiff {
                path,
                old: &String::from_utf8_lossy(&old),
                new,
            });
        }

        if is_modified {
            self.replace(&content, source, path)
                .map_err(WriteError::io(path))?;
        }

        rep.set_modified(is_modified);

        self.bus.publish(&Event::WriteEnded {
            rep,
            binary: content.is_binary(),
            path,
            is_created,
            is_modified,
        });

        Ok(WriteOutcome::Written {
            created: is_created,
            modified: is_modified,
        })
    }

    /// Write text to a fresh private temp file.
    fn materialize(&self, text: &str) -> io::Result<NamedTempFile> {
        fs::create_dir_all(&self.text_dir)?;
        let mut temp = tempfile::Builder::new()
            .prefix("text-")
            .tempfile_in(&self.text_dir)?;
        temp.write_all(text.as_bytes())?;
        temp.flush()?;
        Ok(temp)
    }

    /// Replace `dest` with the bytes of `source`.
    ///
    /// The new file is staged under a fresh name next to `dest` and renamed
    /// over it, so a failed transfer leaves the previous destination intact.
    fn replace(&self, content: &Content, source: &Path, dest: &Path) -> io::Result<()> {
        let dir = dest.parent().unwrap_or_else(|| Path::new("."));
        let staged = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .make_in(dir, |staging| {
                self.place(content, source, staging).inspect_err(|e| {
                    // A name clash is retried by tempfile; the file is not ours
                    if e.kind() != io::ErrorKind::AlreadyExists {
                        let _ = fs::remove_file(staging);
                    }
                })
            })?;
        staged.persist(dest).map_err(|e| e.error)?;
        Ok(())
    }

    /// Put the bytes of `source` at the absent path `dest`: clone, else
    /// hardlink, else copy.
    fn place(&self, content: &Content, source: &Path, dest: &Path) -> io::Result<()> {
        // Only clone a backing file that still matches what was compared
        if let Content::Binary(backing) = content
            && self.transfer.supports_clone()
            && (backing.as_path() == source || files_identical(backing, source)?)
            && self.transfer.try_clone_file(backing, dest)?
        {
            return Ok(());
        }

        match self.transfer.hard_link(source, dest) {
            Ok(()) => Ok(()),
            Err(e) if transfer::is_link_fallback(&e) => {
                crate::debug!("write"; "hardlink failed ({}), copying {}", e, dest.display());
                self.transfer.copy(source, dest)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests;
