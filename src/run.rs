//! One compile run, from the output side.
//!
//! ```text
//! start  → load cache, create bus + writer, start listeners
//! write  → write_rep / write_reps (parallel), cache_rep / restore_rep
//! finish → stop listeners, prune + store cache, clear temp dir
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use rayon::prelude::*;
use rustc_hash::FxHashSet;

use crate::cache::{CacheError, CompiledContentCache};
use crate::config::OutputConfig;
use crate::diff::{DiffGenerator, DiffOptions, DiffSummary};
use crate::notify::NotificationCenter;
use crate::progress::{ActionSummary, FileActionPrinter};
use crate::rep::{ItemRep, RepId};
use crate::store::CompiledContentStore;
use crate::writer::{ItemRepWriter, WriteError, WriteOutcome};
use crate::{debug, log, logger};

/// What a finished run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub actions: ActionSummary,
    /// `None` when diffs were disabled
    pub diffs: Option<DiffSummary>,
    /// Representations dropped from the cache
    pub pruned: usize,
}

/// Output state of a single compile run.
pub struct OutputRun {
    root: PathBuf,
    temp_dir: PathBuf,
    cache: CompiledContentCache,
    bus: Arc<NotificationCenter>,
    writer: ItemRepWriter,
    diff: Option<DiffGenerator>,
    printer: FileActionPrinter,
}

impl OutputRun {
    /// Load the cache and start listening for writes under `root`.
    pub fn start(root: &Path, config: &OutputConfig) -> Result<Self> {
        config.validate()?;
        if config.verbose {
            logger::set_verbose(true);
        }

        let mut cache = CompiledContentCache::new(&root.join(&config.cache_dir));
        cache
            .load()
            .with_context(|| format!("failed to load cache from `{}`", cache.dir().display()))?;

        let temp_dir = root.join(&config.temp_dir);
        let bus = Arc::new(NotificationCenter::new());
        let writer = ItemRepWriter::new(Arc::clone(&bus), &temp_dir);

        let diff = if config.diff.enable {
            // Headers name outputs relative to the site root, not the cwd
            let options = DiffOptions {
                report: root.join(&config.diff.file),
                base_dir: root.to_path_buf(),
                workers: config.diff_workers(),
            };
            let report = options.report.clone();
            let generator = DiffGenerator::start(Arc::clone(&bus), options)
                .with_context(|| format!("failed to start diff report `{}`", report.display()))?;
            Some(generator)
        } else {
            None
        };

        let printer = if config.log_actions {
            FileActionPrinter::start(Arc::clone(&bus), root)
        } else {
            FileActionPrinter::counting(Arc::clone(&bus))
        };

        Ok(Self {
            root: root.to_path_buf(),
            temp_dir,
            cache,
            bus,
            writer,
            diff,
            printer,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache(&self) -> &CompiledContentCache {
        &self.cache
    }

    pub fn writer(&self) -> &ItemRepWriter {
        &self.writer
    }

    /// Bus for additional listeners.
    pub fn bus(&self) -> &Arc<NotificationCenter> {
        &self.bus
    }

    /// Fill `store` from the cache. Returns `false` on a miss.
    pub fn restore_rep(&self, rep: &ItemRep, store: &CompiledContentStore) -> bool {
        match self.cache.get(rep.id()) {
            Some(contents) => {
                store.set_all(rep.id(), contents);
                true
            }
            None => false,
        }
    }

    /// Record the compiled snapshots of `rep` in the cache.
    pub fn cache_rep(&self, rep: &ItemRep, store: &CompiledContentStore) -> Result<(), CacheError> {
        self.cache.set(rep.id(), &store.get_all(rep.id()))
    }

    pub fn write_rep(
        &self,
        rep: &ItemRep,
        store: &CompiledContentStore,
    ) -> Result<Vec<(PathBuf, WriteOutcome)>, WriteError> {
        self.writer.write_all(rep, store)
    }

    /// Write many representations in parallel.
    ///
    /// A failing rep does not stop the others; failures are logged and
    /// returned.
    pub fn write_reps(
        &self,
        reps: &[ItemRep],
        store: &CompiledContentStore,
    ) -> Vec<(RepId, WriteError)> {
        reps.par_iter()
            .filter_map(|rep| {
                let err = self.write_rep(rep, store).err()?;
                log!("error"; "{}: {}", rep.id(), err);
                Some((rep.id().clone(), err))
            })
            .collect()
    }

    /// Stop listeners, prune and store the cache, clear the temp directory.
    pub fn finish(mut self, active: &FxHashSet<RepId>) -> Result<RunSummary> {
        let diffs = self.diff.take().map(DiffGenerator::stop);
        let actions = self.printer.summary();

        let pruned = self
            .cache
            .prune(active)
            .context("failed to prune compiled content cache")?;
        self.cache
            .store()
            .context("failed to store compiled content cache")?;

        match fs::remove_dir_all(&self.temp_dir) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                return Err(e).with_context(|| {
                    format!("failed to clear temp dir `{}`", self.temp_dir.display())
                });
            }
            _ => {}
        }

        debug!(
            "output";
            "{} created, {} updated, {} identical",
            actions.created,
            actions.updated,
            actions.identical
        );
        if actions.unfinished > 0 {
            log!("output"; "{} write(s) did not finish", actions.unfinished);
        }

        Ok(RunSummary {
            actions,
            diffs,
            pruned,
        })
    }
}
