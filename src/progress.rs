//! Per-file action reporting.
//!
//! Prints one line per written destination, classified as `create`,
//! `update` or `identical`, with the time spent writing it. Identical files
//! are only shown in verbose mode. Writes that started but never ended are
//! reported as unfinished.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use dashmap::DashMap;

use crate::diff::display_path;
use crate::notify::{Event, EventKind, NotificationCenter, SubscriptionId};
use crate::rep::RepId;
use crate::{debug, log};

/// What happened to one destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Create,
    Update,
    Identical,
}

impl FileAction {
    pub fn classify(is_created: bool, is_modified: bool) -> Self {
        if is_created {
            Self::Create
        } else if is_modified {
            Self::Update
        } else {
            Self::Identical
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Identical => "identical",
        }
    }
}

/// Action counts for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionSummary {
    pub created: usize,
    pub updated: usize,
    pub identical: usize,
    /// Writes that started but never ended
    pub unfinished: usize,
}

impl ActionSummary {
    pub fn total(&self) -> usize {
        self.created + self.updated + self.identical
    }
}

#[derive(Default)]
struct Counters {
    created: AtomicUsize,
    updated: AtomicUsize,
    identical: AtomicUsize,
}

impl Counters {
    fn record(&self, action: FileAction) {
        let counter = match action {
            FileAction::Create => &self.created,
            FileAction::Update => &self.updated,
            FileAction::Identical => &self.identical,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn summary(&self, unfinished: usize) -> ActionSummary {
        ActionSummary {
            created: self.created.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            identical: self.identical.load(Ordering::Relaxed),
            unfinished,
        }
    }
}

/// Listener printing file actions as they complete.
pub struct FileActionPrinter {
    bus: Arc<NotificationCenter>,
    subscriptions: Vec<SubscriptionId>,
    counters: Arc<Counters>,
    started_at: StartTimes,
}

type StartTimes = Arc<DashMap<(RepId, PathBuf), Instant>>;

impl FileActionPrinter {
    /// Subscribe to write events; paths are printed relative to `base_dir`.
    pub fn start(bus: Arc<NotificationCenter>, base_dir: &Path) -> Self {
        Self::subscribe(bus, Some(base_dir.to_path_buf()))
    }

    /// Count actions without printing them.
    pub fn counting(bus: Arc<NotificationCenter>) -> Self {
        Self::subscribe(bus, None)
    }

    fn subscribe(bus: Arc<NotificationCenter>, base_dir: Option<PathBuf>) -> Self {
        let counters = Arc::new(Counters::default());
        let started_at = StartTimes::default();

        let started = {
            let started_at = Arc::clone(&started_at);
            bus.subscribe(EventKind::WriteStarted, move |event| {
                if let Event::WriteStarted { rep, path } = event {
                    started_at.insert((rep.id().clone(), path.to_path_buf()), Instant::now());
                }
            })
        };

        let ended = {
            let counters = Arc::clone(&counters);
            let started_at = Arc::clone(&started_at);
            bus.subscribe(EventKind::WriteEnded, move |event| {
                let Event::WriteEnded {
                    rep,
                    path,
                    is_created,
                    is_modified,
                    ..
                } = event
                else {
                    return;
                };
                let secs = started_at
                    .remove(&(rep.id().clone(), path.to_path_buf()))
                    .map_or(0.0, |(_, at)| at.elapsed().as_secs_f64());
                let action = FileAction::classify(*is_created, *is_modified);
                counters.record(action);

                let Some(base_dir) = &base_dir else {
                    return;
                };
                let shown = display_path(path, base_dir);
                match action {
                    FileAction::Identical => debug!(action.as_str(); "[{:.2}s] {}", secs, shown),
                    _ => log!(action.as_str(); "[{:.2}s] {}", secs, shown),
                }
            })
        };

        Self {
            bus,
            subscriptions: vec![started, ended],
            counters,
            started_at,
        }
    }

    /// Counts so far; writes still in flight count as unfinished.
    pub fn summary(&self) -> ActionSummary {
        self.counters.summary(self.started_at.len())
    }

    /// Unsubscribe and return the final counts.
    pub fn stop(mut self) -> ActionSummary {
        self.unsubscribe();
        let summary = self.summary();
        self.started_at.clear();
        summary
    }

    fn unsubscribe(&mut self) {
        for id in self.subscriptions.drain(..) {
            self.bus.unsubscribe(id);
        }
    }
}

impl Drop for FileActionPrinter {
    fn drop(&mut self) {
        self.unsubscribe();
        self.started_at.clear();
    }
}
