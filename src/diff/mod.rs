//! Diff report of changed textual outputs.
//!
//! Listens on the notification bus for the whole run:
//!
//! ```text
//! WriteStarted → remember current text (by rep)
//! WriteEnded   → read new text → queue diff task if both exist and differ
//! worker       → render unified diff → append to report (locked)
//! ```
//!
//! Rendering runs on a bounded pool so writers never wait on it. [`stop`]
//! is the barrier: after it returns every queued diff is in the report.
//! Writes that started but never ended (a failed write) are counted as
//! abandoned and their remembered text is released.
//!
//! [`stop`]: DiffGenerator::stop

mod render;

pub use render::{CONTEXT_LINES, display_path, render_unified};

use std::fs::{self, File};
use std::io::{self, Write};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;

use crossbeam::channel::{self, Receiver, Sender};
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::notify::{Event, EventKind, NotificationCenter, SubscriptionId};
use crate::rep::RepId;
use crate::{debug, log};

/// Default report file name
pub const REPORT_FILE: &str = "output.diff";

/// Diff generator settings.
#[derive(Debug, Clone)]
pub struct DiffOptions {
    /// Report file, truncated at start
    pub report: PathBuf,
    /// Header paths are shown relative to this directory; paths outside
    /// it are shown as given
    pub base_dir: PathBuf,
    /// Number of diff workers (at least one)
    pub workers: usize,
}

impl DiffOptions {
    /// Report at `<dir>/output.diff`, header paths relative to the working
    /// directory, one worker per available core.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            report: dir.join(REPORT_FILE),
            base_dir: std::env::current_dir().unwrap_or_else(|_| dir.clone()),
            workers: default_workers(),
        }
    }
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Diff counts reported by [`DiffGenerator::stop`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub written: usize,
    pub failed: usize,
    /// Writes that started but never ended
    pub abandoned: usize,
}

struct DiffTask {
    path: PathBuf,
    old: String,
    new: String,
}

/// State shared by the workers.
struct Report {
    file: Mutex<File>,
    base_dir: PathBuf,
    written: AtomicUsize,
    failed: AtomicUsize,
    abandoned: AtomicUsize,
}

impl Report {
    fn append(&self, task: &DiffTask) -> io::Result<bool> {
        let label = display_path(&task.path, &self.base_dir);
        let diff = render_unified(&label, &task.old, &task.new);
        if diff.is_empty() {
            return Ok(false);
        }
        self.file.lock().write_all(diff.as_bytes())?;
        Ok(true)
    }
}

/// Listener writing unified diffs of modified textual outputs.
pub struct DiffGenerator {
    bus: Arc<NotificationCenter>,
    subscriptions: Vec<SubscriptionId>,
    workers: Vec<JoinHandle<()>>,
    report: Arc<Report>,
    /// Pre-write text of writes in flight
    pending: Pending,
    stopped: bool,
}

type Pending = Arc<DashMap<RepId, Option<String>>>;

impl DiffGenerator {
    /// Truncate the report, spawn workers and subscribe to write events.
    pub fn start(bus: Arc<NotificationCenter>, options: DiffOptions) -> io::Result<Self> {
        if let Some(parent) = options.report.parent() {
            fs::create_dir_all(parent)?;
        }
        let report = Arc::new(Report {
            file: Mutex::new(File::create(&options.report)?),
            base_dir: options.base_dir,
            written: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            abandoned: AtomicUsize::new(0),
        });

        let (tx, rx) = channel::unbounded::<DiffTask>();
        let workers = (0..options.workers.max(1))
            .map(|i| {
                let rx = rx.clone();
                let report = Arc::clone(&report);
                std::thread::Builder::new()
                    .name(format!("diff-{i}"))
                    .spawn(move || run_worker(&rx, &report))
            })
            .collect::<io::Result<Vec<_>>>()?;

        let pending = Pending::default();
        let subscriptions = subscribe(&bus, tx, &pending);
        debug!("diff"; "writing diffs to {}", options.report.display());

        Ok(Self {
            bus,
            subscriptions,
            workers,
            report,
            pending,
            stopped: false,
        })
    }

    /// Unsubscribe, drain the queue and wait for every worker.
    pub fn stop(mut self) -> DiffSummary {
        self.shutdown()
    }

    fn shutdown(&mut self) -> DiffSummary {
        if !self.stopped {
            self.stopped = true;
            // Handlers own the only senders; dropping them closes the queue
            for id in self.subscriptions.drain(..) {
                self.bus.unsubscribe(id);
            }
            let abandoned = self.pending.len();
            if abandoned > 0 {
                debug!("diff"; "{} write(s) never finished", abandoned);
            }
            self.report.abandoned.store(abandoned, Ordering::Relaxed);
            self.pending.clear();
            for worker in self.workers.drain(..) {
                if worker.join().is_err() {
                    self.report.failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        DiffSummary {
            written: self.report.written.load(Ordering::Relaxed),
            failed: self.report.failed.load(Ordering::Relaxed),
            abandoned: self.report.abandoned.load(Ordering::Relaxed),
        }
    }
}

impl Drop for DiffGenerator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn subscribe(
    bus: &NotificationCenter,
    tx: Sender<DiffTask>,
    pending: &Pending,
) -> Vec<SubscriptionId> {
    let old_contents = Arc::clone(pending);

    let started = {
        let old_contents = Arc::clone(&old_contents);
        bus.subscribe(EventKind::WriteStarted, move |event| {
            if let Event::WriteStarted { rep, path } = event {
                old_contents.insert(rep.id().clone(), read_text(path));
            }
        })
    };

    let ended = bus.subscribe(EventKind::WriteEnded, move |event| {
        let Event::WriteEnded { rep, binary, path, .. } = event else {
            return;
        };
        let old = old_contents.remove(rep.id()).and_then(|(_, old)| old);
        if *binary {
            return;
        }
        if let Some(old) = old
            && let Some(new) = read_text(path)
            && old != new
        {
            let task = DiffTask {
                path: path.to_path_buf(),
                old,
                new,
            };
            // Receivers only go away after the handlers are unsubscribed
            let _ = tx.send(task);
        }
    });

    vec![started, ended]
}

fn read_text(path: &Path) -> Option<String> {
    let bytes = fs::read(path).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

fn run_worker(rx: &Receiver<DiffTask>, report: &Report) {
    for task in rx.iter() {
        match catch_unwind(AssertUnwindSafe(|| report.append(&task))) {
            Ok(Ok(true)) => {
                report.written.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Ok(false)) => {}
            Ok(Err(e)) => {
                report.failed.fetch_add(1, Ordering::Relaxed);
                log!("error"; "failed to write diff for {}: {}", task.path.display(), e);
            }
            Err(_) => {
                report.failed.fetch_add(1, Ordering::Relaxed);
                log!("error"; "diff of {} panicked", task.path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Content;
    use crate::rep::ItemRep;
    use crate::store::CompiledContentStore;
    use crate::writer::ItemRepWriter;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<NotificationCenter>, DiffOptions) {
        let dir = TempDir::new().unwrap();
        let bus = Arc::new(NotificationCenter::new());
        let mut options = DiffOptions::new(dir.path());
        options.base_dir = dir.path().to_path_buf();
        options.workers = 2;
        (dir, bus, options)
    }

    fn write(bus: &Arc<NotificationCenter>, dir: &Path, reps: &[(&str, &str)]) {
        let writer = ItemRepWriter::new(Arc::clone(bus), &dir.join("tmp"));
        let store = CompiledContentStore::new();
        for (name, text) in reps {
            let rep = ItemRep::new(format!("/{name}"), "default")
                .with_snapshot("last")
                .with_raw_path("last", dir.join("out").join(name));
            store.set(rep.id(), "last", Content::textual(*text));
            writer.write_all(&rep, &store).unwrap();
        }
    }

    #[test]
    fn test_report_contains_changed_page() {
        let (dir, bus, options) = setup();
        let report = options.report.clone();
        write(&bus, dir.path(), &[("page.html", "a\nb\nc\n")]);

        let generator = DiffGenerator::start(Arc::clone(&bus), options).unwrap();
        write(&bus, dir.path(), &[("page.html", "a\nx\nc\n")]);
        let summary = generator.stop();

        assert_eq!(
            summary,
            DiffSummary {
                written: 1,
                failed: 0,
                abandoned: 0
            }
        );
        assert_eq!(
            fs::read_to_string(report).unwrap(),
            "--- out/page.html\n+++ out/page.html\n@@ -1,3 +1,3 @@\n a\n-b\n+x\n c\n"
        );
    }

    #[test]
    fn test_created_and_unchanged_pages_not_reported() {
        let (dir, bus, options) = setup();
        let report = options.report.clone();
        write(&bus, dir.path(), &[("same.html", "same\n")]);

        let generator = DiffGenerator::start(Arc::clone(&bus), options).unwrap();
        write(&bus, dir.path(), &[("same.html", "same\n"), ("new.html", "new\n")]);
        let summary = generator.stop();

        assert_eq!(summary.written, 0);
        assert_eq!(fs::read_to_string(report).unwrap(), "");
    }

    #[test]
    fn test_start_truncates_report() {
        let (_dir, bus, options) = setup();
        fs::write(&options.report, "stale").unwrap();
        let report = options.report.clone();

        DiffGenerator::start(bus, options).unwrap().stop();

        assert_eq!(fs::read_to_string(report).unwrap(), "");
    }

    #[test]
    fn test_stop_waits_for_all_diffs() {
        let (dir, bus, options) = setup();
        let report = options.report.clone();
        let pages: Vec<String> = (0..50).map(|i| format!("p{i}.html")).collect();
        let old: Vec<(&str, &str)> = pages.iter().map(|p| (p.as_str(), "old\n")).collect();
        let new: Vec<(&str, &str)> = pages.iter().map(|p| (p.as_str(), "new\n")).collect();
        write(&bus, dir.path(), &old);

        let generator = DiffGenerator::start(Arc::clone(&bus), options).unwrap();
        write(&bus, dir.path(), &new);
        let summary = generator.stop();

        assert_eq!(summary.written, 50);
        let text = fs::read_to_string(report).unwrap();
        assert_eq!(text.matches("-old\n+new\n").count(), 50);
    }

    #[test]
    fn test_stop_unsubscribes() {
        let (_dir, bus, options) = setup();
        let generator = DiffGenerator::start(Arc::clone(&bus), options).unwrap();
        assert_eq!(bus.subscriber_count(EventKind::WriteEnded), 1);

        drop(generator);

        assert_eq!(bus.subscriber_count(EventKind::WriteStarted), 0);
        assert_eq!(bus.subscriber_count(EventKind::WriteEnded), 0);
    }

    #[test]
    fn test_options_show_paths_relative_to_working_directory() {
        let options = DiffOptions::new("/site");

        assert_eq!(options.report, Path::new("/site").join(REPORT_FILE));
        assert_eq!(options.base_dir, std::env::current_dir().unwrap());
    }

    #[test]
    fn test_failed_write_is_abandoned_at_stop() {
        let (dir, bus, options) = setup();
        let generator = DiffGenerator::start(Arc::clone(&bus), options).unwrap();
        let writer = ItemRepWriter::new(Arc::clone(&bus), &dir.path().join("tmp"));
        let rep = ItemRep::new("/lost.html", "default")
            .with_snapshot("last")
            .with_raw_path("last", dir.path().join("out/lost.html"));

        // Nothing compiled: the write fails after it started
        assert!(writer.write_all(&rep, &CompiledContentStore::new()).is_err());
        assert_eq!(generator.pending.len(), 1);

        let pending = Arc::clone(&generator.pending);
        let summary = generator.stop();

        assert_eq!(summary.abandoned, 1);
        assert_eq!(summary.written, 0);
        assert!(pending.is_empty());
    }
}
