use super::*;

use std::fs::File;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use tempfile::TempDir;

use crate::notify::EventKind;

struct Fixture {
    dir: TempDir,
    bus: Arc<NotificationCenter>,
    store: CompiledContentStore,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            bus: Arc::new(NotificationCenter::new()),
            store: CompiledContentStore::new(),
        }
    }

    fn out(&self, name: &str) -> PathBuf {
        self.dir.path().join("output").join(name)
    }

    fn writer(&self) -> ItemRepWriter {
        ItemRepWriter::new(Arc::clone(&self.bus), &self.dir.path().join("tmp"))
    }

    /// Rep `/page.md` with one `last` snapshot written to `path`.
    fn text_rep(&self, path: &Path, text: &str) -> ItemRep {
        let rep = ItemRep::new("/page.md", "default")
            .with_snapshot("last")
            .with_raw_path("last", path);
        self.store.set(rep.id(), "last", Content::textual(text));
        rep
    }

    /// Record `kind:path` of every event published on the bus.
    fn record(&self) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        for kind in [EventKind::WriteStarted, EventKind::ReadyForDiff, EventKind::WriteEnded] {
            let seen = Arc::clone(&seen);
            self.bus.subscribe(kind, move |event| {
                let path = match event {
                    Event::WriteStarted { path, .. }
                    | Event::ReadyForDiff { path, .. }
                    | Event::WriteEnded { path, .. } => path,
                };
                let name = path.file_name().unwrap().to_string_lossy().into_owned();
                seen.lock().push(format!("{:?}:{name}", event.kind()));
            });
        }
        seen
    }
}

/// Hardlinks always fail as if across filesystems; counts fallback copies.
#[derive(Default)]
struct CrossDevice {
    copies: Arc<AtomicUsize>,
}

impl Transfer for CrossDevice {
    fn hard_link(&self, _src: &Path, _dst: &Path) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::CrossesDevices))
    }

    fn copy(&self, src: &Path, dst: &Path) -> io::Result<()> {
        self.copies.fetch_add(1, Ordering::SeqCst);
        fs::copy(src, dst).map(drop)
    }
}

struct Broken;

impl Transfer for Broken {
    fn hard_link(&self, _src: &Path, _dst: &Path) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::StorageFull))
    }
}

/// Clone-capable filesystem; counts which strategy ran.
#[derive(Default)]
struct Cloning {
    /// Whether the filesystem actually clones
    clones: bool,
    cloned: Arc<AtomicUsize>,
    linked: Arc<AtomicUsize>,
}

impl Transfer for Cloning {
    fn supports_clone(&self) -> bool {
        true
    }

    fn try_clone_file(&self, src: &Path, dst: &Path) -> io::Result<bool> {
        if !self.clones {
            return Ok(false);
        }
        self.cloned.fetch_add(1, Ordering::SeqCst);
        fs::copy(src, dst)?;
        Ok(true)
    }

    fn hard_link(&self, src: &Path, dst: &Path) -> io::Result<()> {
        self.linked.fetch_add(1, Ordering::SeqCst);
        fs::hard_link(src, dst)
    }
}

/// Rep `/data.bin` backed by a file holding `bytes`.
fn binary_rep(fx: &Fixture, bytes: &[u8]) -> (ItemRep, PathBuf) {
    let path = fx.out("data.bin");
    let backing = fx.dir.path().join("data.bin");
    fs::write(&backing, bytes).unwrap();
    let rep = ItemRep::new("/data.bin", "default")
        .with_snapshot("last")
        .with_raw_path("last", &path);
    fx.store.set(rep.id(), "last", Content::binary(&backing));
    (rep, path)
}

/// Entries of the output directory, staged files included.
fn output_entries(fx: &Fixture) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(fx.dir.path().join("output"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_creates_file_with_content() {
    let fx = Fixture::new();
    let path = fx.out("index.html");
    let rep = fx.text_rep(&path, "<p>hello</p>");

    let outcomes = fx.writer().write_all(&rep, &fx.store).unwrap();

    assert_eq!(
        outcomes,
        vec![(path.clone(), WriteOutcome::Written { created: true, modified: true })]
    );
    assert_eq!(fs::read_to_string(&path).unwrap(), "<p>hello</p>");
    assert!(rep.modified());
}

#[test]
fn test_duplicate_raw_path_written_once() {
    let fx = Fixture::new();
    let path = fx.out("index.html");
    let rep = fx
        .text_rep(&path, "first")
        .with_snapshot("pre")
        .with_raw_path("pre", &path)
        .with_raw_path("last", &path);
    fx.store.set(rep.id(), "pre", Content::textual("pre"));
    let seen = fx.record();

    let outcomes = fx.writer().write_all(&rep, &fx.store).unwrap();

    let skipped = outcomes
        .iter()
        .filter(|(_, outcome)| *outcome == WriteOutcome::Skipped)
        .count();
    assert_eq!(outcomes.len(), 3);
    assert_eq!(skipped, 2);
    assert_eq!(seen.lock().len(), 2);
    // `last` is defined first, so it wins
    assert_eq!(fs::read_to_string(&path).unwrap(), "first");
}

#[test]
fn test_is_created_only_when_absent() {
    let fx = Fixture::new();
    let path = fx.out("about/index.html");
    let rep = fx.text_rep(&path, "v1");
    assert_eq!(
        fx.writer().write_all(&rep, &fx.store).unwrap()[0].1,
        WriteOutcome::Written { created: true, modified: true }
    );

    fx.store.set(rep.id(), "last", Content::textual("v2"));
    assert_eq!(
        fx.writer().write_all(&rep, &fx.store).unwrap()[0].1,
        WriteOutcome::Written { created: false, modified: true }
    );
    assert_eq!(fs::read_to_string(&path).unwrap(), "v2");
}

#[test]
fn test_identical_content_not_modified_after_touch() {
    let fx = Fixture::new();
    let path = fx.out("index.html");
    let rep = fx.text_rep(&path, "same");
    fx.writer().write_all(&rep, &fx.store).unwrap();

    let old = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
    File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(old)
        .unwrap();

    let outcome = fx.writer().write_all(&rep, &fx.store).unwrap();

    assert_eq!(
        outcome[0].1,
        WriteOutcome::Written { created: false, modified: false }
    );
    assert!(!rep.modified());
    // Untouched destination keeps its old mtime
    assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), old);
}

#[test]
fn test_ready_for_diff_only_for_changed_text() {
    let fx = Fixture::new();
    let path = fx.out("page.html");
    let rep = fx.text_rep(&path, "a\nb\n");
    let diffs = Arc::new(Mutex::new(Vec::new()));
    {
        let diffs = Arc::clone(&diffs);
        fx.bus.subscribe(EventKind::ReadyForDiff, move |event| {
            if let Event::ReadyForDiff { old, new, .. } = event {
                diffs.lock().push((old.to_string(), new.to_string()));
            }
        });
    }

    // Creation
    fx.writer().write_all(&rep, &fx.store).unwrap();
    // Unchanged
    fx.writer().write_all(&rep, &fx.store).unwrap();
    assert!(diffs.lock().is_empty());

    fx.store.set(rep.id(), "last", Content::textual("a\nc\n"));
    fx.writer().write_all(&rep, &fx.store).unwrap();

    assert_eq!(
        *diffs.lock(),
        vec![("a\nb\n".to_string(), "a\nc\n".to_string())]
    );
}

#[test]
fn test_binary_never_ready_for_diff() {
    let fx = Fixture::new();
    let path = fx.out("logo.png");
    let backing = fx.dir.path().join("logo-v1.png");
    fs::write(&backing, [1u8, 2, 3]).unwrap();
    let rep = ItemRep::new("/logo.png", "default")
        .with_snapshot("last")
        .with_raw_path("last", &path);
    fx.store.set(rep.id(), "last", Content::binary(&backing));
    let seen = fx.record();

    fx.writer().write_all(&rep, &fx.store).unwrap();
    let changed = fx.dir.path().join("logo-v2.png");
    fs::write(&changed, [4u8, 5, 6]).unwrap();
    fx.store.set(rep.id(), "last", Content::binary(&changed));
    let outcome = fx.writer().write_all(&rep, &fx.store).unwrap();

    assert!(outcome[0].1.is_modified());
    assert_eq!(fs::read(&path).unwrap(), [4u8, 5, 6]);
    assert!(seen.lock().iter().all(|event| !event.starts_with("ReadyForDiff")));
    // Backing file is untouched
    assert_eq!(fs::read(&backing).unwrap(), [1u8, 2, 3]);
}

#[test]
fn test_event_order() {
    let fx = Fixture::new();
    let path = fx.out("page.html");
    let rep = fx.text_rep(&path, "old");
    fx.writer().write_all(&rep, &fx.store).unwrap();

    let seen = fx.record();
    fx.store.set(rep.id(), "last", Content::textual("new"));
    fx.writer().write_all(&rep, &fx.store).unwrap();

    assert_eq!(
        *seen.lock(),
        vec![
            "WriteStarted:page.html",
            "ReadyForDiff:page.html",
            "WriteEnded:page.html",
        ]
    );
}

#[test]
fn test_relative_path_rejected() {
    let fx = Fixture::new();
    let rep = fx.text_rep(Path::new("output/index.html"), "x");

    let err = fx.writer().write_all(&rep, &fx.store).unwrap_err();

    assert!(matches!(err, WriteError::RelativePath(_)));
    assert_eq!(err.path(), Path::new("output/index.html"));
}

#[test]
fn test_missing_content_rejected() {
    let fx = Fixture::new();
    let path = fx.out("index.html");
    let rep = ItemRep::new("/page.md", "default")
        .with_snapshot("last")
        .with_raw_path("last", &path);

    let err = fx.writer().write_all(&rep, &fx.store).unwrap_err();

    assert!(matches!(
        err,
        WriteError::MissingContent { ref snapshot, .. } if snapshot == "last"
    ));
    assert!(!path.exists());
}

#[test]
fn test_cross_device_falls_back_to_copy() {
    let fx = Fixture::new();
    let path = fx.out("index.html");
    let rep = fx.text_rep(&path, "copied bytes");
    let transfer = CrossDevice::default();
    let copies = Arc::clone(&transfer.copies);

    fx.writer()
        .with_transfer(transfer)
        .write_all(&rep, &fx.store)
        .unwrap();

    assert_eq!(copies.load(Ordering::SeqCst), 1);
    assert_eq!(fs::read_to_string(&path).unwrap(), "copied bytes");
}

#[test]
fn test_other_link_errors_are_fatal() {
    let fx = Fixture::new();
    let path = fx.out("index.html");
    let rep = fx.text_rep(&path, "x");

    let err = fx
        .writer()
        .with_transfer(Broken)
        .write_all(&rep, &fx.store)
        .unwrap_err();

    assert!(matches!(err, WriteError::Io(ref p, _) if *p == path));
}

#[cfg(unix)]
#[test]
fn test_binary_output_is_hardlinked_when_not_cloned() {
    use std::os::unix::fs::MetadataExt;

    struct LinkOnly;
    impl Transfer for LinkOnly {}

    let fx = Fixture::new();
    let path = fx.out("data.bin");
    let backing = fx.dir.path().join("data.bin");
    fs::write(&backing, b"payload").unwrap();
    let rep = ItemRep::new("/data.bin", "default")
        .with_snapshot("last")
        .with_raw_path("last", &path);
    fx.store.set(rep.id(), "last", Content::binary(&backing));

    fx.writer()
        .with_transfer(LinkOnly)
        .write_all(&rep, &fx.store)
        .unwrap();

    assert_eq!(
        fs::metadata(&path).unwrap().ino(),
        fs::metadata(&backing).unwrap().ino()
    );
}

#[test]
fn test_shared_writer_same_path_concurrently() {
    let fx = Fixture::new();
    let path = fx.out("shared.html");
    let writer = fx.writer();
    let reps: Vec<ItemRep> = (0..8)
        .map(|i| {
            let rep = ItemRep::new(format!("/item{i}.md"), "default")
                .with_snapshot("last")
                .with_raw_path("last", &path);
            fx.store
                .set(rep.id(), "last", Content::textual(format!("writer {i}\n").repeat(1000)));
            rep
        })
        .collect();

    let (writer, store) = (&writer, &fx.store);
    let outcomes: Vec<WriteOutcome> = std::thread::scope(|scope| {
        let handles: Vec<_> = reps
            .iter()
            .map(|rep| scope.spawn(move || writer.write_all(rep, store).unwrap()[0].1))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let written = outcomes
        .iter()
        .filter(|outcome| **outcome != WriteOutcome::Skipped)
        .count();
    assert_eq!(written, 1);

    let text = fs::read_to_string(&path).unwrap();
    let first_line = text.lines().next().unwrap().to_string();
    assert_eq!(text, format!("{first_line}\n").repeat(1000));
    assert_eq!(writer.written_paths().len(), 1);
}

#[test]
fn test_binary_output_is_cloned_when_supported() {
    let fx = Fixture::new();
    let (rep, path) = binary_rep(&fx, b"payload");
    let transfer = Cloning {
        clones: true,
        ..Cloning::default()
    };
    let (cloned, linked) = (Arc::clone(&transfer.cloned), Arc::clone(&transfer.linked));

    fx.writer()
        .with_transfer(transfer)
        .write_all(&rep, &fx.store)
        .unwrap();

    assert_eq!(cloned.load(Ordering::SeqCst), 1);
    assert_eq!(linked.load(Ordering::SeqCst), 0);
    assert_eq!(fs::read(&path).unwrap(), b"payload");
}

#[test]
fn test_unclonable_filesystem_falls_back_to_hardlink() {
    let fx = Fixture::new();
    let (rep, path) = binary_rep(&fx, b"payload");
    let transfer = Cloning::default();
    let (cloned, linked) = (Arc::clone(&transfer.cloned), Arc::clone(&transfer.linked));

    fx.writer()
        .with_transfer(transfer)
        .write_all(&rep, &fx.store)
        .unwrap();

    assert_eq!(cloned.load(Ordering::SeqCst), 0);
    assert_eq!(linked.load(Ordering::SeqCst), 1);
    assert_eq!(fs::read(&path).unwrap(), b"payload");
}

#[test]
fn test_failed_write_keeps_previous_destination() {
    let fx = Fixture::new();
    let path = fx.out("index.html");
    let rep = fx.text_rep(&path, "old");
    fx.writer().write_all(&rep, &fx.store).unwrap();

    fx.store.set(rep.id(), "last", Content::textual("new"));
    let err = fx
        .writer()
        .with_transfer(Broken)
        .write_all(&rep, &fx.store)
        .unwrap_err();

    assert!(matches!(err, WriteError::Io(..)));
    assert_eq!(fs::read_to_string(&path).unwrap(), "old");
    assert_eq!(output_entries(&fx), vec!["index.html"]);
}

#[test]
fn test_replaced_destination_leaves_no_staged_files() {
    let fx = Fixture::new();
    let path = fx.out("index.html");
    let rep = fx.text_rep(&path, "v1");
    fx.writer().write_all(&rep, &fx.store).unwrap();

    fx.store.set(rep.id(), "last", Content::textual("v2"));
    fx.writer().write_all(&rep, &fx.store).unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "v2");
    assert_eq!(output_entries(&fx), vec!["index.html"]);
}
