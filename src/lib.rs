//! Tola output - writes compiled content to disk, caches it across runs and
//! reports what changed.
//!
//! ```text
//! upstream compile → CompiledContentStore ─┐
//!                                          ├→ ItemRepWriter → disk
//! CompiledContentCache (load / store) ─────┘        │
//!                                         NotificationCenter
//!                                          ├→ DiffGenerator → output.diff
//!                                          └→ FileActionPrinter → terminal
//! ```

pub mod logger;

pub mod cache;
pub mod config;
pub mod content;
pub mod diff;
pub mod notify;
pub mod progress;
pub mod rep;
pub mod run;
pub mod store;
pub mod writer;

pub use cache::{CacheError, CompiledContentCache};
pub use config::{ConfigError, OutputConfig};
pub use content::{Content, ContentError};
pub use diff::{DiffGenerator, DiffOptions, DiffSummary};
pub use notify::{Event, EventKind, NotificationCenter, SubscriptionId};
pub use progress::{ActionSummary, FileActionPrinter};
pub use rep::{ItemRep, RepId, SnapshotDef};
pub use run::{OutputRun, RunSummary};
pub use store::{CompiledContentStore, SnapshotContents};
pub use writer::{ItemRepWriter, PlatformTransfer, Transfer, WriteError, WriteOutcome};
