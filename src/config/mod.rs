//! `[output]` section configuration.
//!
//! Read from the site's TOML configuration; every other section of the
//! document is ignored here.
//!
//! # Example
//!
//! ```toml
//! [output]
//! cache_dir = ".tola/cache"   # Compiled content cache, relative to the root
//! temp_dir = ".tola/tmp"      # Private temp files (same filesystem as output)
//! verbose = false             # Also log identical files and debug output
//! log_actions = true          # Print create/update lines while writing
//!
//! [output.diff]
//! enable = false              # Write a unified diff of changed pages
//! file = "output.diff"        # Report file, relative to the root
//! workers = 0                 # Diff threads (0 = available parallelism)
//! ```

mod error;

pub use error::ConfigError;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cache::CACHE_DIR;
use crate::diff::REPORT_FILE;

/// Default temp directory, relative to the root
pub const TEMP_DIR: &str = ".tola/tmp";

/// Output writing, caching and reporting settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Compiled content cache directory.
    pub cache_dir: PathBuf,

    /// Temp directory for materialized textual content.
    pub temp_dir: PathBuf,

    /// Enable verbose logging.
    pub verbose: bool,

    /// Print one line per created or updated file.
    pub log_actions: bool,

    /// Diff report settings.
    pub diff: DiffConfig,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(CACHE_DIR),
            temp_dir: PathBuf::from(TEMP_DIR),
            verbose: false,
            log_actions: true,
            diff: DiffConfig::default(),
        }
    }
}

/// `[output.diff]` settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiffConfig {
    pub enable: bool,
    pub file: PathBuf,
    /// `0` picks the available parallelism.
    pub workers: usize,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            enable: false,
            file: PathBuf::from(REPORT_FILE),
            workers: 0,
        }
    }
}

/// Whole configuration document; only `[output]` is read.
#[derive(Debug, Default, Deserialize)]
struct Document {
    #[serde(default)]
    output: OutputConfig,
}

impl OutputConfig {
    /// Parse the `[output]` section of a TOML document and validate it.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let document: Document = toml::from_str(content)?;
        document.output.validate()?;
        Ok(document.output)
    }

    /// Load from a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err(ConfigError::validation("output.cache_dir", "must not be empty"));
        }
        if self.temp_dir.as_os_str().is_empty() {
            return Err(ConfigError::validation("output.temp_dir", "must not be empty"));
        }
        if self.cache_dir == self.temp_dir {
            return Err(ConfigError::validation(
                "output.temp_dir",
                "must differ from output.cache_dir, it is cleared after every run",
            ));
        }
        if self.diff.file.as_os_str().is_empty() {
            return Err(ConfigError::validation("output.diff.file", "must not be empty"));
        }
        Ok(())
    }

    /// Number of diff workers to spawn.
    pub fn diff_workers(&self) -> usize {
        match self.diff.workers {
            0 => crate::diff::default_workers(),
            n => n,
        }
    }
}
