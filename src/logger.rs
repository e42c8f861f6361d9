//! Logging utilities with colored output.
//!
//! This module provides:
//! - `log!` macro for formatted terminal output with colored prefixes
//! - `debug!` macro for output only shown in verbose mode
//!
//! # Example
//!
//! ```ignore
//! log!("create"; "[{:.2}s] {}", secs, path.display());
//! debug!("cache"; "loaded {} entries", count);
//! ```

use crossterm::{
    execute,
    terminal::{Clear, ClearType},
};
use owo_colors::OwoColorize;
use std::{
    io::{Write, stdout},
    sync::atomic::{AtomicBool, Ordering},
};

/// Global verbose flag
static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Width of the action column, so `create`/`update`/`identical` line up
const PREFIX_WIDTH: usize = 11;

/// Set verbose mode globally
pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

/// Check if verbose mode is enabled
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Log a debug message (only shown when verbose mode is enabled)
///
/// # Usage
/// ```ignore
/// debug!("module"; "debug info: {}", value);
/// ```
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Log a message with a colored module prefix
#[inline]
pub fn log(module: &str, message: &str) {
    let module_lower = module.to_ascii_lowercase();
    let prefix = colorize_prefix(module, &module_lower);

    let mut stdout = stdout().lock();
    execute!(stdout, Clear(ClearType::UntilNewLine)).ok();
    writeln!(stdout, "{prefix} {message}").ok();
    stdout.flush().ok();
}

/// Apply color to a module prefix based on module type
///
/// File actions are padded so the paths that follow form a column.
#[inline]
fn colorize_prefix(module: &str, module_lower: &str) -> String {
    match module_lower {
        "create" => pad(module).bright_green().bold().to_string(),
        "update" => pad(module).bright_yellow().bold().to_string(),
        "identical" => pad(module).dimmed().to_string(),
        "error" => format!("[{module}]").bright_red().bold().to_string(),
        _ => format!("[{module}]").bright_blue().bold().to_string(),
    }
}

fn pad(action: &str) -> String {
    format!("{action:>PREFIX_WIDTH$}")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_aligns_actions() {
        assert_eq!(pad("create").len(), PREFIX_WIDTH);
        assert_eq!(pad("identical").len(), PREFIX_WIDTH);
        assert!(pad("update").ends_with("update"));
    }

    #[test]
    fn test_prefix_keeps_module_name() {
        assert!(colorize_prefix("cache", "cache").contains("[cache]"));
        assert!(colorize_prefix("create", "create").contains("create"));
    }
}
