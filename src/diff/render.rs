//! Unified diff rendering.

use std::fmt::Write;
use std::path::Path;

use similar::{Algorithm, TextDiff};

/// Lines of unchanged context around each change
pub const CONTEXT_LINES: usize = 3;

/// Render a unified diff of two texts under a `--- label` / `+++ label`
/// header.
///
/// Line-based LCS diff; hunks closer than twice the context are merged.
/// Returns an empty string when the texts have the same lines.
pub fn render_unified(label: &str, old: &str, new: &str) -> String {
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Lcs)
        .diff_lines(old, new);

    let mut out = String::new();
    let mut unified = diff.unified_diff();
    unified.context_radius(CONTEXT_LINES).header(label, label);
    // Writing into a String cannot fail
    let _ = write!(out, "{unified}");
    out
}

/// Path as shown in a diff header: relative to `base` when inside it,
/// otherwise unchanged.
pub fn display_path(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .ok()
        .filter(|rel| !rel.as_os_str().is_empty())
        .unwrap_or(path)
        .display()
        .to_string()
}
