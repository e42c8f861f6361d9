//! Versioned JSON envelopes for cache files.
//!
//! ```text
//! { "version": 1, "data": { ... } }
//! ```
//!
//! Stores go through a temp file in the same directory and a rename, so a
//! crash never leaves a truncated cache file behind.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::CacheError;

#[derive(Deserialize)]
struct Header {
    version: u32,
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    data: &'a T,
}

/// Load a versioned cache file.
///
/// Returns `Ok(None)` when the file does not exist or was written with a
/// different format version. Unreadable or malformed files are errors.
pub fn load_versioned<T: DeserializeOwned>(
    path: &Path,
    version: u32,
) -> Result<Option<T>, CacheError> {
    if !path.exists() {
        return Ok(None);
    }

    let json = fs::read_to_string(path).map_err(|e| CacheError::Read(path.to_path_buf(), e))?;

    let header: Header =
        serde_json::from_str(&json).map_err(|e| CacheError::Parse(path.to_path_buf(), e))?;
    if header.version != version {
        crate::debug!(
            "cache";
            "ignoring {} (version {}, expected {})",
            path.display(),
            header.version,
            version
        );
        return Ok(None);
    }

    let envelope: Envelope<T> =
        serde_json::from_str(&json).map_err(|e| CacheError::Parse(path.to_path_buf(), e))?;
    Ok(Some(envelope.data))
}

/// Atomically store a versioned cache file, creating parent directories.
pub fn store_versioned<T: Serialize>(path: &Path, version: u32, data: &T) -> Result<(), CacheError> {
    let write_err = |e| CacheError::Write(path.to_path_buf(), e);

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(write_err)?;

    let temp = NamedTempFile::new_in(dir).map_err(write_err)?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        serde_json::to_writer(&mut writer, &EnvelopeRef { version, data })
            .map_err(|e| CacheError::Serialize(path.to_path_buf(), e))?;
        writer.flush().map_err(write_err)?;
    }

    temp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
