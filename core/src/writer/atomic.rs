//! Temp-file + rename writes with a single retry on transient failures.

use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::warn;

/// How an atomic write treats an existing destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Fail with `AlreadyExists` if the destination exists.
    CreateNew,
    /// Replace the destination, keeping its permissions.
    Replace,
}

/// Errors worth one more attempt.
pub fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
    )
}

/// Runs `op`, retrying once when the first failure is transient.
pub fn with_retry<T>(mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    match op() {
        Err(e) if is_transient(&e) => {
            warn!(error = %e, "transient I/O failure, retrying once");
            op()
        }
        other => other,
    }
}

/// Writes `content` to `path` through a sibling temp file and a rename.
///
/// Readers observe either the old bytes or the new bytes, never a mix.
pub fn write_atomic(path: &Path, content: &str, mode: Mode) -> io::Result<()> {
    with_retry(|| write_once(path, content, mode))
}

fn write_once(path: &Path, content: &str, mode: Mode) -> io::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;

    match mode {
        Mode::CreateNew => {
            tmp.persist_noclobber(path).map_err(|e| e.error)?;
        }
        Mode::Replace => {
            if let Ok(meta) = fs::metadata(path) {
                fs::set_permissions(tmp.path(), meta.permissions())?;
            }
            tmp.persist(path).map_err(|e| e.error)?;
        }
    }
    Ok(())
}

/// Removes a file, retrying once on transient failures.
pub fn remove(path: &Path) -> io::Result<()> {
    with_retry(|| fs::remove_file(path))
}
