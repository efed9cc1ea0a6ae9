#![deny(missing_docs)]

//! # Merge Writer
//!
//! Applies rendered region content to disk.
//!
//! - **create**: a new file holding only the region.
//! - **update**: replaces the bytes strictly between the begin and end marker
//!   lines. Every byte outside the region is preserved.
//! - **mark_obsolete**: inserts the obsolete annotation inside the region.
//! - **prune**: removes an obsolete artifact.
//!
//! All mutation goes through `atomic` (temp file + rename, one retry on
//! transient errors) under a per-path lock. In dry-run mode the resulting
//! content is computed and conflicts are detected, but nothing is written.

pub mod atomic;
pub mod locks;

pub use locks::PathLocks;

use crate::contract::EndpointId;
use crate::error::{AppResult, SyncError};
use crate::markers::{parse_header, MarkerStyle, Region};
use atomic::{write_atomic, Mode};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Content after a write (or what it would be, in dry-run mode).
#[derive(Debug, Clone, PartialEq)]
pub struct Written {
    /// Full file content.
    pub content: String,
    /// Whether the file bytes changed (or would change).
    pub changed: bool,
}

/// Applies generated regions for one run.
#[derive(Debug)]
pub struct MergeWriter {
    style: MarkerStyle,
    dry_run: bool,
    locks: PathLocks,
}

impl MergeWriter {
    /// Creates a writer for a marker style.
    pub fn new(style: MarkerStyle, dry_run: bool) -> Self {
        Self {
            style,
            dry_run,
            locks: PathLocks::new(),
        }
    }

    /// Whether mutations are suppressed.
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Writes a new artifact. Never overwrites an existing file.
    pub fn create(&self, path: &Path, file_name: &str, inner: &str) -> AppResult<Written> {
        let content = self.style.wrap(inner);
        self.locks.with_lock(path, || {
            if self.dry_run {
                return Ok(Written {
                    content,
                    changed: true,
                });
            }
            write_atomic(path, &content, Mode::CreateNew).map_err(|e| file_error(file_name, e))?;
            debug!(file = %file_name, "created");
            Ok(Written {
                content,
                changed: true,
            })
        })
    }

    /// Replaces the generated region of an existing artifact.
    pub fn update(
        &self,
        path: &Path,
        file_name: &str,
        endpoint: &EndpointId,
        inner: &str,
    ) -> AppResult<Written> {
        self.locks.with_lock(path, || {
            let current = read(path, file_name)?;
            let region = self.locate(&current, endpoint, file_name)?;
            let content = splice(&current, &region, inner);
            self.commit(path, file_name, current, content)
        })
    }

    /// Annotates an artifact as obsolete. A no-op when already annotated.
    pub fn mark_obsolete(
        &self,
        path: &Path,
        file_name: &str,
        endpoint: &EndpointId,
    ) -> AppResult<Written> {
        self.locks.with_lock(path, || {
            let current = read(path, file_name)?;
            let region = self.locate(&current, endpoint, file_name)?;
            let inner = &current[region.inner.clone()];
            if parse_header(inner).is_some_and(|h| h.obsolete) {
                return Ok(Written {
                    content: current,
                    changed: false,
                });
            }
            let annotated = format!("{}\n{}", self.style.obsolete_line(), inner);
            let content = splice(&current, &region, &annotated);
            self.commit(path, file_name, current, content)
        })
    }

    /// Removes an artifact.
    pub fn prune(&self, path: &Path, file_name: &str) -> AppResult<()> {
        self.locks.with_lock(path, || {
            if self.dry_run {
                return Ok(());
            }
            atomic::remove(path).map_err(|e| file_error(file_name, e))?;
            debug!(file = %file_name, "pruned");
            Ok(())
        })
    }

    fn locate(&self, content: &str, endpoint: &EndpointId, file_name: &str) -> AppResult<Region> {
        self.style.locate(content).ok_or_else(|| {
            let err = SyncError::ManualOverrideConflict {
                endpoint: endpoint.to_string(),
                file: file_name.to_string(),
            };
            warn!("{}", err);
            err
        })
    }

    fn commit(
        &self,
        path: &Path,
        file_name: &str,
        current: String,
        content: String,
    ) -> AppResult<Written> {
        let changed = content != current;
        if changed && !self.dry_run {
            write_atomic(path, &content, Mode::Replace).map_err(|e| file_error(file_name, e))?;
            debug!(file = %file_name, "region replaced");
        }
        Ok(Written { content, changed })
    }
}

/// Replaces `region.inner` of `content` with `inner`.
pub fn splice(content: &str, region: &Region, inner: &str) -> String {
    let mut out = String::with_capacity(content.len() + inner.len());
    out.push_str(&content[..region.inner.start]);
    out.push_str(inner);
    if !inner.is_empty() && !inner.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&content[region.inner.end..]);
    out
}

fn read(path: &Path, file_name: &str) -> AppResult<String> {
    atomic::with_retry(|| fs::read_to_string(path)).map_err(|e| file_error(file_name, e))
}

fn file_error(file_name: &str, source: std::io::Error) -> SyncError {
    SyncError::FileWrite {
        file: file_name.to_string(),
        source,
    }
}
