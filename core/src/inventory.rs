#![deny(missing_docs)]

//! # Artifact Inventory
//!
//! Scans the target directory and recovers, from each managed file's marker
//! region, which endpoint it covers and which fingerprint it was generated
//! from. No other state exists between runs.
//!
//! Files following the strategy's naming convention but lacking an identity
//! line are foreign: they are never touched, but their names stay reserved.
//! A file whose identity line survives but whose begin/end markers do not is
//! still managed; its `region` is `None` and any write to it is a conflict.
//! Files or directories that cannot be read are reported as warnings and
//! their names stay reserved; what they cover is unknown.

use crate::contract::EndpointId;
use crate::error::{AppResult, SyncError};
use crate::fingerprint::Fingerprint;
use crate::generator::TestType;
use crate::markers::{parse_header, Region};
use crate::strategies::TestStrategy;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// One managed file on disk.
#[derive(Debug, Clone)]
pub struct ArtifactRecord {
    /// Path relative to the scanned root, `/` separated.
    pub file_name: String,
    /// Absolute (or root-joined) path.
    pub path: PathBuf,
    /// Recovered endpoint identity.
    pub endpoint: EndpointId,
    /// Recovered fingerprint.
    pub fingerprint: Fingerprint,
    /// Recorded test-type tag.
    pub test_type: Option<TestType>,
    /// Recorded generation-options digest.
    pub options: Option<String>,
    /// Whether the region is annotated obsolete.
    pub obsolete: bool,
    /// Byte ranges of the generated region at scan time; `None` when the
    /// markers are damaged.
    pub region: Option<Region>,
    /// Last-modified time, when the platform reports one.
    pub modified: Option<SystemTime>,
    /// File content at scan time.
    pub content: String,
}

/// Result of a directory scan.
#[derive(Debug, Default)]
pub struct Inventory {
    /// Canonical artifact per endpoint.
    pub records: BTreeMap<EndpointId, ArtifactRecord>,
    /// `DuplicateArtifact` and `UnreadableArtifact` warnings.
    pub warnings: Vec<SyncError>,
    /// Every file name present (managed, duplicate, foreign or unreadable).
    pub taken_names: BTreeSet<String>,
    /// Reason per file name that could not be read.
    pub unreadable: BTreeMap<String, String>,
}

impl Inventory {
    /// Canonical artifact for an endpoint.
    pub fn get(&self, id: &EndpointId) -> Option<&ArtifactRecord> {
        self.records.get(id)
    }

    /// Whether a file name is already used in the target directory.
    pub fn is_taken(&self, name: &str) -> bool {
        self.taken_names.contains(name)
    }

    /// Why a file could not be read, if it could not.
    pub fn unreadable_reason(&self, name: &str) -> Option<&str> {
        self.unreadable.get(name).map(String::as_str)
    }

    fn mark_unreadable(&mut self, file_name: String, reason: String) {
        let err = SyncError::UnreadableArtifact {
            file: file_name.clone(),
            reason: reason.clone(),
        };
        warn!("{}", err);
        self.warnings.push(err);
        self.taken_names.insert(file_name.clone());
        self.unreadable.insert(file_name, reason);
    }
}

/// Scans `root` for artifacts rendered by `strategy`.
///
/// A missing directory yields an empty inventory. With `recursive`, nested
/// directories are scanned too; otherwise only the top level.
pub fn scan(root: &Path, strategy: &dyn TestStrategy, recursive: bool) -> AppResult<Inventory> {
    if !root.exists() {
        debug!(root = %root.display(), "target directory missing, starting empty");
        return Ok(Inventory::default());
    }
    if !root.is_dir() {
        return Err(SyncError::General(format!(
            "Target path is not a directory: {:?}",
            root
        )));
    }

    let mut inventory = Inventory::default();
    let mut candidates = Vec::new();

    let max_depth = if recursive { usize::MAX } else { 1 };
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let name = e
                    .path()
                    .and_then(|p| relative_name(root, p))
                    .unwrap_or_else(|| ".".to_string());
                inventory.mark_unreadable(name, e.to_string());
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(file_name) = relative_name(root, path) else {
            continue;
        };
        inventory.taken_names.insert(file_name.clone());

        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| strategy.matches_file_name(n));
        if matches {
            candidates.push((file_name, path.to_path_buf()));
        }
    }

    let scanned: Vec<(String, std::io::Result<Option<ArtifactRecord>>)> = candidates
        .into_par_iter()
        .map(|(file_name, path)| (file_name.clone(), read_record(strategy, file_name, path)))
        .collect();

    let mut records = Vec::with_capacity(scanned.len());
    for (file_name, result) in scanned {
        match result {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(e) => inventory.mark_unreadable(file_name, e.to_string()),
        }
    }
    records.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    let mut grouped: BTreeMap<EndpointId, Vec<ArtifactRecord>> = BTreeMap::new();
    for record in records {
        grouped.entry(record.endpoint.clone()).or_default().push(record);
    }

    for (endpoint, mut group) in grouped {
        if group.len() > 1 {
            let files: Vec<&str> = group.iter().map(|r| r.file_name.as_str()).collect();
            let err = SyncError::DuplicateArtifact {
                endpoint: endpoint.to_string(),
                files: files.join(", "),
            };
            warn!("{}", err);
            inventory.warnings.push(err);
        }
        // Lexicographically first file name wins.
        let canonical = group.swap_remove(0);
        inventory.records.insert(endpoint, canonical);
    }

    debug!(
        managed = inventory.records.len(),
        files = inventory.taken_names.len(),
        unreadable = inventory.unreadable.len(),
        "inventory scanned"
    );
    Ok(inventory)
}

/// `Ok(None)` for foreign files; IO failures are left to the caller.
fn read_record(
    strategy: &dyn TestStrategy,
    file_name: String,
    path: PathBuf,
) -> std::io::Result<Option<ArtifactRecord>> {
    let bytes = fs::read(&path)?;
    let Ok(content) = String::from_utf8(bytes) else {
        debug!(file = %file_name, "non UTF-8 file treated as foreign");
        return Ok(None);
    };
    let region = strategy.markers().locate(&content);
    let header = match &region {
        Some(r) => parse_header(&content[r.inner.clone()]),
        None => parse_header(&content),
    };
    let Some(header) = header else {
        return Ok(None);
    };
    if region.is_none() {
        warn!(file = %file_name, endpoint = %header.endpoint, "generated markers damaged");
    }
    let modified = fs::metadata(&path).and_then(|m| m.modified()).ok();

    Ok(Some(ArtifactRecord {
        file_name,
        path,
        endpoint: header.endpoint,
        fingerprint: header.fingerprint,
        test_type: header.test_type,
        options: header.options,
        obsolete: header.obsolete,
        region,
        modified,
        content,
    }))
}

fn relative_name(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::MarkerStyle;
    use crate::strategies::PytestStrategy;
    use tempfile::tempdir;

    const HASH: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    fn artifact(id: &str) -> String {
        let style = MarkerStyle::new("#");
        let id = EndpointId::parse(id).unwrap();
        let fp: Fingerprint = HASH.parse().unwrap();
        style.wrap(&format!(
            "{}\n\ndef test_x():\n    pass\n",
            style.identity_line(&id, &fp, TestType::Positive, "1234abcd")
        ))
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        let inv = scan(&dir.path().join("nope"), &PytestStrategy, false).unwrap();
        assert!(inv.records.is_empty());
        assert!(inv.taken_names.is_empty());
    }

    #[test]
    fn test_scan_recovers_identity_and_reserves_foreign_names() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("test_get_pet.py"), artifact("GET /pet")).unwrap();
        fs::write(dir.path().join("test_manual.py"), "def test_manual():\n    pass\n").unwrap();
        fs::write(dir.path().join("conftest.py"), "").unwrap();

        let inv = scan(dir.path(), &PytestStrategy, false).unwrap();
        let id = EndpointId::new("GET", "/pet");
        let record = inv.get(&id).unwrap();
        assert_eq!(record.file_name, "test_get_pet.py");
        assert_eq!(record.fingerprint.as_str(), HASH);
        assert_eq!(record.test_type, Some(TestType::Positive));
        assert_eq!(record.options.as_deref(), Some("1234abcd"));
        assert!(!record.obsolete);
        assert!(record.modified.is_some());
        assert_eq!(inv.records.len(), 1);
        assert!(inv.is_taken("test_manual.py"));
        assert!(inv.is_taken("conftest.py"));
    }

    #[test]
    fn test_duplicates_pick_first_name() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("test_b.py"), artifact("GET /pet")).unwrap();
        fs::write(dir.path().join("test_a.py"), artifact("GET /pet")).unwrap();

        let inv = scan(dir.path(), &PytestStrategy, false).unwrap();
        assert_eq!(inv.records[&EndpointId::new("GET", "/pet")].file_name, "test_a.py");
        assert_eq!(inv.warnings.len(), 1);
        let text = inv.warnings[0].to_string();
        assert!(text.contains("test_a.py, test_b.py"));
    }

    #[test]
    fn test_damaged_markers_keep_identity() {
        let dir = tempdir().unwrap();
        let damaged = artifact("GET /pet").replace("# <<< testsync:generated <<<", "");
        fs::write(dir.path().join("test_get_pet.py"), damaged).unwrap();

        let inv = scan(dir.path(), &PytestStrategy, false).unwrap();
        let record = inv.get(&EndpointId::new("GET", "/pet")).unwrap();
        assert!(record.region.is_none());
        assert_eq!(record.fingerprint.as_str(), HASH);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_is_reported_and_reserved() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("test_get_pet.py");
        fs::write(&path, artifact("GET /pet")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read(&path).is_ok() {
            // Privileged users read through mode 000.
            return;
        }

        let inv = scan(dir.path(), &PytestStrategy, false).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        assert!(inv.records.is_empty());
        assert!(inv.is_taken("test_get_pet.py"));
        assert!(inv.unreadable_reason("test_get_pet.py").is_some());
        assert_eq!(inv.warnings.len(), 1);
        assert!(inv.warnings[0].to_string().starts_with("Unreadable file test_get_pet.py"));
    }

    #[test]
    fn test_non_utf8_file_is_foreign() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("test_blob.py"), [0xff, 0xfe, 0x00]).unwrap();

        let inv = scan(dir.path(), &PytestStrategy, false).unwrap();
        assert!(inv.records.is_empty());
        assert!(inv.warnings.is_empty());
        assert!(inv.is_taken("test_blob.py"));
    }

    #[test]
    fn test_recursive_scan() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("pets")).unwrap();
        fs::write(dir.path().join("pets/test_get_pet.py"), artifact("GET /pet")).unwrap();

        let flat = scan(dir.path(), &PytestStrategy, false).unwrap();
        assert!(flat.records.is_empty());

        let deep = scan(dir.path(), &PytestStrategy, true).unwrap();
        assert_eq!(
            deep.records[&EndpointId::new("GET", "/pet")].file_name,
            "pets/test_get_pet.py"
        );
    }
}
