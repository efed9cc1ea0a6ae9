#![deny(missing_docs)]

//! # Boundary Types
//!
//! The request/response contract exchanged with callers (CLI, HTTP shells,
//! dashboards). Field names are camelCase on the wire.

use crate::contract::ContractFormat;
use crate::error::SyncError;
use crate::generator::TestType;
use crate::strategies::StrategyKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// One synchronization request. Self-contained; no state carries over between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    /// Raw contract text (JSON or YAML).
    pub spec_content: String,
    /// Directory holding the test artifacts.
    pub repo_path: PathBuf,
    /// Server URL override for generated requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Credential per security scheme name.
    #[serde(default)]
    pub tokens: BTreeMap<String, String>,
    /// Emit negative tests.
    #[serde(default)]
    pub negative_tests: bool,
    /// Compute outcomes without touching the filesystem.
    #[serde(default)]
    pub dry_run: bool,
    /// Contract syntax.
    #[serde(default)]
    pub format: ContractFormat,
    /// Target test framework.
    #[serde(default)]
    pub strategy: StrategyKind,
    /// Remove obsolete artifacts instead of flagging them.
    #[serde(default)]
    pub prune_obsolete: bool,
    /// Regenerate even when fingerprints match.
    #[serde(default)]
    pub force: bool,
    /// Scan nested directories.
    #[serde(default)]
    pub recursive: bool,
    /// Worker pool size (defaults to available parallelism).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,
}

impl SyncRequest {
    /// Request with every option at its default.
    pub fn new(spec_content: impl Into<String>, repo_path: impl Into<PathBuf>) -> Self {
        Self {
            spec_content: spec_content.into(),
            repo_path: repo_path.into(),
            base_url: None,
            tokens: BTreeMap::new(),
            negative_tests: false,
            dry_run: false,
            format: ContractFormat::Auto,
            strategy: StrategyKind::Pytest,
            prune_obsolete: false,
            force: false,
            recursive: false,
            jobs: None,
        }
    }
}

/// What happened to one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileAction {
    /// New artifact written.
    Created,
    /// Generated region replaced.
    Updated,
    /// Already up to date.
    Skipped,
    /// Endpoint removed; artifact flagged or pruned.
    Deleted,
    /// Processing failed; see `detail`.
    Failed,
}

impl fmt::Display for FileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "Created",
            Self::Updated => "Updated",
            Self::Skipped => "Skipped",
            Self::Deleted => "Deleted",
            Self::Failed => "Failed",
        };
        f.write_str(s)
    }
}

impl FromStr for FileAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "created" => Ok(Self::Created),
            "updated" => Ok(Self::Updated),
            "skipped" => Ok(Self::Skipped),
            "deleted" => Ok(Self::Deleted),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown action '{}'", other)),
        }
    }
}

/// Per-artifact result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResult {
    /// File name relative to the repository path.
    pub file_name: String,
    /// `METHOD /path`.
    pub endpoint_id: String,
    /// Outcome.
    pub action: FileAction,
    /// Relative time of the last change (e.g. `Just now`, `5 mins ago`).
    pub timestamp: String,
    /// Resulting file content (empty when unavailable).
    pub code: String,
    /// Kinds of tests in the artifact, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_type: Option<TestType>,
    /// Failure or annotation detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Run totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Endpoints in the contract.
    pub total_endpoints: usize,
    /// Created artifacts.
    pub created: usize,
    /// Updated artifacts.
    pub updated: usize,
    /// Skipped artifacts.
    pub skipped: usize,
    /// Deleted (flagged or pruned) artifacts.
    pub deleted: usize,
    /// Failed items.
    pub failed: usize,
    /// Positive tests emitted this run.
    pub positive_tests: usize,
    /// Negative tests emitted this run.
    pub negative_tests: usize,
    /// Security tests emitted this run.
    pub security_tests: usize,
    /// Up-to-date endpoints as a percentage of all endpoints (one decimal).
    pub coverage: f64,
}

/// A surfaced error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Human-readable message.
    pub detail: String,
}

impl From<&SyncError> for ErrorDetail {
    fn from(err: &SyncError) -> Self {
        Self {
            detail: err.to_string(),
        }
    }
}

impl From<SyncError> for ErrorDetail {
    fn from(err: SyncError) -> Self {
        Self::from(&err)
    }
}

/// Result of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    /// Per-artifact results, sorted by endpoint identity.
    pub files: Vec<FileResult>,
    /// Totals.
    pub summary: Summary,
    /// Non-fatal problems (duplicate or unreadable artifacts).
    #[serde(default)]
    pub warnings: Vec<ErrorDetail>,
}

impl SyncResponse {
    /// Results matching an action and a case-insensitive search over file
    /// name and endpoint.
    pub fn filter(&self, action: Option<FileAction>, search: Option<&str>) -> Vec<&FileResult> {
        let needle = search.map(str::to_lowercase).filter(|s| !s.is_empty());
        self.files
            .iter()
            .filter(|f| action.map_or(true, |a| f.action == a))
            .filter(|f| {
                needle.as_deref().map_or(true, |n| {
                    f.file_name.to_lowercase().contains(n)
                        || f.endpoint_id.to_lowercase().contains(n)
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_defaults_from_minimal_json() {
        let req: SyncRequest = serde_json::from_value(json!({
            "specContent": "openapi: 3.0.0",
            "repoPath": "./tests",
            "negativeTests": true
        }))
        .unwrap();
        let mut expected = SyncRequest::new("openapi: 3.0.0", "./tests");
        expected.negative_tests = true;
        assert_eq!(req, expected);
    }

    #[test]
    fn test_request_full_json() {
        let req: SyncRequest = serde_json::from_value(json!({
            "specContent": "{}",
            "repoPath": "/srv/tests",
            "baseUrl": "https://api.example.com",
            "tokens": {"bearerAuth": "abc"},
            "dryRun": true,
            "format": "json",
            "strategy": "ureq",
            "pruneObsolete": true,
            "jobs": 2
        }))
        .unwrap();
        assert_eq!(req.base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(req.tokens["bearerAuth"], "abc");
        assert!(req.dry_run && req.prune_obsolete);
        assert_eq!(req.format, ContractFormat::Json);
        assert_eq!(req.strategy, StrategyKind::Ureq);
        assert_eq!(req.jobs, Some(2));
    }

    fn result(name: &str, id: &str, action: FileAction) -> FileResult {
        FileResult {
            file_name: name.into(),
            endpoint_id: id.into(),
            action,
            timestamp: "Just now".into(),
            code: String::new(),
            test_type: Some(TestType::Positive),
            detail: None,
        }
    }

    #[test]
    fn test_response_serialization_shape() {
        let resp = SyncResponse {
            files: vec![result("test_get_pet_by_id.py", "GET /pet/{petId}", FileAction::Created)],
            summary: Summary::default(),
            warnings: vec![],
        };
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["files"][0]["fileName"], "test_get_pet_by_id.py");
        assert_eq!(value["files"][0]["action"], "Created");
        assert_eq!(value["files"][0]["testType"], "positive");
        assert!(value["files"][0].get("detail").is_none());
        assert_eq!(value["summary"]["totalEndpoints"], 0);
    }

    #[test]
    fn test_filter_by_action_and_search() {
        let resp = SyncResponse {
            files: vec![
                result("test_add_pet.py", "POST /pet", FileAction::Created),
                result("test_get_order.py", "GET /store/order", FileAction::Skipped),
                result("test_update_pet.py", "PUT /pet", FileAction::Updated),
            ],
            summary: Summary::default(),
            warnings: vec![],
        };
        assert_eq!(resp.filter(None, None).len(), 3);
        assert_eq!(resp.filter(Some(FileAction::Skipped), None).len(), 1);
        let pets: Vec<&str> = resp
            .filter(None, Some("PET"))
            .iter()
            .map(|f| f.file_name.as_str())
            .collect();
        assert_eq!(pets, vec!["test_add_pet.py", "test_update_pet.py"]);
        assert!(resp.filter(Some(FileAction::Created), Some("order")).is_empty());
    }

    #[test]
    fn test_action_parse() {
        assert_eq!("updated".parse::<FileAction>().unwrap(), FileAction::Updated);
        assert!("gone".parse::<FileAction>().is_err());
    }
}
