#![deny(missing_docs)]

//! # Sync Engine
//!
//! Orchestrates one run:
//! Parse -> Fingerprint -> Scan -> Reconcile -> (parallel) Generate/Render/Write -> Report.
//!
//! Contract errors abort before any filesystem mutation. After that point,
//! failures are scoped to a single item and surface as `Failed` results,
//! including a panic while generating one item.

use crate::api::{ErrorDetail, FileAction, FileResult, SyncRequest, SyncResponse};
use crate::contract::parse_contract;
use crate::error::{AppResult, SyncError};
use crate::fingerprint::fingerprint;
use crate::generator::{build_plan, GeneratorOptions, TestPlan};
use crate::inventory::{self, ArtifactRecord};
use crate::reconcile::{reconcile, FingerprintedEndpoint, WorkItem};
use crate::report::{relative_timestamp, summarize, Outcome, TestCounts};
use crate::strategies::TestStrategy;
use crate::writer::MergeWriter;
use rayon::prelude::*;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;
use tracing::{debug, info, warn};
use url::Url;

/// Server used when neither the request nor the contract names one.
pub const DEFAULT_BASE_URL: &str = "http://localhost";

const JUST_NOW: &str = "Just now";

/// Runs a synchronization to completion.
pub fn sync(request: &SyncRequest) -> AppResult<SyncResponse> {
    sync_with_cancel(request, &AtomicBool::new(false))
}

/// Runs a synchronization that stops starting new items once `cancel` is set.
///
/// Items not yet started are reported `Failed`; items in flight finish.
pub fn sync_with_cancel(request: &SyncRequest, cancel: &AtomicBool) -> AppResult<SyncResponse> {
    // 1. Parse Contract
    let contract = parse_contract(&request.spec_content, request.format)?;
    let base_url = resolve_base_url(request.base_url.as_deref(), &contract.servers)?;
    let options = GeneratorOptions {
        negative_tests: request.negative_tests,
        credentials: request.tokens.clone(),
    };

    // 2. Fingerprint
    let endpoints: Vec<FingerprintedEndpoint> = contract
        .endpoints
        .into_iter()
        .map(|spec| FingerprintedEndpoint {
            fingerprint: fingerprint(&spec),
            options: options.digest(&spec, &base_url),
            spec,
        })
        .collect();

    // 3. Scan Inventory
    let strategy = request.strategy.strategy();
    let inventory = inventory::scan(&request.repo_path, strategy, request.recursive)?;
    info!(
        endpoints = endpoints.len(),
        artifacts = inventory.records.len(),
        strategy = strategy.name(),
        dry_run = request.dry_run,
        "sync started"
    );

    // 4. Reconcile
    let items = reconcile(&endpoints, &inventory, strategy, request.force);

    // 5. Generate & Write
    let ctx = RunContext {
        strategy,
        writer: MergeWriter::new(strategy.markers(), request.dry_run),
        options,
        base_url,
        root: &request.repo_path,
        prune: request.prune_obsolete,
        now: SystemTime::now(),
    };
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(request.jobs.unwrap_or(0))
        .build()
        .map_err(|e| SyncError::General(format!("Failed to start worker pool: {}", e)))?;
    let outcomes: Vec<Outcome> =
        pool.install(|| items.par_iter().map(|item| ctx.process(item, cancel)).collect());

    // 6. Report
    let summary = summarize(endpoints.len(), &outcomes);
    info!(
        created = summary.created,
        updated = summary.updated,
        skipped = summary.skipped,
        deleted = summary.deleted,
        failed = summary.failed,
        coverage = summary.coverage,
        "sync finished"
    );

    Ok(SyncResponse {
        files: outcomes.into_iter().map(|o| o.file).collect(),
        summary,
        warnings: inventory.warnings.iter().map(ErrorDetail::from).collect(),
    })
}

/// Picks the server URL generated tests target.
///
/// An explicit override must be an absolute URL. Otherwise the first contract
/// server that is absolute, or relative to `DEFAULT_BASE_URL`, is used.
pub fn resolve_base_url(override_url: Option<&str>, servers: &[String]) -> AppResult<String> {
    if let Some(raw) = override_url.map(str::trim).filter(|s| !s.is_empty()) {
        let url = Url::parse(raw)
            .map_err(|e| SyncError::General(format!("Invalid base URL '{}': {}", raw, e)))?;
        return Ok(without_trailing_slash(url));
    }

    for server in servers {
        match Url::parse(server) {
            Ok(url) => return Ok(without_trailing_slash(url)),
            Err(url::ParseError::RelativeUrlWithoutBase) if server.starts_with('/') => {
                let joined = Url::parse(DEFAULT_BASE_URL).and_then(|base| base.join(server));
                if let Ok(url) = joined {
                    return Ok(without_trailing_slash(url));
                }
            }
            // Templated servers (`{scheme}://...`) cannot be used verbatim.
            Err(e) => debug!(server = %server, error = %e, "server URL skipped"),
        }
    }
    Ok(DEFAULT_BASE_URL.to_string())
}

fn without_trailing_slash(url: Url) -> String {
    url.as_str().trim_end_matches('/').to_string()
}

struct RunContext<'a> {
    strategy: &'static dyn TestStrategy,
    writer: MergeWriter,
    options: GeneratorOptions,
    base_url: String,
    root: &'a Path,
    prune: bool,
    now: SystemTime,
}

impl RunContext<'_> {
    fn process(&self, item: &WorkItem<'_>, cancel: &AtomicBool) -> Outcome {
        debug!(endpoint = %item.id(), action = ?item.classification(), file = %item.file_name(), "reconciled");

        if let WorkItem::Skip { artifact, .. } = item {
            return self.skipped(artifact);
        }
        if cancel.load(Ordering::SeqCst) {
            let err = SyncError::Cancelled {
                endpoint: item.id().to_string(),
            };
            return failed(item, &err);
        }

        let result = catch_unwind(AssertUnwindSafe(|| self.apply(item)))
            .unwrap_or_else(|payload| {
                Err(SyncError::General(format!(
                    "Generation panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });

        result.unwrap_or_else(|err| {
            warn!(endpoint = %item.id(), file = %item.file_name(), "{}", err);
            failed(item, &err)
        })
    }

    fn apply(&self, item: &WorkItem<'_>) -> AppResult<Outcome> {
        match item {
            WorkItem::Create {
                endpoint,
                file_name,
            } => {
                let plan = build_plan(&endpoint.spec, &self.options);
                let inner = self.strategy.render_region(
                    &plan,
                    &endpoint.fingerprint,
                    &endpoint.options,
                    &self.base_url,
                );
                let path = self.root.join(file_name);
                self.writer
                    .create(&path, file_name, &inner)
                    .map(|w| generated(item, FileAction::Created, w.content, &plan))
            }
            WorkItem::Update { endpoint, artifact } => {
                let plan = build_plan(&endpoint.spec, &self.options);
                let inner = self.strategy.render_region(
                    &plan,
                    &endpoint.fingerprint,
                    &endpoint.options,
                    &self.base_url,
                );
                self.writer
                    .update(&artifact.path, &artifact.file_name, &artifact.endpoint, &inner)
                    .map(|w| generated(item, FileAction::Updated, w.content, &plan))
            }
            WorkItem::Delete { artifact } => self.retire(artifact),
            WorkItem::Skip { artifact, .. } => Ok(self.skipped(artifact)),
            WorkItem::Blocked {
                file_name, reason, ..
            } => Err(SyncError::UnreadableArtifact {
                file: file_name.clone(),
                reason: reason.to_string(),
            }),
        }
    }

    fn skipped(&self, artifact: &ArtifactRecord) -> Outcome {
        Outcome {
            file: FileResult {
                file_name: artifact.file_name.clone(),
                endpoint_id: artifact.endpoint.to_string(),
                action: FileAction::Skipped,
                timestamp: relative_timestamp(artifact.modified, self.now),
                code: artifact.content.clone(),
                test_type: artifact.test_type,
                detail: None,
            },
            tests: TestCounts::default(),
        }
    }

    fn retire(&self, artifact: &ArtifactRecord) -> AppResult<Outcome> {
        let (code, detail, timestamp) = if self.prune {
            self.writer.prune(&artifact.path, &artifact.file_name)?;
            (String::new(), "pruned", JUST_NOW.to_string())
        } else {
            let written =
                self.writer
                    .mark_obsolete(&artifact.path, &artifact.file_name, &artifact.endpoint)?;
            if written.changed {
                (written.content, "marked obsolete", JUST_NOW.to_string())
            } else {
                (
                    written.content,
                    "already marked obsolete",
                    relative_timestamp(artifact.modified, self.now),
                )
            }
        };
        Ok(Outcome {
            file: FileResult {
                file_name: artifact.file_name.clone(),
                endpoint_id: artifact.endpoint.to_string(),
                action: FileAction::Deleted,
                timestamp,
                code,
                test_type: artifact.test_type,
                detail: Some(detail.to_string()),
            },
            tests: TestCounts::default(),
        })
    }
}

fn generated(item: &WorkItem<'_>, action: FileAction, code: String, plan: &TestPlan) -> Outcome {
    Outcome {
        file: FileResult {
            file_name: item.file_name().to_string(),
            endpoint_id: item.id().to_string(),
            action,
            timestamp: JUST_NOW.to_string(),
            code,
            test_type: Some(plan.test_type()),
            detail: None,
        },
        tests: TestCounts::of(plan),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn failed(item: &WorkItem<'_>, err: &SyncError) -> Outcome {
    Outcome {
        file: FileResult {
            file_name: item.file_name().to_string(),
            endpoint_id: item.id().to_string(),
            action: FileAction::Failed,
            timestamp: JUST_NOW.to_string(),
            code: String::new(),
            test_type: None,
            detail: Some(err.to_string()),
        },
        tests: TestCounts::default(),
    }
}
