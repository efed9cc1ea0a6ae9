#![deny(missing_docs)]

//! # Sync Command
//!
//! Builds a `SyncRequest` from flags (or a JSON request file), runs the
//! engine, and prints the per-file results and totals.

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use testsync_core::{
    sync, ContractFormat, FileAction, StrategyKind, SyncRequest, SyncResponse,
};
use tracing::warn;

use crate::error::{CliError, CliResult};

/// Arguments for the sync command.
#[derive(clap::Args, Debug, Clone)]
pub struct SyncArgs {
    /// Path to the OpenAPI 3.x / Swagger 2.0 contract (JSON or YAML).
    #[clap(long, env = "TESTSYNC_SPEC", required_unless_present = "request")]
    pub spec: Option<PathBuf>,

    /// Directory holding the generated test files.
    #[clap(long, env = "TESTSYNC_REPO", default_value = "tests")]
    pub repo: PathBuf,

    /// Server URL the generated tests call (defaults to the contract's first server).
    #[clap(long, env = "TESTSYNC_BASE_URL")]
    pub base_url: Option<String>,

    /// Credential for a security scheme, as `scheme=TOKEN`. Repeatable.
    #[clap(long = "token", value_parser = parse_key_val)]
    pub tokens: Vec<(String, String)>,

    /// Also generate negative (constraint violation) tests.
    #[clap(long, env = "TESTSYNC_NEGATIVE")]
    pub negative: bool,

    /// Compute and report outcomes without writing anything.
    #[clap(long, env = "TESTSYNC_DRY_RUN")]
    pub dry_run: bool,

    /// Delete artifacts of removed endpoints instead of flagging them obsolete.
    #[clap(long, env = "TESTSYNC_PRUNE")]
    pub prune: bool,

    /// Regenerate every artifact, even when its fingerprint is current.
    #[clap(long, env = "TESTSYNC_FORCE")]
    pub force: bool,

    /// Scan nested directories of the repository path.
    #[clap(long, env = "TESTSYNC_RECURSIVE")]
    pub recursive: bool,

    /// Target test framework (`pytest` or `ureq`).
    #[clap(long, env = "TESTSYNC_STRATEGY", default_value_t = StrategyKind::Pytest)]
    pub strategy: StrategyKind,

    /// Contract syntax (`auto`, `json` or `yaml`).
    #[clap(long, env = "TESTSYNC_FORMAT", default_value_t = ContractFormat::Auto)]
    pub format: ContractFormat,

    /// Worker threads (defaults to available parallelism).
    #[clap(long, env = "TESTSYNC_JOBS")]
    pub jobs: Option<usize>,

    /// Read the complete request from a JSON file; the flags above are ignored.
    #[clap(long)]
    pub request: Option<PathBuf>,

    /// Print the response as JSON.
    #[clap(long)]
    pub json: bool,

    /// Only list results with this action (e.g. `updated`).
    #[clap(long)]
    pub filter_action: Option<FileAction>,

    /// Only list results whose file name or endpoint contains this text.
    #[clap(long)]
    pub search: Option<String>,
}

/// Parses a `KEY=VALUE` pair.
pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no `=` found in `{}`", s))?;
    if key.is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in `{}`", s));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Executes the synchronization.
///
/// Returns an error when the run itself fails or when any item failed.
pub fn execute(args: &SyncArgs) -> CliResult<()> {
    // 1. Build Request
    let request = build_request(args)?;

    // 2. Run Engine
    let response = sync(&request)?;
    for warning in &response.warnings {
        warn!("{}", warning.detail);
    }

    // 3. Print
    let filtered = filtered_response(&response, args.filter_action, args.search.as_deref());
    if args.json {
        println!("{}", serde_json::to_string_pretty(&filtered)?);
    } else {
        print!("{}", render_report(&filtered, request.dry_run));
    }

    if response.summary.failed > 0 {
        return Err(CliError::General(format!(
            "{} item(s) failed",
            response.summary.failed
        )));
    }
    Ok(())
}

/// Assembles the engine request from a JSON file or from flags.
pub fn build_request(args: &SyncArgs) -> CliResult<SyncRequest> {
    if let Some(path) = &args.request {
        let text = fs::read_to_string(path)?;
        return Ok(serde_json::from_str(&text)?);
    }

    let spec_path = args
        .spec
        .as_ref()
        .ok_or_else(|| CliError::General("either --spec or --request is required".into()))?;
    if !spec_path.exists() {
        return Err(CliError::General(format!(
            "Spec file not found: {:?}",
            spec_path
        )));
    }
    let spec_content = fs::read_to_string(spec_path)?;

    let mut request = SyncRequest::new(spec_content, args.repo.clone());
    request.base_url = args.base_url.clone();
    request.tokens = args.tokens.iter().cloned().collect();
    request.negative_tests = args.negative;
    request.dry_run = args.dry_run;
    request.format = args.format;
    request.strategy = args.strategy;
    request.prune_obsolete = args.prune;
    request.force = args.force;
    request.recursive = args.recursive;
    request.jobs = args.jobs;
    Ok(request)
}

fn filtered_response(
    response: &SyncResponse,
    action: Option<FileAction>,
    search: Option<&str>,
) -> SyncResponse {
    SyncResponse {
        files: response
            .filter(action, search)
            .into_iter()
            .cloned()
            .collect(),
        summary: response.summary.clone(),
        warnings: response.warnings.clone(),
    }
}

/// Human-readable listing plus totals.
pub fn render_report(response: &SyncResponse, dry_run: bool) -> String {
    let mut out = String::new();
    if dry_run {
        out.push_str("Dry run: no files were written.\n");
    }
    for file in &response.files {
        let _ = write!(
            out,
            "{:<8} {:<40} {} ({})",
            file.action.to_string(),
            file.endpoint_id,
            file.file_name,
            file.timestamp
        );
        if let Some(detail) = &file.detail {
            let _ = write!(out, " - {}", detail);
        }
        out.push('\n');
    }

    let s = &response.summary;
    let _ = writeln!(
        out,
        "\n{} endpoint(s): {} created, {} updated, {} skipped, {} deleted, {} failed",
        s.total_endpoints, s.created, s.updated, s.skipped, s.deleted, s.failed
    );
    let _ = writeln!(
        out,
        "Tests written: {} positive, {} negative, {} security",
        s.positive_tests, s.negative_tests, s.security_tests
    );
    let _ = writeln!(out, "Coverage: {:.1}%", s.coverage);
    for warning in &response.warnings {
        let _ = writeln!(out, "Warning: {}", warning.detail);
    }
    out
}
