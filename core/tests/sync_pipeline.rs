use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use tempfile::tempdir;
use testsync_core::markers::MarkerStyle;
use testsync_core::{
    sync, sync_with_cancel, FileAction, StrategyKind, SyncError, SyncRequest, SyncResponse,
};

const PETSTORE: &str = r#"
openapi: 3.0.0
info: {title: Petstore, version: 1.0.0}
servers:
  - url: https://petstore.example.com/v3
paths:
  /pet/{petId}:
    get:
      operationId: getPetById
      parameters:
        - {name: petId, in: path, required: true, schema: {type: integer, format: int64}}
      responses:
        '200':
          description: found
          content:
            application/json:
              schema: {$ref: '#/components/schemas/Pet'}
  /pet:
    put:
      operationId: updatePet
      requestBody:
        required: true
        content:
          application/json:
            schema: {$ref: '#/components/schemas/Pet'}
      responses:
        '200': {description: updated}
components:
  schemas:
    Pet:
      type: object
      required: [name]
      properties:
        id: {type: integer, format: int64}
        name: {type: string, example: doggie}
"#;

fn request(spec: &str, repo: &Path) -> SyncRequest {
    SyncRequest::new(spec, repo)
}

fn action_of<'a>(response: &'a SyncResponse, endpoint: &str) -> &'a testsync_core::FileResult {
    response
        .files
        .iter()
        .find(|f| f.endpoint_id == endpoint)
        .unwrap_or_else(|| panic!("no result for {}", endpoint))
}

fn snapshot(dir: &Path) -> Vec<(String, String)> {
    let mut files: Vec<(String, String)> = fs::read_dir(dir)
        .unwrap()
        .map(|e| {
            let e = e.unwrap();
            (
                e.file_name().to_string_lossy().into_owned(),
                fs::read_to_string(e.path()).unwrap(),
            )
        })
        .collect();
    files.sort();
    files
}

#[test]
fn test_first_run_creates_one_artifact_per_endpoint() {
    let dir = tempdir().unwrap();
    let repo = dir.path().join("tests");
    let single = PETSTORE.replace("  /pet:\n    put:", "  /unused:\n    x-put:");

    let response = sync(&request(&single, &repo)).unwrap();

    assert_eq!(response.files.len(), 1);
    let file = &response.files[0];
    assert_eq!(file.endpoint_id, "GET /pet/{petId}");
    assert_eq!(file.action, FileAction::Created);
    assert_eq!(file.file_name, "test_get_pet_by_id.py");
    assert_eq!(file.timestamp, "Just now");
    assert_eq!(response.summary.total_endpoints, 1);
    assert_eq!(response.summary.created, 1);
    assert_eq!(response.summary.positive_tests, 1);
    assert_eq!(response.summary.negative_tests, 0);
    assert_eq!(response.summary.coverage, 100.0);

    let on_disk = fs::read_to_string(repo.join("test_get_pet_by_id.py")).unwrap();
    assert_eq!(on_disk, file.code);
    assert!(on_disk.starts_with("# >>> testsync:generated >>>\n# testsync:endpoint GET /pet/{petId} fingerprint="));
    assert!(on_disk.contains("BASE_URL = \"https://petstore.example.com/v3\""));
    assert!(on_disk.contains("BASE_URL + \"/pet/0\""));
    assert!(on_disk.contains("assert \"name\" in body"));
    assert!(on_disk.ends_with("# <<< testsync:generated <<<\n"));
}

#[test]
fn test_second_run_is_idempotent() {
    let dir = tempdir().unwrap();
    let repo = dir.path().join("tests");
    sync(&request(PETSTORE, &repo)).unwrap();
    let before = snapshot(&repo);

    let response = sync(&request(PETSTORE, &repo)).unwrap();

    assert!(response.files.iter().all(|f| f.action == FileAction::Skipped));
    assert_eq!(response.summary.skipped, 2);
    assert_eq!(response.summary.positive_tests, 0);
    assert_eq!(response.summary.coverage, 100.0);
    assert_eq!(snapshot(&repo), before);
    let skipped = action_of(&response, "PUT /pet");
    assert_eq!(skipped.code, fs::read_to_string(repo.join("test_update_pet.py")).unwrap());
}

#[test]
fn test_semantically_equal_contract_is_skipped() {
    let dir = tempdir().unwrap();
    let repo = dir.path().join("tests");
    sync(&request(PETSTORE, &repo)).unwrap();

    let reordered = PETSTORE
        .replace("required: [name]\n      properties:", "properties:")
        .replace(
            "name: {type: string, example: doggie}",
            "name: {example: doggie, type: string, description: The pet name}\n      required: [name]",
        );
    let response = sync(&request(&reordered, &repo)).unwrap();
    assert!(response.files.iter().all(|f| f.action == FileAction::Skipped));
}

#[test]
fn test_new_required_field_updates_only_the_region() {
    let dir = tempdir().unwrap();
    let repo = dir.path().join("tests");
    sync(&request(PETSTORE, &repo)).unwrap();

    let path = repo.join("test_update_pet.py");
    let generated = fs::read_to_string(&path).unwrap();
    let prefix = "import json  # kept by hand\n\n";
    let suffix = "\n\ndef test_manual_edge_case():\n    assert True\n";
    fs::write(&path, format!("{}{}{}", prefix, generated, suffix)).unwrap();

    let changed = PETSTORE.replace("required: [name]", "required: [name, status]").replace(
        "name: {type: string, example: doggie}",
        "name: {type: string, example: doggie}\n        status: {type: string, enum: [available, sold]}",
    );
    let response = sync(&request(&changed, &repo)).unwrap();

    let put = action_of(&response, "PUT /pet");
    assert_eq!(put.action, FileAction::Updated);
    // GET /pet/{petId} also embeds Pet in its response, so it changes too.
    assert_eq!(action_of(&response, "GET /pet/{petId}").action, FileAction::Updated);

    let after = fs::read_to_string(&path).unwrap();
    assert!(after.starts_with(prefix));
    assert!(after.ends_with(suffix));
    assert!(after.contains("\"status\": \"available\""));
    assert_ne!(after, format!("{}{}{}", prefix, generated, suffix));
}

#[test]
fn test_removed_endpoint_is_flagged_not_deleted() {
    let dir = tempdir().unwrap();
    let repo = dir.path().join("tests");
    sync(&request(PETSTORE, &repo)).unwrap();

    let without_put = PETSTORE.replace("  /pet:\n    put:", "  /unused:\n    x-put:");
    let response = sync(&request(&without_put, &repo)).unwrap();

    let deleted = action_of(&response, "PUT /pet");
    assert_eq!(deleted.action, FileAction::Deleted);
    assert_eq!(deleted.detail.as_deref(), Some("marked obsolete"));
    assert_eq!(response.summary.deleted, 1);
    assert_eq!(response.summary.total_endpoints, 1);
    assert_eq!(response.summary.coverage, 100.0);

    let content = fs::read_to_string(repo.join("test_update_pet.py")).unwrap();
    let style = MarkerStyle::new("#");
    let region = style.locate(&content).unwrap();
    assert!(content[region.inner].starts_with("# testsync:obsolete"));

    // Flagging is idempotent.
    let again = sync(&request(&without_put, &repo)).unwrap();
    let deleted = action_of(&again, "PUT /pet");
    assert_eq!(deleted.detail.as_deref(), Some("already marked obsolete"));
    assert_eq!(fs::read_to_string(repo.join("test_update_pet.py")).unwrap(), content);
}

#[test]
fn test_restored_endpoint_clears_obsolete_flag() {
    let dir = tempdir().unwrap();
    let repo = dir.path().join("tests");
    sync(&request(PETSTORE, &repo)).unwrap();
    let without_put = PETSTORE.replace("  /pet:\n    put:", "  /unused:\n    x-put:");
    sync(&request(&without_put, &repo)).unwrap();

    let response = sync(&request(PETSTORE, &repo)).unwrap();
    assert_eq!(action_of(&response, "PUT /pet").action, FileAction::Updated);
    assert_eq!(action_of(&response, "GET /pet/{petId}").action, FileAction::Skipped);
    let content = fs::read_to_string(repo.join("test_update_pet.py")).unwrap();
    assert!(!content.contains("testsync:obsolete"));
}

#[test]
fn test_prune_removes_obsolete_artifact() {
    let dir = tempdir().unwrap();
    let repo = dir.path().join("tests");
    sync(&request(PETSTORE, &repo)).unwrap();

    let without_put = PETSTORE.replace("  /pet:\n    put:", "  /unused:\n    x-put:");
    let mut req = request(&without_put, &repo);
    req.prune_obsolete = true;
    let response = sync(&req).unwrap();

    assert_eq!(action_of(&response, "PUT /pet").detail.as_deref(), Some("pruned"));
    assert!(!repo.join("test_update_pet.py").exists());
    assert!(repo.join("test_get_pet_by_id.py").exists());
}

#[test]
fn test_dry_run_touches_nothing() {
    let dir = tempdir().unwrap();
    let repo = dir.path().join("tests");

    let mut req = request(PETSTORE, &repo);
    req.dry_run = true;
    let response = sync(&req).unwrap();
    assert_eq!(response.summary.created, 2);
    assert!(response.files.iter().all(|f| !f.code.is_empty()));
    assert!(!repo.exists());

    sync(&request(PETSTORE, &repo)).unwrap();
    let before = snapshot(&repo);
    let changed = PETSTORE.replace("format: int64}}", "format: int32}}");
    let mut req = request(&changed, &repo);
    req.dry_run = true;
    let response = sync(&req).unwrap();
    assert_eq!(action_of(&response, "GET /pet/{petId}").action, FileAction::Updated);
    assert_eq!(snapshot(&repo), before);
}

#[test]
fn test_damaged_markers_fail_without_modification() {
    let dir = tempdir().unwrap();
    let repo = dir.path().join("tests");
    sync(&request(PETSTORE, &repo)).unwrap();

    let path = repo.join("test_update_pet.py");
    let generated = fs::read_to_string(&path).unwrap();
    // The identity line survives but the end marker is gone.
    let damaged = generated.replace("# <<< testsync:generated <<<", "# edited by hand");
    fs::write(&path, &damaged).unwrap();

    let changed = PETSTORE.replace("required: [name]", "required: [id, name]");
    let mut dry = request(&changed, &repo);
    dry.dry_run = true;
    let preview = sync(&dry).unwrap();
    assert_eq!(action_of(&preview, "PUT /pet").action, FileAction::Failed);

    let response = sync(&request(&changed, &repo)).unwrap();
    let put = action_of(&response, "PUT /pet");
    assert_eq!(put.action, FileAction::Failed);
    assert_eq!(put.file_name, "test_update_pet.py");
    assert!(put.detail.as_deref().unwrap().contains("Manual override conflict"));
    assert_eq!(response.summary.failed, 1);
    assert_eq!(action_of(&response, "GET /pet/{petId}").action, FileAction::Updated);
    assert_eq!(fs::read_to_string(&path).unwrap(), damaged);
}

#[test]
fn test_conflict_reported_when_markers_vanish_after_scan() {
    use testsync_core::writer::MergeWriter;

    let dir = tempdir().unwrap();
    let repo = dir.path().join("tests");
    sync(&request(PETSTORE, &repo)).unwrap();
    let path = repo.join("test_update_pet.py");
    fs::write(&path, "def test_rewritten():\n    pass\n").unwrap();

    let writer = MergeWriter::new(MarkerStyle::new("#"), false);
    let err = writer
        .update(
            &path,
            "test_update_pet.py",
            &testsync_core::EndpointId::new("PUT", "/pet"),
            "x\n",
        )
        .unwrap_err();
    assert!(matches!(err, SyncError::ManualOverrideConflict { .. }));
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "def test_rewritten():\n    pass\n"
    );
}

#[test]
fn test_duplicate_artifacts_warn_and_leave_copies() {
    let dir = tempdir().unwrap();
    let repo = dir.path().join("tests");
    sync(&request(PETSTORE, &repo)).unwrap();

    let original = fs::read_to_string(repo.join("test_update_pet.py")).unwrap();
    fs::write(repo.join("test_update_pet_copy.py"), &original).unwrap();

    let changed = PETSTORE.replace("required: [name]", "required: [id, name]");
    let response = sync(&request(&changed, &repo)).unwrap();

    assert_eq!(response.warnings.len(), 1);
    assert!(response.warnings[0].detail.contains("test_update_pet.py, test_update_pet_copy.py"));
    assert_eq!(action_of(&response, "PUT /pet").file_name, "test_update_pet.py");
    assert_eq!(
        fs::read_to_string(repo.join("test_update_pet_copy.py")).unwrap(),
        original
    );
}

#[test]
fn test_invalid_contract_aborts_before_writing() {
    let dir = tempdir().unwrap();
    let repo = dir.path().join("tests");

    let err = sync(&request("openapi: [unclosed", &repo)).unwrap_err();
    assert!(matches!(err, SyncError::SpecParse(_)));
    let err = sync(&request("openapi: 3.0.0\ninfo: {}\n", &repo)).unwrap_err();
    assert!(matches!(err, SyncError::SpecSchema(_)));
    assert!(!repo.exists());
}

#[test]
fn test_empty_contract_has_zero_coverage() {
    let dir = tempdir().unwrap();
    let response = sync(&request("openapi: 3.0.0\npaths: {}\n", dir.path())).unwrap();
    assert!(response.files.is_empty());
    assert_eq!(response.summary.coverage, 0.0);
}

#[test]
fn test_foreign_files_are_untouched_and_reserved() {
    let dir = tempdir().unwrap();
    let repo = dir.path().join("tests");
    fs::create_dir_all(&repo).unwrap();
    fs::write(repo.join("test_get_pet_by_id.py"), "def test_mine():\n    pass\n").unwrap();

    let response = sync(&request(PETSTORE, &repo)).unwrap();
    let get = action_of(&response, "GET /pet/{petId}");
    assert_eq!(get.action, FileAction::Created);
    assert!(get.file_name.starts_with("test_get_pet_by_id_"));
    assert_eq!(
        fs::read_to_string(repo.join("test_get_pet_by_id.py")).unwrap(),
        "def test_mine():\n    pass\n"
    );
}

#[test]
fn test_cancelled_run_reports_failures_without_writes() {
    let dir = tempdir().unwrap();
    let repo = dir.path().join("tests");
    let cancel = AtomicBool::new(true);

    let response = sync_with_cancel(&request(PETSTORE, &repo), &cancel).unwrap();
    assert!(response.files.iter().all(|f| f.action == FileAction::Failed));
    assert!(response.files[0].detail.as_deref().unwrap().contains("Cancelled"));
    assert_eq!(response.summary.coverage, 0.0);
    assert!(!repo.exists());
}

#[test]
fn test_negative_and_security_tests_with_tokens() {
    let dir = tempdir().unwrap();
    let repo = dir.path().join("tests");
    let secured = PETSTORE.replace(
        "components:\n",
        "security:\n  - api_key: []\ncomponents:\n  securitySchemes:\n    api_key: {type: apiKey, in: header, name: X-API-Key}\n",
    );

    let mut req = request(&secured, &repo);
    req.negative_tests = true;
    req.tokens.insert("api_key".into(), "live-key".into());
    req.base_url = Some("http://127.0.0.1:9000".into());
    let response = sync(&req).unwrap();

    assert_eq!(response.summary.positive_tests, 2);
    assert_eq!(response.summary.security_tests, 2);
    assert!(response.summary.negative_tests > 0);

    let put = action_of(&response, "PUT /pet");
    assert_eq!(put.test_type, Some(testsync_core::TestType::Mixed));
    assert!(put.code.contains("BASE_URL = \"http://127.0.0.1:9000\""));
    assert!(put.code.contains("\"X-API-Key\": \"live-key\""));
    assert!(put.code.contains("def test_update_pet_body_name_missing():"));
    assert!(put.code.contains("def test_update_pet_rejects_invalid_credentials():"));
    assert!(put.code.contains("assert response.status_code in (401, 403)"));
}

#[test]
fn test_generation_is_deterministic_across_runs() {
    let a = tempdir().unwrap();
    let b = tempdir().unwrap();
    let mut req_a = request(PETSTORE, a.path());
    req_a.negative_tests = true;
    req_a.jobs = Some(1);
    let mut req_b = request(PETSTORE, b.path());
    req_b.negative_tests = true;
    req_b.jobs = Some(4);

    sync(&req_a).unwrap();
    sync(&req_b).unwrap();
    assert_eq!(snapshot(a.path()), snapshot(b.path()));
}

#[test]
fn test_ureq_strategy_end_to_end() {
    let dir = tempdir().unwrap();
    let repo = dir.path().join("tests");
    let mut req = request(PETSTORE, &repo);
    req.strategy = StrategyKind::Ureq;

    let response = sync(&req).unwrap();
    let get = action_of(&response, "GET /pet/{petId}");
    assert_eq!(get.file_name, "get_pet_by_id_test.rs");
    assert!(get.code.starts_with("// >>> testsync:generated >>>\n// testsync:endpoint GET /pet/{petId}"));
    assert!(get.code.contains("#[test]\nfn test_get_pet_by_id() {"));
    assert!(get.code.contains(".get(format!(\"{}{}\", BASE_URL, \"/pet/0\"))"));

    let again = sync(&req).unwrap();
    assert!(again.files.iter().all(|f| f.action == FileAction::Skipped));
}

#[test]
fn test_integer_limits_generate_without_panicking() {
    let dir = tempdir().unwrap();
    let repo = dir.path().join("tests");
    let spec = r#"
openapi: 3.0.0
paths:
  /limits:
    get:
      operationId: getLimits
      parameters:
        - {name: high, in: query, required: true, schema: {type: integer, format: int64, minimum: 9223372036854775807}}
        - {name: low, in: query, required: true, schema: {type: integer, format: int64, maximum: -9223372036854775808}}
        - {name: code, in: query, required: true, schema: {type: integer, enum: [-9223372036854775808, 9223372036854775807]}}
        - {name: name, in: query, required: true, schema: {type: string, maxLength: 18446744073709551615}}
      responses:
        '200': {description: ok}
  /other:
    get:
      operationId: getOther
      responses:
        '200': {description: ok}
"#;
    let mut req = request(spec, &repo);
    req.negative_tests = true;
    let response = sync(&req).unwrap();

    let limits = action_of(&response, "GET /limits");
    assert_eq!(limits.action, FileAction::Created);
    assert!(limits.code.contains("\"high\": \"9223372036854775807\""));
    assert!(limits.code.contains("\"high\": \"9223372036854775806\""));
    assert!(limits.code.contains("\"code\": \"__invalid_enum__\""));
    assert_eq!(action_of(&response, "GET /other").action, FileAction::Created);
    assert_eq!(response.summary.failed, 0);
    assert!(response.summary.negative_tests > 0);
}

#[test]
fn test_request_options_change_regenerates_regions() {
    let dir = tempdir().unwrap();
    let repo = dir.path().join("tests");
    sync(&request(PETSTORE, &repo)).unwrap();

    let mut negative = request(PETSTORE, &repo);
    negative.negative_tests = true;
    let response = sync(&negative).unwrap();
    assert!(response.files.iter().all(|f| f.action == FileAction::Updated));
    assert!(response.summary.negative_tests > 0);
    let put = fs::read_to_string(repo.join("test_update_pet.py")).unwrap();
    assert!(put.contains("def test_update_pet_body_name_missing():"));

    let again = sync(&negative).unwrap();
    assert!(again.files.iter().all(|f| f.action == FileAction::Skipped));

    let mut moved = request(PETSTORE, &repo);
    moved.negative_tests = true;
    moved.base_url = Some("http://127.0.0.1:9000".into());
    let response = sync(&moved).unwrap();
    let get = action_of(&response, "GET /pet/{petId}");
    assert_eq!(get.action, FileAction::Updated);
    assert!(get.code.contains("BASE_URL = \"http://127.0.0.1:9000\""));

    let response = sync(&request(PETSTORE, &repo)).unwrap();
    assert!(response.files.iter().all(|f| f.action == FileAction::Updated));
    let put = fs::read_to_string(repo.join("test_update_pet.py")).unwrap();
    assert!(!put.contains("_missing():"));
}

#[cfg(unix)]
#[test]
fn test_unreadable_artifact_is_reported_not_replaced() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let repo = dir.path().join("tests");
    sync(&request(PETSTORE, &repo)).unwrap();

    let path = repo.join("test_update_pet.py");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read(&path).is_ok() {
        // Privileged users read through mode 000.
        return;
    }

    let changed = PETSTORE.replace("required: [name]", "required: [id, name]");
    let response = sync(&request(&changed, &repo));
    fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
    let response = response.unwrap();

    let put = action_of(&response, "PUT /pet");
    assert_eq!(put.action, FileAction::Failed);
    assert_eq!(put.file_name, "test_update_pet.py");
    assert!(put.detail.as_deref().unwrap().starts_with("Unreadable file test_update_pet.py"));
    assert_eq!(action_of(&response, "GET /pet/{petId}").action, FileAction::Updated);
    assert_eq!(response.warnings.len(), 1);
    assert!(response.warnings[0].detail.contains("test_update_pet.py"));

    let names: Vec<String> = snapshot(&repo).into_iter().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["test_get_pet_by_id.py", "test_update_pet.py"]);
}
