#![deny(missing_docs)]

//! # Pytest Strategy
//!
//! Renders tests as plain pytest functions issuing requests with the
//! `requests` library. Each region is self-contained: it carries its own
//! imports and `BASE_URL`.

use super::traits::TestStrategy;
use super::utils::{
    is_form_media_type, is_json_media_type, python_dict, python_literal, python_string_literal,
    wire_request,
};
use crate::generator::{value_text, StatusExpectation, TestCase};

/// Seconds each generated request may take.
const TIMEOUT_SECS: u32 = 30;

/// pytest + requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct PytestStrategy;

impl TestStrategy for PytestStrategy {
    fn name(&self) -> &'static str {
        "pytest"
    }

    fn comment_prefix(&self) -> &'static str {
        "#"
    }

    fn file_name(&self, stem: &str) -> String {
        format!("test_{}.py", stem)
    }

    fn matches_file_name(&self, name: &str) -> bool {
        name.starts_with("test_") && name.ends_with(".py")
    }

    fn render_prelude(&self, base_url: &str) -> String {
        let mut code = String::new();
        code.push_str("import requests\n\n");
        code.push_str(&format!("BASE_URL = {}\n", python_string_literal(base_url)));
        code.push_str(&format!("TIMEOUT = {}\n", TIMEOUT_SECS));
        code
    }

    fn render_case(&self, case: &TestCase, _base_url: &str) -> String {
        let request = &case.request;
        let mut wire = wire_request(request);

        let mut body_arg = None;
        if let Some((media_type, body)) = &request.body {
            body_arg = Some(if is_json_media_type(media_type) {
                format!("json={}", python_literal(body))
            } else if is_form_media_type(media_type) {
                let pairs: Vec<(String, String)> = body
                    .as_object()
                    .map(|m| m.iter().map(|(k, v)| (k.clone(), value_text(v))).collect())
                    .unwrap_or_default();
                format!("data={}", python_dict(&pairs))
            } else {
                wire.headers
                    .push(("Content-Type".to_string(), media_type.clone()));
                let raw = match body {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                format!("data={}", python_string_literal(&raw))
            });
        }

        let mut code = String::new();
        code.push_str(&format!("\ndef {}():\n", case.name));
        code.push_str(&format!("    {}\n", python_string_literal(&case.summary)));
        code.push_str("    response = requests.request(\n");
        code.push_str(&format!("        {},\n", python_string_literal(&request.method)));
        code.push_str(&format!(
            "        BASE_URL + {},\n",
            python_string_literal(&request.path)
        ));
        if !wire.query.is_empty() {
            code.push_str(&format!("        params={},\n", python_dict(&wire.query)));
        }
        if !wire.headers.is_empty() {
            code.push_str(&format!("        headers={},\n", python_dict(&wire.headers)));
        }
        if !wire.cookies.is_empty() {
            code.push_str(&format!("        cookies={},\n", python_dict(&wire.cookies)));
        }
        if let Some(arg) = body_arg {
            code.push_str(&format!("        {},\n", arg));
        }
        code.push_str("        timeout=TIMEOUT,\n");
        code.push_str("    )\n");

        code.push_str(&status_assertion(case.expect.status));
        if !case.expect.required_fields.is_empty() {
            code.push_str("    body = response.json()\n");
            for field in &case.expect.required_fields {
                code.push_str(&format!(
                    "    assert {} in body\n",
                    python_string_literal(field)
                ));
            }
        }
        code
    }
}

fn status_assertion(status: StatusExpectation) -> String {
    match status {
        StatusExpectation::Exact(code) => format!("    assert response.status_code == {}\n", code),
        StatusExpectation::Success => "    assert 200 <= response.status_code < 300\n".to_string(),
        StatusExpectation::ClientError => {
            "    assert 400 <= response.status_code < 500\n".to_string()
        }
        StatusExpectation::AuthFailure => {
            "    assert response.status_code in (401, 403)\n".to_string()
        }
    }
}
