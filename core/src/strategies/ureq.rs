#![deny(missing_docs)]

//! # Ureq Strategy
//!
//! Renders tests as Rust integration tests (`tests/*_test.rs`) driving a
//! blocking `ureq` 3 agent. The generated crate needs `ureq` and `serde_json`
//! as dev-dependencies.

use super::traits::TestStrategy;
use super::utils::{
    cookie_header, is_form_media_type, is_json_media_type, rust_json_literal,
    rust_string_literal, wire_request,
};
use crate::generator::{value_text, StatusExpectation, TestCase};

/// Rust + ureq.
#[derive(Debug, Clone, Copy, Default)]
pub struct UreqStrategy;

/// Methods whose ureq builders accept a body without `force_send_body`.
const BODY_METHODS: &[&str] = &["POST", "PUT", "PATCH"];

impl TestStrategy for UreqStrategy {
    fn name(&self) -> &'static str {
        "ureq"
    }

    fn comment_prefix(&self) -> &'static str {
        "//"
    }

    fn file_name(&self, stem: &str) -> String {
        format!("{}_test.rs", stem)
    }

    fn matches_file_name(&self, name: &str) -> bool {
        name.ends_with("_test.rs") && name.len() > "_test.rs".len()
    }

    fn render_prelude(&self, base_url: &str) -> String {
        let mut code = String::new();
        code.push_str(&format!(
            "const BASE_URL: &str = {};\n\n",
            rust_string_literal(base_url)
        ));
        code.push_str("fn agent() -> ureq::Agent {\n");
        code.push_str("    ureq::Agent::config_builder()\n");
        code.push_str("        .http_status_as_error(false)\n");
        code.push_str("        .build()\n");
        code.push_str("        .into()\n");
        code.push_str("}\n");
        code
    }

    fn render_case(&self, case: &TestCase, _base_url: &str) -> String {
        let request = &case.request;
        let wire = wire_request(request);

        let mut code = String::new();
        code.push_str("#[test]\n");
        code.push_str(&format!("fn {}() {{\n", case.name));
        code.push_str(&format!("    // {}\n", case.summary));
        code.push_str("    let response = agent()\n");
        code.push_str(&format!(
            "        .{}(format!(\"{{}}{{}}\", BASE_URL, {}))\n",
            request.method.to_ascii_lowercase(),
            rust_string_literal(&request.path)
        ));
        for (k, v) in &wire.query {
            code.push_str(&format!(
                "        .query({}, {})\n",
                rust_string_literal(k),
                rust_string_literal(v)
            ));
        }
        for (k, v) in &wire.headers {
            code.push_str(&format!(
                "        .header({}, {})\n",
                rust_string_literal(k),
                rust_string_literal(v)
            ));
        }
        if !wire.cookies.is_empty() {
            code.push_str(&format!(
                "        .header(\"Cookie\", {})\n",
                rust_string_literal(&cookie_header(&wire.cookies))
            ));
        }

        match &request.body {
            Some((media_type, body)) => {
                if !BODY_METHODS.contains(&request.method.as_str()) {
                    code.push_str("        .force_send_body()\n");
                }
                if is_json_media_type(media_type) {
                    code.push_str(&format!(
                        "        .send_json(serde_json::json!({}))\n",
                        rust_json_literal(body)
                    ));
                } else if is_form_media_type(media_type) {
                    let pairs: Vec<String> = body
                        .as_object()
                        .map(|m| {
                            m.iter()
                                .map(|(k, v)| {
                                    format!(
                                        "({}, {})",
                                        rust_string_literal(k),
                                        rust_string_literal(&value_text(v))
                                    )
                                })
                                .collect()
                        })
                        .unwrap_or_default();
                    code.push_str(&format!("        .send_form([{}])\n", pairs.join(", ")));
                } else {
                    let raw = match body {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    code.push_str(&format!(
                        "        .header(\"Content-Type\", {})\n",
                        rust_string_literal(media_type)
                    ));
                    code.push_str(&format!("        .send({})\n", rust_string_literal(&raw)));
                }
            }
            // Body-carrying builders have no `call()`.
            None if BODY_METHODS.contains(&request.method.as_str()) => {
                code.push_str("        .send_empty()\n")
            }
            None => code.push_str("        .call()\n"),
        }
        code.push_str("        .expect(\"request failed\");\n");

        code.push_str("    let status = response.status().as_u16();\n");
        code.push_str(&status_assertion(case.expect.status));
        if !case.expect.required_fields.is_empty() {
            code.push_str("    let body: serde_json::Value = response\n");
            code.push_str("        .into_body()\n");
            code.push_str("        .read_json()\n");
            code.push_str("        .expect(\"response is not JSON\");\n");
            for field in &case.expect.required_fields {
                code.push_str(&format!(
                    "    assert!(body.get({}).is_some());\n",
                    rust_string_literal(field)
                ));
            }
        }
        code.push_str("}\n");
        code
    }
}

fn status_assertion(status: StatusExpectation) -> String {
    match status {
        StatusExpectation::Exact(code) => format!("    assert_eq!(status, {});\n", code),
        StatusExpectation::Success => "    assert!((200..300).contains(&status));\n".to_string(),
        StatusExpectation::ClientError => {
            "    assert!((400..500).contains(&status));\n".to_string()
        }
        StatusExpectation::AuthFailure => {
            "    assert!(status == 401 || status == 403);\n".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{Expectation, RequestSpec, TestKind};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn case(method: &str, body: Option<(String, serde_json::Value)>) -> TestCase {
        TestCase {
            name: "test_update_pet".into(),
            kind: TestKind::Negative,
            summary: "Negative: PUT /pet omits `body.name`".into(),
            request: RequestSpec {
                method: method.into(),
                path: "/pet".into(),
                query: Vec::new(),
                headers: Vec::new(),
                cookies: vec![("session".into(), json!("x"))],
                body,
                auth: None,
            },
            expect: Expectation {
                status: StatusExpectation::ClientError,
                required_fields: Vec::new(),
            },
        }
    }

    #[test]
    fn test_file_naming() {
        let s = UreqStrategy;
        assert_eq!(s.file_name("update_pet"), "update_pet_test.rs");
        assert!(s.matches_file_name("update_pet_test.rs"));
        assert!(!s.matches_file_name("_test.rs"));
        assert!(!s.matches_file_name("lib.rs"));
    }

    #[test]
    fn test_render_json_case() {
        let code = UreqStrategy.render_case(
            &case("PUT", Some(("application/json".into(), json!({"status": "sold"})))),
            "http://localhost",
        );
        let expected = r#"#[test]
fn test_update_pet() {
    // Negative: PUT /pet omits `body.name`
    let response = agent()
        .put(format!("{}{}", BASE_URL, "/pet"))
        .header("Cookie", "session=x")
        .send_json(serde_json::json!({"status": "sold"}))
        .expect("request failed");
    let status = response.status().as_u16();
    assert!((400..500).contains(&status));
}
"#;
        assert_eq!(code, expected);
    }

    #[test]
    fn test_body_on_delete_forces_send() {
        let code = UreqStrategy.render_case(
            &case("DELETE", Some(("text/plain".into(), json!("bye")))),
            "http://localhost",
        );
        assert!(code.contains(".delete(format!"));
        assert!(code.contains(".force_send_body()\n"));
        assert!(code.contains(".header(\"Content-Type\", \"text/plain\")"));
        assert!(code.contains(".send(\"bye\")"));
    }

    #[test]
    fn test_no_body_calls() {
        let code = UreqStrategy.render_case(&case("GET", None), "http://localhost");
        assert!(code.contains("        .call()\n"));
    }

    #[test]
    fn test_bodyless_post_sends_empty() {
        for method in ["POST", "PUT", "PATCH"] {
            let code = UreqStrategy.render_case(&case(method, None), "http://localhost");
            assert!(code.contains("        .send_empty()\n"), "{}", method);
            assert!(!code.contains(".call()"), "{}", method);
        }
    }
}
