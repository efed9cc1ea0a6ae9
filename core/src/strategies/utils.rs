#![deny(missing_docs)]

//! # Utilities
//!
//! Helpers shared by the strategy renderers: credential placement, media type
//! classification and JSON-to-literal conversion.

use crate::contract::{ParamLocation, SchemeKind};
use crate::generator::{value_text, AuthSpec, RequestSpec};

/// A request flattened to wire text, with credentials applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WireRequest {
    /// Query pairs.
    pub query: Vec<(String, String)>,
    /// Header pairs.
    pub headers: Vec<(String, String)>,
    /// Cookie pairs.
    pub cookies: Vec<(String, String)>,
}

/// Converts parameters to text and places the credential.
pub fn wire_request(request: &RequestSpec) -> WireRequest {
    let text = |pairs: &[(String, serde_json::Value)]| -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.clone(), value_text(v)))
            .collect()
    };
    let mut wire = WireRequest {
        query: text(&request.query),
        headers: text(&request.headers),
        cookies: text(&request.cookies),
    };
    if let Some(auth) = &request.auth {
        apply_auth(auth, &mut wire);
    }
    wire
}

/// Places a credential where its scheme expects it.
pub fn apply_auth(auth: &AuthSpec, wire: &mut WireRequest) {
    match &auth.kind {
        SchemeKind::ApiKey { location, name } => {
            let target = match location {
                ParamLocation::Query => &mut wire.query,
                ParamLocation::Cookie => &mut wire.cookies,
                _ => &mut wire.headers,
            };
            target.retain(|(k, _)| k != name);
            target.push((name.clone(), auth.token.clone()));
        }
        SchemeKind::HttpBasic => set_authorization(wire, format!("Basic {}", auth.token)),
        SchemeKind::HttpBearer
        | SchemeKind::OAuth2
        | SchemeKind::OpenIdConnect
        | SchemeKind::Unknown => set_authorization(wire, format!("Bearer {}", auth.token)),
    }
}

fn set_authorization(wire: &mut WireRequest, value: String) {
    wire.headers
        .retain(|(k, _)| !k.eq_ignore_ascii_case("authorization"));
    wire.headers.push(("Authorization".to_string(), value));
}

/// Lowercased media type without parameters.
pub fn normalize_media_type(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or(media_type)
        .trim()
        .to_ascii_lowercase()
}

/// True for `application/json` and `+json` types.
pub fn is_json_media_type(media_type: &str) -> bool {
    let normalized = normalize_media_type(media_type);
    normalized == "application/json" || normalized.ends_with("+json")
}

/// True for `application/x-www-form-urlencoded`.
pub fn is_form_media_type(media_type: &str) -> bool {
    normalize_media_type(media_type) == "application/x-www-form-urlencoded"
}

/// Escaped Rust string literal.
pub fn rust_string_literal(value: &str) -> String {
    format!("{:?}", value)
}

/// Renders a JSON value as input to the `serde_json::json!` macro.
pub fn rust_json_literal(value: &serde_json::Value) -> String {
    use serde_json::Value;
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => rust_string_literal(s),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(rust_json_literal).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Object(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", rust_string_literal(k), rust_json_literal(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}

/// Escaped Python string literal.
pub fn python_string_literal(value: &str) -> String {
    // JSON string escapes are a subset of Python's.
    serde_json::Value::String(value.to_string()).to_string()
}

/// Renders a JSON value as a Python literal.
pub fn python_literal(value: &serde_json::Value) -> String {
    use serde_json::Value;
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => python_string_literal(s),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(python_literal).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Object(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", python_string_literal(k), python_literal(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}

/// Renders string pairs as a Python dict literal.
pub fn python_dict(pairs: &[(String, String)]) -> String {
    let inner: Vec<String> = pairs
        .iter()
        .map(|(k, v)| format!("{}: {}", python_string_literal(k), python_string_literal(v)))
        .collect();
    format!("{{{}}}", inner.join(", "))
}

/// Joins cookie pairs into a `Cookie` header value.
pub fn cookie_header(cookies: &[(String, String)]) -> String {
    cookies
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(auth: Option<AuthSpec>) -> RequestSpec {
        RequestSpec {
            method: "GET".into(),
            path: "/a".into(),
            query: vec![("limit".into(), json!(10))],
            headers: vec![("Authorization".into(), json!("old"))],
            cookies: Vec::new(),
            body: None,
            auth,
        }
    }

    #[test]
    fn test_bearer_replaces_authorization() {
        let wire = wire_request(&request(Some(AuthSpec {
            scheme: "bearer".into(),
            kind: SchemeKind::HttpBearer,
            token: "t0k".into(),
        })));
        assert_eq!(
            wire.headers,
            vec![("Authorization".to_string(), "Bearer t0k".to_string())]
        );
        assert_eq!(wire.query, vec![("limit".to_string(), "10".to_string())]);
    }

    #[test]
    fn test_api_key_in_query() {
        let wire = wire_request(&request(Some(AuthSpec {
            scheme: "key".into(),
            kind: SchemeKind::ApiKey {
                location: ParamLocation::Query,
                name: "api_key".into(),
            },
            token: "abc".into(),
        })));
        assert_eq!(wire.query.last().unwrap(), &("api_key".to_string(), "abc".to_string()));
    }

    #[test]
    fn test_media_types() {
        assert!(is_json_media_type("application/json; charset=utf-8"));
        assert!(is_json_media_type("application/problem+json"));
        assert!(!is_json_media_type("text/plain"));
        assert!(is_form_media_type("application/x-www-form-urlencoded"));
    }

    #[test]
    fn test_literals() {
        let value = json!({"name": "a\"b", "tags": [null, true, 1.5]});
        assert_eq!(
            python_literal(&value),
            r#"{"name": "a\"b", "tags": [None, True, 1.5]}"#
        );
        assert_eq!(
            rust_json_literal(&value),
            r#"{"name": "a\"b", "tags": [null, true, 1.5]}"#
        );
        assert_eq!(rust_string_literal("é\n"), "\"é\\n\"");
    }

    #[test]
    fn test_cookie_header() {
        let cookies = vec![("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())];
        assert_eq!(cookie_header(&cookies), "a=1; b=2");
    }
}
