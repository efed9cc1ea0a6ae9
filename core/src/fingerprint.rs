#![deny(missing_docs)]

//! # Fingerprint Engine
//!
//! Derives a stable SHA-256 digest per endpoint from a canonical serialization:
//!
//! - object keys sorted recursively,
//! - `required` arrays treated as sets,
//! - parameters ordered by `location + name`, responses by status code,
//!   security requirements by scheme name (scopes sorted),
//! - documentation-only keywords (`description`, `summary`, `title`,
//!   `externalDocs`, `deprecated`, `x-*`) dropped from schemas.
//!
//! Key order, whitespace and JSON-vs-YAML differences therefore never change a
//! fingerprint, while added/removed fields and type changes always do.

use crate::contract::{EndpointSpec, SecurityRequirement};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Schema keys whose values map names to sub-schemas.
const NAMED_SCHEMA_MAPS: &[&str] = &[
    "properties",
    "patternProperties",
    "definitions",
    "$defs",
    "dependentSchemas",
];

/// Schema keys holding literal instance data.
const LITERAL_KEYS: &[&str] = &["example", "examples", "default", "enum", "const"];

/// Documentation-only schema keywords.
const DOC_KEYS: &[&str] = &["description", "summary", "title", "externalDocs", "deprecated"];

/// Lower-case hex SHA-256 digest of an endpoint's canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Returns the hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == 64 && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
            Ok(Self(s.to_string()))
        } else {
            Err(format!("'{}' is not a sha256 hex digest", s))
        }
    }
}

/// Computes the fingerprint of an endpoint.
pub fn fingerprint(endpoint: &EndpointSpec) -> Fingerprint {
    let canonical = canonical_endpoint(endpoint);
    Fingerprint(sha256_hex(canonical.to_string().as_bytes()))
}

/// Builds the canonical JSON form that the fingerprint hashes.
pub fn canonical_endpoint(endpoint: &EndpointSpec) -> Value {
    let mut params: Vec<_> = endpoint.params.iter().collect();
    params.sort_by(|a, b| (a.location, &a.name).cmp(&(b.location, &b.name)));
    let params: Vec<Value> = params
        .into_iter()
        .map(|p| {
            json!({
                "location": p.location.as_str(),
                "name": p.name,
                "required": p.required,
                "schema": canonical_schema(&p.schema),
            })
        })
        .collect();

    let request_body = endpoint.request_body.as_ref().map(|b| {
        json!({
            "mediaType": b.media_type.to_ascii_lowercase(),
            "required": b.required,
            "schema": canonical_schema(&b.schema),
            "example": b.example.as_ref().map(sort_keys),
        })
    });

    let mut responses: Vec<_> = endpoint.responses.iter().collect();
    responses.sort_by(|a, b| a.0.cmp(b.0));
    let responses: Vec<Value> = responses
        .into_iter()
        .map(|(code, schema)| json!([code, schema.as_ref().map(canonical_schema)]))
        .collect();

    let mut security: Vec<&SecurityRequirement> = endpoint.security.iter().collect();
    security.sort_by(|a, b| a.scheme.cmp(&b.scheme));
    let security: Vec<Value> = security
        .into_iter()
        .map(|s| {
            let mut scopes = s.scopes.clone();
            scopes.sort();
            scopes.dedup();
            json!({
                "scheme": s.scheme,
                "kind": sort_keys(&serde_json::to_value(&s.kind).unwrap_or(Value::Null)),
                "scopes": scopes,
            })
        })
        .collect();

    sort_keys(&json!({
        "id": endpoint.id.to_string(),
        "operationId": endpoint.operation_id,
        "params": params,
        "requestBody": request_body,
        "responses": responses,
        "security": security,
        "anonymousAllowed": endpoint.anonymous_allowed,
    }))
}

/// Canonicalizes a schema node.
pub fn canonical_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map
                .keys()
                .filter(|k| !k.starts_with("x-") && !DOC_KEYS.contains(&k.as_str()))
                .collect();
            keys.sort();

            let mut out = Map::new();
            for key in keys {
                let child = &map[key.as_str()];
                let value = if NAMED_SCHEMA_MAPS.contains(&key.as_str()) {
                    canonical_named_map(child)
                } else if LITERAL_KEYS.contains(&key.as_str()) {
                    sort_keys(child)
                } else if key == "required" {
                    canonical_required(child)
                } else {
                    canonical_schema(child)
                };
                out.insert(key.clone(), value);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical_schema).collect()),
        other => other.clone(),
    }
}

fn canonical_named_map(node: &Value) -> Value {
    match node {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for key in keys {
                out.insert(key.clone(), canonical_schema(&map[key.as_str()]));
            }
            Value::Object(out)
        }
        other => canonical_schema(other),
    }
}

fn canonical_required(node: &Value) -> Value {
    match node {
        Value::Array(items) => {
            let mut names: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            names.sort_unstable();
            names.dedup();
            json!(names)
        }
        // OAS 2 / parameter-level boolean `required`
        other => other.clone(),
    }
}

/// Recursively rebuilds objects with sorted keys.
pub fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for key in keys {
                out.insert(key.clone(), sort_keys(&map[key.as_str()]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Short (8 hex chars) digest of arbitrary text, used to disambiguate file names.
pub fn short_digest(text: &str) -> String {
    sha256_hex(text.as_bytes())[..8].to_string()
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
