#![deny(missing_docs)]

//! # Contract Models
//!
//! Intermediate Representation (IR) of a parsed API contract.
//!
//! Schemas are kept as `serde_json::Value` with every internal `$ref` already
//! inlined, so downstream stages never need the source document again.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Identity of an endpoint: HTTP method (upper case) and path template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndpointId {
    /// HTTP method, upper case (e.g. `GET`).
    pub method: String,
    /// Path template as written in the contract (e.g. `/pet/{petId}`).
    pub path: String,
}

impl EndpointId {
    /// Creates an identity, normalizing the method to upper case.
    pub fn new(method: impl AsRef<str>, path: impl Into<String>) -> Self {
        Self {
            method: method.as_ref().to_ascii_uppercase(),
            path: path.into(),
        }
    }

    /// Parses the `METHOD /path` display form.
    pub fn parse(s: &str) -> Option<Self> {
        let (method, path) = s.trim().split_once(' ')?;
        let path = path.trim();
        if method.is_empty() || !path.starts_with('/') {
            return None;
        }
        Some(Self::new(method, path))
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Where a parameter travels in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    /// Substituted into the path template.
    Path,
    /// Query string.
    Query,
    /// Request header.
    Header,
    /// Cookie header entry.
    Cookie,
}

impl ParamLocation {
    /// Parses the OpenAPI `in` value.
    pub fn from_openapi(s: &str) -> Option<Self> {
        match s {
            "path" => Some(Self::Path),
            "query" => Some(Self::Query),
            "header" => Some(Self::Header),
            "cookie" => Some(Self::Cookie),
            _ => None,
        }
    }

    /// The lowercase OpenAPI name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::Cookie => "cookie",
        }
    }
}

/// A single operation parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name.
    pub name: String,
    /// Location of the parameter.
    pub location: ParamLocation,
    /// Whether the parameter must be sent.
    pub required: bool,
    /// Inlined JSON schema (`{}` when none declared).
    pub schema: Value,
}

/// The request body of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    /// Selected media type (e.g. `application/json`).
    pub media_type: String,
    /// Whether the body is mandatory.
    pub required: bool,
    /// Inlined JSON schema.
    pub schema: Value,
    /// Media-level example, if the contract supplies one.
    pub example: Option<Value>,
}

/// How credentials for a security scheme are presented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SchemeKind {
    /// API key sent in a header, query parameter or cookie.
    ApiKey {
        /// Where the key travels.
        location: ParamLocation,
        /// Header/query/cookie name.
        name: String,
    },
    /// `Authorization: Bearer <token>`.
    HttpBearer,
    /// `Authorization: Basic <token>`.
    HttpBasic,
    /// OAuth2 access token (sent as bearer).
    OAuth2,
    /// OpenID Connect token (sent as bearer).
    OpenIdConnect,
    /// Scheme not declared in components or of an unsupported type.
    Unknown,
}

/// One applicable security scheme with its required scopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityRequirement {
    /// Scheme name as declared in `components.securitySchemes`.
    pub scheme: String,
    /// Resolved scheme kind.
    pub kind: SchemeKind,
    /// Required scopes (may be empty).
    pub scopes: Vec<String>,
}

/// A fully resolved endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointSpec {
    /// `(method, path)` identity.
    pub id: EndpointId,
    /// `operationId`, used for naming generated files and tests.
    pub operation_id: Option<String>,
    /// Parameters in declaration order (path-level first, then operation-level).
    pub params: Vec<Parameter>,
    /// Request body, if any.
    pub request_body: Option<RequestBody>,
    /// Status code (`200`, `4XX`, `default`) to inlined response schema.
    pub responses: IndexMap<String, Option<Value>>,
    /// Applicable security schemes; empty means anonymous access.
    pub security: Vec<SecurityRequirement>,
    /// An empty alternative (`{}`) lets unauthenticated requests through
    /// even though `security` lists schemes.
    #[serde(default)]
    pub anonymous_allowed: bool,
}

impl EndpointSpec {
    /// Parameters that must be sent.
    pub fn required_params(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter().filter(|p| p.required)
    }
}

/// Result of parsing a contract document.
#[derive(Debug, Clone, PartialEq)]
pub struct Contract {
    /// `info.title`, if present.
    pub title: Option<String>,
    /// Server URLs in declaration order.
    pub servers: Vec<String>,
    /// Endpoints in document order.
    pub endpoints: Vec<EndpointSpec>,
}
