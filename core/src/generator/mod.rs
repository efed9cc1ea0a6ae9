#![deny(missing_docs)]

//! # Test Body Generator
//!
//! Builds a language-neutral `TestPlan` for one endpoint:
//!
//! - **positive**: minimal valid request, asserts the declared success status
//!   and the required top-level response fields.
//! - **negative** (opt-in): one case per violatable constraint on required
//!   parameters and required body fields, ordered by field then violation.
//! - **security**: a deliberately invalid credential, asserting 401/403.
//!
//! Every iteration is over sorted keys so equal endpoints yield equal plans,
//! regardless of declaration order in the contract.

pub mod plan;
pub mod samples;

pub use plan::{
    AuthSpec, Expectation, RequestSpec, StatusExpectation, TestCase, TestKind, TestPlan,
    TestType, Violation,
};

use crate::contract::{EndpointSpec, ParamLocation, Parameter, SecurityRequirement};
use crate::fingerprint::short_digest;
use heck::ToSnakeCase;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use samples::{out_of_range_value, required_fields, sample_value, wrong_type_value, Channel};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};

/// Characters left unescaped in a path segment (RFC 3986 unreserved).
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Placeholder sent for deliberately invalid credentials.
pub const INVALID_TOKEN: &str = "invalid-token";

/// Request-scoped generation flags.
#[derive(Debug, Clone, Default)]
pub struct GeneratorOptions {
    /// Emit negative tests.
    pub negative_tests: bool,
    /// Credential per security scheme name.
    pub credentials: BTreeMap<String, String>,
}

impl GeneratorOptions {
    /// Digest of everything besides the contract that shapes an endpoint's
    /// region: the negative flag, the target server and the credentials of the
    /// schemes the endpoint accepts.
    pub fn digest(&self, endpoint: &EndpointSpec, base_url: &str) -> String {
        let credentials: BTreeMap<&str, &str> = endpoint
            .security
            .iter()
            .filter_map(|req| {
                let token = self.credentials.get(&req.scheme)?;
                Some((req.scheme.as_str(), token.as_str()))
            })
            .collect();
        let canonical = json!({
            "negative": self.negative_tests,
            "baseUrl": base_url,
            "credentials": credentials,
        });
        short_digest(&canonical.to_string())
    }
}

type ParamKey = (ParamLocation, String);

/// File stem for an endpoint: `snake_case(operationId)`, else `method_path_slug`.
pub fn file_stem(endpoint: &EndpointSpec) -> String {
    if let Some(op) = endpoint.operation_id.as_deref() {
        let stem = op.to_snake_case();
        if !stem.is_empty() {
            return stem;
        }
    }

    let mut parts = vec![endpoint.id.method.to_ascii_lowercase()];
    for segment in endpoint.id.path.split('/').filter(|s| !s.is_empty()) {
        match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(var) => parts.push(format!("by_{}", var.to_snake_case())),
            None => parts.push(segment.to_snake_case()),
        }
    }
    if parts.len() == 1 {
        parts.push("root".into());
    }
    parts.join("_")
}

/// Renders a parameter value as the text that travels on the wire.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>().join(","),
        Value::Object(map) => map
            .iter()
            .flat_map(|(k, v)| [k.clone(), value_text(v)])
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

/// Builds every test for an endpoint.
pub fn build_plan(endpoint: &EndpointSpec, options: &GeneratorOptions) -> TestPlan {
    let stem = file_stem(endpoint);
    let builder = PlanBuilder::new(endpoint, options);

    let mut cases = vec![builder.positive_case(&stem)];
    if options.negative_tests {
        cases.extend(builder.negative_cases(&stem));
    }
    if let Some(case) = builder.security_case(&stem) {
        cases.push(case);
    }

    TestPlan {
        endpoint: endpoint.id.clone(),
        stem,
        cases,
    }
}

struct PlanBuilder<'a> {
    endpoint: &'a EndpointSpec,
    /// Required parameters sorted by (location, name).
    params: Vec<&'a Parameter>,
    values: BTreeMap<ParamKey, Value>,
    body: Option<Value>,
    security: Vec<&'a SecurityRequirement>,
    auth: Option<AuthSpec>,
}

impl<'a> PlanBuilder<'a> {
    fn new(endpoint: &'a EndpointSpec, options: &GeneratorOptions) -> Self {
        let mut params: Vec<&Parameter> = endpoint.required_params().collect();
        params.sort_by(|a, b| (a.location, &a.name).cmp(&(b.location, &b.name)));

        let values = params
            .iter()
            .map(|p| {
                let mut v = sample_value(&p.schema);
                // An empty path segment would change the route.
                if p.location == ParamLocation::Path && value_text(&v).is_empty() {
                    v = Value::String("a".into());
                }
                ((p.location, p.name.clone()), v)
            })
            .collect();

        let body = endpoint.request_body.as_ref().map(|b| {
            b.example
                .clone()
                .unwrap_or_else(|| sample_value(&b.schema))
        });

        let mut security: Vec<&SecurityRequirement> = endpoint.security.iter().collect();
        security.sort_by(|a, b| a.scheme.cmp(&b.scheme));

        let auth = security.iter().find_map(|req| {
            options.credentials.get(&req.scheme).map(|token| AuthSpec {
                scheme: req.scheme.clone(),
                kind: req.kind.clone(),
                token: token.clone(),
            })
        });

        Self {
            endpoint,
            params,
            values,
            body,
            security,
            auth,
        }
    }

    fn positive_case(&self, stem: &str) -> TestCase {
        let (status, required) = self.success_expectation();
        let status_text = match status {
            StatusExpectation::Exact(code) => code.to_string(),
            _ => "2xx".to_string(),
        };
        TestCase {
            name: format!("test_{}", stem),
            kind: TestKind::Positive,
            summary: format!("Positive: {} returns {}", self.endpoint.id, status_text),
            request: self.assemble(&self.values, self.body.clone(), self.auth.clone()),
            expect: Expectation {
                status,
                required_fields: required,
            },
        }
    }

    fn negative_cases(&self, stem: &str) -> Vec<TestCase> {
        let mut targets: Vec<(String, Violation, NegativeTarget)> = Vec::new();

        for p in &self.params {
            let label = format!("{}.{}", p.location.as_str(), p.name);
            let key = (p.location, p.name.clone());
            if p.location != ParamLocation::Path {
                targets.push((label.clone(), Violation::Missing, NegativeTarget::OmitParam(key.clone())));
            }
            if let Some(v) = wrong_type_value(&p.schema, Channel::Param) {
                targets.push((label.clone(), Violation::WrongType, NegativeTarget::SetParam(key.clone(), v)));
            }
            if let Some(v) = out_of_range_value(&p.schema) {
                targets.push((label, Violation::OutOfRange, NegativeTarget::SetParam(key, v)));
            }
        }

        if let Some(body) = &self.endpoint.request_body {
            if body.required {
                targets.push(("body".into(), Violation::Missing, NegativeTarget::OmitBody));
            }
            if let Some(schema) = body.schema.as_object() {
                let merged = samples::merge_all_of(schema);
                let properties = merged.get("properties").and_then(Value::as_object);
                for field in required_fields(schema) {
                    let label = format!("body.{}", field);
                    targets.push((label.clone(), Violation::Missing, NegativeTarget::OmitField(field.clone())));
                    let Some(field_schema) = properties.and_then(|p| p.get(&field)) else {
                        continue;
                    };
                    if let Some(v) = wrong_type_value(field_schema, Channel::Body) {
                        targets.push((label.clone(), Violation::WrongType, NegativeTarget::SetField(field.clone(), v)));
                    }
                    if let Some(v) = out_of_range_value(field_schema) {
                        targets.push((label, Violation::OutOfRange, NegativeTarget::SetField(field.clone(), v)));
                    }
                }
            }
        }

        targets.sort_by(|a, b| (&a.0, a.1).cmp(&(&b.0, b.1)));

        let mut used = HashSet::new();
        targets
            .into_iter()
            .map(|(label, violation, target)| {
                let base = format!("test_{}_{}_{}", stem, label.to_snake_case(), violation.as_str());
                let name = unique_name(&mut used, base);
                self.negative_case(name, &label, violation, target)
            })
            .collect()
    }

    fn negative_case(
        &self,
        name: String,
        label: &str,
        violation: Violation,
        target: NegativeTarget,
    ) -> TestCase {
        let mut values = self.values.clone();
        let mut body = self.body.clone();
        match target {
            NegativeTarget::OmitParam(key) => {
                values.remove(&key);
            }
            NegativeTarget::SetParam(key, v) => {
                values.insert(key, v);
            }
            NegativeTarget::OmitBody => body = None,
            NegativeTarget::OmitField(field) => {
                if let Some(Value::Object(map)) = body.as_mut() {
                    map.remove(&field);
                }
            }
            NegativeTarget::SetField(field, v) => {
                let mut map = match body.take() {
                    Some(Value::Object(map)) => map,
                    _ => Map::new(),
                };
                map.insert(field, v);
                body = Some(Value::Object(map));
            }
        }

        let what = match violation {
            Violation::Missing => "omits",
            Violation::WrongType => "sends a wrong-typed",
            Violation::OutOfRange => "sends an out-of-range",
        };
        TestCase {
            name,
            kind: TestKind::Negative,
            summary: format!("Negative: {} {} `{}`", self.endpoint.id, what, label),
            request: self.assemble(&values, body, self.auth.clone()),
            expect: Expectation {
                status: StatusExpectation::ClientError,
                required_fields: Vec::new(),
            },
        }
    }

    fn security_case(&self, stem: &str) -> Option<TestCase> {
        // A bad credential cannot be rejected when none is needed.
        if self.endpoint.anonymous_allowed {
            return None;
        }
        let req = self.security.first()?;
        let auth = AuthSpec {
            scheme: req.scheme.clone(),
            kind: req.kind.clone(),
            token: INVALID_TOKEN.to_string(),
        };
        Some(TestCase {
            name: format!("test_{}_rejects_invalid_credentials", stem),
            kind: TestKind::Security,
            summary: format!(
                "Security: {} rejects an invalid `{}` credential",
                self.endpoint.id, req.scheme
            ),
            request: self.assemble(&self.values, self.body.clone(), Some(auth)),
            expect: Expectation {
                status: StatusExpectation::AuthFailure,
                required_fields: Vec::new(),
            },
        })
    }

    /// Lowest declared 2xx code (or `Success`) and the required fields of its schema.
    fn success_expectation(&self) -> (StatusExpectation, Vec<String>) {
        let mut exact: Vec<(u16, &String)> = self
            .endpoint
            .responses
            .keys()
            .filter_map(|code| code.parse::<u16>().ok().map(|c| (c, code)))
            .filter(|(c, _)| (200..300).contains(c))
            .collect();
        exact.sort();

        let range = self
            .endpoint
            .responses
            .keys()
            .find(|k| k.eq_ignore_ascii_case("2XX"));
        let (status, key) = match exact.first() {
            Some((code, key)) => (StatusExpectation::Exact(*code), Some(key.as_str())),
            None => (StatusExpectation::Success, range.map(String::as_str)),
        };

        let required = key
            .and_then(|k| self.endpoint.responses.get(k))
            .and_then(Option::as_ref)
            .and_then(Value::as_object)
            .map(required_fields)
            .unwrap_or_default();
        (status, required)
    }

    fn assemble(
        &self,
        values: &BTreeMap<ParamKey, Value>,
        body: Option<Value>,
        auth: Option<AuthSpec>,
    ) -> RequestSpec {
        let mut query = Vec::new();
        let mut headers = Vec::new();
        let mut cookies = Vec::new();
        for ((location, name), value) in values {
            match location {
                ParamLocation::Query => query.push((name.clone(), value.clone())),
                ParamLocation::Header => headers.push((name.clone(), value.clone())),
                ParamLocation::Cookie => cookies.push((name.clone(), value.clone())),
                ParamLocation::Path => {}
            }
        }

        RequestSpec {
            method: self.endpoint.id.method.clone(),
            path: substitute_path(&self.endpoint.id.path, values),
            query,
            headers,
            cookies,
            body: body.and_then(|b| {
                self.endpoint
                    .request_body
                    .as_ref()
                    .map(|rb| (rb.media_type.clone(), b))
            }),
            auth,
        }
    }
}

#[derive(Debug, Clone)]
enum NegativeTarget {
    OmitParam(ParamKey),
    SetParam(ParamKey, Value),
    OmitBody,
    OmitField(String),
    SetField(String, Value),
}

fn unique_name(used: &mut HashSet<String>, base: String) -> String {
    let mut name = base.clone();
    let mut n = 2;
    while !used.insert(name.clone()) {
        name = format!("{}_{}", base, n);
        n += 1;
    }
    name
}

/// Replaces `{var}` segments with percent-encoded parameter values.
fn substitute_path(template: &str, values: &BTreeMap<ParamKey, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}').map(|c| open + c) else {
            break;
        };
        out.push_str(&rest[..open]);
        let var = &rest[open + 1..close];
        let text = values
            .get(&(ParamLocation::Path, var.to_string()))
            .map(value_text)
            .unwrap_or_else(|| "1".to_string());
        out.extend(utf8_percent_encode(&text, PATH_SEGMENT));
        rest = &rest[close + 1..];
    }
    out.push_str(rest);
    out
}
