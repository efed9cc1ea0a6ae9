#![deny(missing_docs)]

//! # Contract Parsing
//!
//! Walks `paths` and produces one `EndpointSpec` per operation, with parameters,
//! bodies and responses fully inlined.
//!
//! Handles OpenAPI 3.x and the Swagger 2.0 shapes (`in: body`, `in: formData`,
//! inline parameter types, `securityDefinitions`, `host` + `basePath`).

use crate::contract::document::{load_document, ContractFormat};
use crate::contract::models::{
    Contract, EndpointId, EndpointSpec, ParamLocation, Parameter, RequestBody, SchemeKind,
    SecurityRequirement,
};
use crate::contract::refs::RefResolver;
use crate::error::{AppResult, SyncError};
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// HTTP methods recognized inside a Path Item, in emission order.
pub const METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Keys copied from a Swagger 2.0 non-body parameter into its synthesized schema.
const INLINE_SCHEMA_KEYS: &[&str] = &[
    "type",
    "format",
    "enum",
    "items",
    "default",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "minLength",
    "maxLength",
    "pattern",
    "minItems",
    "maxItems",
];

/// Parses contract text into endpoints.
///
/// # Arguments
///
/// * `text` - Raw contract text (JSON or YAML).
/// * `format` - Declared format; `ContractFormat::Auto` sniffs.
///
/// # Errors
///
/// `SyncError::SpecParse` on malformed syntax, `SyncError::SpecSchema` when the
/// document lacks the minimum OpenAPI shape.
pub fn parse_contract(text: &str, format: ContractFormat) -> AppResult<Contract> {
    let doc = load_document(text, format)?;
    parse_document(&doc)
}

/// Parses an already loaded document tree.
pub fn parse_document(doc: &Value) -> AppResult<Contract> {
    let root = doc
        .as_object()
        .ok_or_else(|| schema_err("contract root must be an object"))?;
    let paths = root
        .get("paths")
        .ok_or_else(|| schema_err("missing 'paths' object"))?
        .as_object()
        .ok_or_else(|| schema_err("'paths' must be an object"))?;

    let ctx = ParseContext {
        resolver: RefResolver::new(doc),
        schemes: collect_schemes(doc),
        global_security: root.get("security"),
        global_consumes: root.get("consumes"),
    };

    let mut endpoints = Vec::new();
    for (path, item) in paths {
        if path.starts_with("x-") {
            continue;
        }
        let item = ctx
            .resolver
            .deref(item)?
            .as_object()
            .ok_or_else(|| schema_err(format!("path item '{}' must be an object", path)))?;

        let path_level = match item.get("parameters") {
            Some(list) => ctx.parse_param_list(list, path)?,
            None => Vec::new(),
        };

        for method in METHODS {
            if let Some(op) = item.get(*method) {
                let id = EndpointId::new(method, path.as_str());
                endpoints.push(ctx.parse_operation(id, op, &path_level)?);
            }
        }
    }

    Ok(Contract {
        title: root
            .get("info")
            .and_then(|i| i.get("title"))
            .and_then(Value::as_str)
            .map(str::to_string),
        servers: collect_servers(root),
        endpoints,
    })
}

/// A parameter entry before Swagger body/form folding.
#[derive(Debug, Clone)]
enum ParamEntry {
    Param(Parameter),
    Body { schema: Value, required: bool },
    FormField(Parameter),
}

struct ParseContext<'a> {
    resolver: RefResolver<'a>,
    schemes: HashMap<String, SchemeKind>,
    global_security: Option<&'a Value>,
    global_consumes: Option<&'a Value>,
}

impl<'a> ParseContext<'a> {
    fn parse_operation(
        &self,
        id: EndpointId,
        op: &Value,
        path_level: &[ParamEntry],
    ) -> AppResult<EndpointSpec> {
        let op = op
            .as_object()
            .ok_or_else(|| schema_err(format!("operation {} must be an object", id)))?;

        // 1. Parameters (operation-level overrides path-level by (in, name))
        let op_level = match op.get("parameters") {
            Some(list) => self.parse_param_list(list, &id.to_string())?,
            None => Vec::new(),
        };
        let entries = merge_params(path_level, op_level);

        let mut params = Vec::new();
        let mut swagger_body = None;
        let mut form_fields = Vec::new();
        for entry in entries {
            match entry {
                ParamEntry::Param(p) => params.push(p),
                ParamEntry::Body { schema, required } => swagger_body = Some((schema, required)),
                ParamEntry::FormField(p) => form_fields.push(p),
            }
        }

        // 2. Request body
        let consumes = op.get("consumes").or(self.global_consumes);
        let request_body = if let Some(rb) = op.get("requestBody") {
            self.parse_request_body(rb, &id)?
        } else if let Some((schema, required)) = swagger_body {
            Some(RequestBody {
                media_type: first_string(consumes).unwrap_or_else(|| "application/json".into()),
                required,
                schema,
                example: None,
            })
        } else if !form_fields.is_empty() {
            Some(form_body(&form_fields, consumes))
        } else {
            None
        };

        // 3. Responses
        let responses = match op.get("responses") {
            Some(r) => self.parse_responses(r, &id)?,
            None => IndexMap::new(),
        };

        // 4. Security
        let (security, anonymous_allowed) = match op.get("security").or(self.global_security) {
            Some(s) => self.parse_security(s, &id)?,
            None => (Vec::new(), true),
        };

        Ok(EndpointSpec {
            operation_id: op
                .get("operationId")
                .and_then(Value::as_str)
                .map(str::to_string),
            id,
            params,
            request_body,
            responses,
            security,
            anonymous_allowed,
        })
    }

    fn parse_param_list(&self, list: &Value, owner: &str) -> AppResult<Vec<ParamEntry>> {
        let items = list
            .as_array()
            .ok_or_else(|| schema_err(format!("{}: 'parameters' must be an array", owner)))?;
        items.iter().map(|p| self.parse_param(p, owner)).collect()
    }

    fn parse_param(&self, node: &Value, owner: &str) -> AppResult<ParamEntry> {
        let node = self.resolver.deref(node)?;
        let obj = node
            .as_object()
            .ok_or_else(|| schema_err(format!("{}: parameter must be an object", owner)))?;
        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| schema_err(format!("{}: parameter missing 'name'", owner)))?
            .to_string();
        let location = obj
            .get("in")
            .and_then(Value::as_str)
            .ok_or_else(|| schema_err(format!("{}: parameter '{}' missing 'in'", owner, name)))?;
        let required = obj.get("required").and_then(Value::as_bool).unwrap_or(false);

        match location {
            "body" => {
                let schema = match obj.get("schema") {
                    Some(s) => self.resolver.inline(s)?,
                    None => json!({}),
                };
                Ok(ParamEntry::Body { schema, required })
            }
            "formData" => Ok(ParamEntry::FormField(Parameter {
                name,
                location: ParamLocation::Query,
                required,
                schema: self.param_schema(obj)?,
            })),
            other => {
                let location = ParamLocation::from_openapi(other).ok_or_else(|| {
                    schema_err(format!(
                        "{}: parameter '{}' has unknown location '{}'",
                        owner, name, other
                    ))
                })?;
                Ok(ParamEntry::Param(Parameter {
                    name,
                    required: required || location == ParamLocation::Path,
                    location,
                    schema: self.param_schema(obj)?,
                }))
            }
        }
    }

    fn param_schema(&self, obj: &Map<String, Value>) -> AppResult<Value> {
        let mut schema = if let Some(s) = obj.get("schema") {
            self.resolver.inline(s)?
        } else if let Some(content) = obj.get("content").and_then(Value::as_object) {
            match select_media(content) {
                Some((_, media)) => match media.get("schema") {
                    Some(s) => self.resolver.inline(s)?,
                    None => json!({}),
                },
                None => json!({}),
            }
        } else {
            let mut inline = Map::new();
            for key in INLINE_SCHEMA_KEYS {
                if let Some(v) = obj.get(*key) {
                    inline.insert((*key).to_string(), self.resolver.inline(v)?);
                }
            }
            Value::Object(inline)
        };

        if let (Some(example), Value::Object(map)) = (obj.get("example"), &mut schema) {
            map.entry("example").or_insert_with(|| example.clone());
        }
        Ok(schema)
    }

    fn parse_request_body(&self, node: &Value, id: &EndpointId) -> AppResult<Option<RequestBody>> {
        let body = self.resolver.inline(node)?;
        let obj = body
            .as_object()
            .ok_or_else(|| schema_err(format!("{}: 'requestBody' must be an object", id)))?;
        let required = obj.get("required").and_then(Value::as_bool).unwrap_or(false);
        let Some(content) = obj.get("content").and_then(Value::as_object) else {
            return Ok(None);
        };
        let Some((media_type, media)) = select_media(content) else {
            return Ok(None);
        };

        Ok(Some(RequestBody {
            media_type: media_type.clone(),
            required,
            schema: media.get("schema").cloned().unwrap_or_else(|| json!({})),
            example: media_example(media),
        }))
    }

    fn parse_responses(
        &self,
        node: &Value,
        id: &EndpointId,
    ) -> AppResult<IndexMap<String, Option<Value>>> {
        let map = self
            .resolver
            .deref(node)?
            .as_object()
            .ok_or_else(|| schema_err(format!("{}: 'responses' must be an object", id)))?;

        let mut out = IndexMap::new();
        for (code, response) in map {
            if code.starts_with("x-") {
                continue;
            }
            let response = self.resolver.inline(response)?;
            let obj = response.as_object().ok_or_else(|| {
                schema_err(format!("{}: response '{}' must be an object", id, code))
            })?;

            let schema = if let Some(content) = obj.get("content").and_then(Value::as_object) {
                select_media(content).and_then(|(_, media)| media.get("schema").cloned())
            } else {
                obj.get("schema").cloned()
            };
            out.insert(code.clone(), schema);
        }
        Ok(out)
    }

    /// Flattened requirements, and whether any alternative is empty.
    fn parse_security(
        &self,
        node: &Value,
        id: &EndpointId,
    ) -> AppResult<(Vec<SecurityRequirement>, bool)> {
        let alternatives = node
            .as_array()
            .ok_or_else(|| schema_err(format!("{}: 'security' must be an array", id)))?;

        let mut out: Vec<SecurityRequirement> = Vec::new();
        let mut anonymous = alternatives.is_empty();
        for alternative in alternatives {
            let Some(obj) = alternative.as_object() else {
                return Err(schema_err(format!(
                    "{}: security requirement must be an object",
                    id
                )));
            };
            anonymous |= obj.is_empty();
            for (scheme, scopes) in obj {
                if out.iter().any(|r| &r.scheme == scheme) {
                    continue;
                }
                let scopes = scopes
                    .as_array()
                    .map(|s| {
                        s.iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                out.push(SecurityRequirement {
                    scheme: scheme.clone(),
                    kind: self
                        .schemes
                        .get(scheme)
                        .cloned()
                        .unwrap_or(SchemeKind::Unknown),
                    scopes,
                });
            }
        }
        Ok((out, anonymous))
    }
}

fn merge_params(path_level: &[ParamEntry], op_level: Vec<ParamEntry>) -> Vec<ParamEntry> {
    let mut merged: Vec<ParamEntry> = path_level.to_vec();
    for entry in op_level {
        let key = entry_key(&entry);
        match merged.iter().position(|e| entry_key(e) == key) {
            Some(idx) => merged[idx] = entry,
            None => merged.push(entry),
        }
    }
    merged
}

fn entry_key(entry: &ParamEntry) -> (String, String) {
    match entry {
        ParamEntry::Param(p) => (p.location.as_str().to_string(), p.name.clone()),
        ParamEntry::Body { .. } => ("body".to_string(), String::new()),
        ParamEntry::FormField(p) => ("formData".to_string(), p.name.clone()),
    }
}

fn form_body(fields: &[Parameter], consumes: Option<&Value>) -> RequestBody {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for field in fields {
        properties.insert(field.name.clone(), field.schema.clone());
        if field.required {
            required.push(Value::String(field.name.clone()));
        }
    }

    let media_type = consumes
        .and_then(Value::as_array)
        .and_then(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .find(|m| m.starts_with("multipart/"))
        })
        .unwrap_or("application/x-www-form-urlencoded")
        .to_string();

    RequestBody {
        media_type,
        required: !required.is_empty(),
        schema: json!({"type": "object", "properties": properties, "required": required}),
        example: None,
    }
}

/// Picks `application/json`, then any `+json` type, then the first declared.
fn select_media(content: &Map<String, Value>) -> Option<(&String, &Value)> {
    content
        .iter()
        .find(|(k, _)| k.as_str() == "application/json" || k.starts_with("application/json;"))
        .or_else(|| {
            content
                .iter()
                .find(|(k, _)| k.split(';').next().is_some_and(|m| m.ends_with("+json")))
        })
        .or_else(|| content.iter().next())
}

fn media_example(media: &Value) -> Option<Value> {
    if let Some(example) = media.get("example") {
        return Some(example.clone());
    }
    media
        .get("examples")
        .and_then(Value::as_object)
        .and_then(|examples| examples.values().next())
        .and_then(|ex| ex.get("value"))
        .cloned()
}

fn first_string(node: Option<&Value>) -> Option<String> {
    node?.as_array()?.first()?.as_str().map(str::to_string)
}

fn collect_schemes(doc: &Value) -> HashMap<String, SchemeKind> {
    let resolver = RefResolver::new(doc);
    let section = doc
        .get("components")
        .and_then(|c| c.get("securitySchemes"))
        .or_else(|| doc.get("securityDefinitions"))
        .and_then(Value::as_object);

    let mut out = HashMap::new();
    for (name, scheme) in section.into_iter().flatten() {
        let Ok(scheme) = resolver.deref(scheme) else {
            continue;
        };
        out.insert(name.clone(), scheme_kind(scheme));
    }
    out
}

fn scheme_kind(scheme: &Value) -> SchemeKind {
    let field = |k: &str| scheme.get(k).and_then(Value::as_str).unwrap_or_default();
    match field("type") {
        "apiKey" => match ParamLocation::from_openapi(field("in")) {
            Some(location) if location != ParamLocation::Path => SchemeKind::ApiKey {
                location,
                name: field("name").to_string(),
            },
            _ => SchemeKind::Unknown,
        },
        "http" => match field("scheme").to_ascii_lowercase().as_str() {
            "bearer" => SchemeKind::HttpBearer,
            "basic" => SchemeKind::HttpBasic,
            _ => SchemeKind::Unknown,
        },
        "basic" => SchemeKind::HttpBasic,
        "oauth2" => SchemeKind::OAuth2,
        "openIdConnect" => SchemeKind::OpenIdConnect,
        _ => SchemeKind::Unknown,
    }
}

fn collect_servers(root: &Map<String, Value>) -> Vec<String> {
    if let Some(servers) = root.get("servers").and_then(Value::as_array) {
        return servers
            .iter()
            .filter_map(|s| s.get("url").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
    }

    match root.get("host").and_then(Value::as_str) {
        Some(host) => {
            let scheme = first_string(root.get("schemes")).unwrap_or_else(|| "https".into());
            let base = root.get("basePath").and_then(Value::as_str).unwrap_or("");
            vec![format!("{}://{}{}", scheme, host, base.trim_end_matches('/'))]
        }
        None => Vec::new(),
    }
}

fn schema_err(msg: impl Into<String>) -> SyncError {
    SyncError::SpecSchema(msg.into())
}
