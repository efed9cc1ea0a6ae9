#![deny(missing_docs)]

//! # Reference Inlining
//!
//! Resolves same-document `$ref` pointers (`#/components/...`, `#/definitions/...`)
//! and inlines their targets. External references are never fetched and stay in
//! place as opaque `{"$ref": ...}` nodes.
//!
//! Inlining copies shared targets at every use, so a chain of schemas that each
//! reference the next twice grows exponentially. One `inline` call may visit at
//! most `MAX_INLINED_NODES` nodes before the contract is rejected.

use crate::error::{AppResult, SyncError};
use percent_encoding::percent_decode_str;
use serde_json::{Map, Value};

/// Keys whose values are literal data, not schema, and are copied verbatim.
const LITERAL_KEYS: &[&str] = &["example", "examples", "default", "enum", "const"];

/// Upper bound on nodes visited while inlining one value.
pub(crate) const MAX_INLINED_NODES: usize = 200_000;

/// Per-call inlining state.
#[derive(Default)]
struct Walk {
    /// References being expanded, outermost first.
    stack: Vec<String>,
    visited: usize,
}

/// Inlines internal references against a root document.
pub(crate) struct RefResolver<'a> {
    root: &'a Value,
}

impl<'a> RefResolver<'a> {
    pub(crate) fn new(root: &'a Value) -> Self {
        Self { root }
    }

    /// Returns a copy of `node` with every internal `$ref` replaced by its target.
    ///
    /// A reference that re-enters itself (recursive schema) is left as a `$ref`
    /// node at the point of re-entry.
    pub(crate) fn inline(&self, node: &Value) -> AppResult<Value> {
        self.inline_with(node, &mut Walk::default())
    }

    /// Follows a (possibly chained) reference without inlining the target's children.
    pub(crate) fn deref<'b>(&self, node: &'b Value) -> AppResult<&'b Value>
    where
        'a: 'b,
    {
        let mut current = node;
        let mut seen = Vec::new();
        while let Some(r) = ref_of(current) {
            if !r.starts_with('#') || seen.iter().any(|s| s == r) {
                break;
            }
            seen.push(r.to_string());
            current = self.lookup(r)?;
        }
        Ok(current)
    }

    fn inline_with(&self, node: &Value, walk: &mut Walk) -> AppResult<Value> {
        walk.visited += 1;
        if walk.visited > MAX_INLINED_NODES {
            return Err(SyncError::SpecSchema(format!(
                "reference expansion exceeds {} nodes{}",
                MAX_INLINED_NODES,
                walk.stack
                    .first()
                    .map(|r| format!(" (from '{}')", r))
                    .unwrap_or_default()
            )));
        }

        match node {
            Value::Object(map) => {
                if let Some(r) = ref_of(node) {
                    if !r.starts_with('#') || walk.stack.iter().any(|s| s == r) {
                        return Ok(node.clone());
                    }
                    let target = self.lookup(r)?;
                    walk.stack.push(r.to_string());
                    let mut resolved = self.inline_with(target, walk)?;
                    walk.stack.pop();

                    // OAS 3.1 allows siblings next to `$ref`; they refine the target.
                    if let Value::Object(obj) = &mut resolved {
                        for (k, v) in map {
                            if k != "$ref" {
                                obj.insert(k.clone(), self.inline_child(k, v, walk)?);
                            }
                        }
                    }
                    return Ok(resolved);
                }

                let mut out = Map::new();
                for (k, v) in map {
                    out.insert(k.clone(), self.inline_child(k, v, walk)?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => Ok(Value::Array(
                items
                    .iter()
                    .map(|v| self.inline_with(v, walk))
                    .collect::<AppResult<Vec<_>>>()?,
            )),
            other => Ok(other.clone()),
        }
    }

    fn inline_child(&self, key: &str, value: &Value, walk: &mut Walk) -> AppResult<Value> {
        if LITERAL_KEYS.contains(&key) {
            Ok(value.clone())
        } else {
            self.inline_with(value, walk)
        }
    }

    /// Resolves a local JSON Pointer (`#/a/b`) against the root.
    pub(crate) fn lookup(&self, reference: &str) -> AppResult<&'a Value> {
        let pointer = reference.trim_start_matches('#');
        if pointer.is_empty() {
            return Ok(self.root);
        }

        let mut current = self.root;
        for segment in pointer.trim_start_matches('/').split('/') {
            let segment = decode_pointer_segment(segment);
            let next = match current {
                Value::Object(map) => map.get(&segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            current = next.ok_or_else(|| {
                SyncError::SpecSchema(format!("unresolved reference '{}'", reference))
            })?;
        }
        Ok(current)
    }
}

fn ref_of(node: &Value) -> Option<&str> {
    node.as_object()?.get("$ref")?.as_str()
}

/// Decodes a JSON Pointer segment (handles `~1` and `~0`).
pub(crate) fn decode_pointer_segment(segment: &str) -> String {
    let decoded = segment.replace("~1", "/").replace("~0", "~");
    percent_decode_str(&decoded)
        .decode_utf8_lossy()
        .into_owned()
}
