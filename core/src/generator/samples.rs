//! # Sample Values
//!
//! Synthesizes minimal valid values from JSON schemas, and the invalid values
//! negative tests send.

use serde_json::{json, Map, Value};

const MAX_DEPTH: usize = 8;

/// Longest synthesized string or array; larger `minLength`/`minItems` are clamped
/// and larger `maxLength` gets no out-of-range value.
const MAX_SAMPLE_LEN: u64 = 4096;

/// Transport of a value; everything but a JSON body travels as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Path, query, header or cookie parameter.
    Param,
    /// Field of a JSON request body.
    Body,
}

/// Returns the declared example, or a synthesized minimal valid value.
pub fn sample_value(schema: &Value) -> Value {
    sample_at(schema, 0)
}

fn sample_at(schema: &Value, depth: usize) -> Value {
    let Some(obj) = schema.as_object() else {
        return Value::Null;
    };
    if depth > MAX_DEPTH {
        return Value::Null;
    }
    if let Some(v) = declared_value(obj) {
        return v;
    }
    // External or recursive reference left in place by the parser.
    if obj.contains_key("$ref") {
        return Value::Null;
    }
    if obj.contains_key("allOf") {
        return sample_at(&merge_all_of(obj), depth + 1);
    }
    for key in ["oneOf", "anyOf"] {
        if let Some(first) = obj.get(key).and_then(Value::as_array).and_then(|a| a.first()) {
            return sample_at(first, depth + 1);
        }
    }

    match schema_type(obj) {
        Some("string") => Value::String(sample_string(obj)),
        Some("integer") => json!(sample_integer(obj)),
        Some("number") => json!(sample_number(obj)),
        Some("boolean") => Value::Bool(true),
        Some("array") => {
            let count = obj
                .get("minItems")
                .and_then(Value::as_u64)
                .unwrap_or(0)
                .min(MAX_SAMPLE_LEN) as usize;
            let item = obj
                .get("items")
                .map(|i| sample_at(i, depth + 1))
                .unwrap_or(Value::Null);
            Value::Array(vec![item; count])
        }
        Some("object") => sample_object(obj, depth),
        _ => Value::Null,
    }
}

fn declared_value(obj: &Map<String, Value>) -> Option<Value> {
    if let Some(v) = obj.get("example") {
        return Some(v.clone());
    }
    if let Some(first) = obj.get("examples").and_then(Value::as_array).and_then(|a| a.first()) {
        return Some(first.clone());
    }
    if let Some(v) = obj.get("const") {
        return Some(v.clone());
    }
    if let Some(first) = obj.get("enum").and_then(Value::as_array).and_then(|a| a.first()) {
        return Some(first.clone());
    }
    obj.get("default").cloned()
}

/// The effective single type of a schema (first non-null entry of a type list,
/// or inferred from structural keywords).
pub fn schema_type(obj: &Map<String, Value>) -> Option<&str> {
    match obj.get("type") {
        Some(Value::String(t)) => Some(t.as_str()),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null"),
        _ if obj.contains_key("properties") => Some("object"),
        _ if obj.contains_key("items") => Some("array"),
        _ => None,
    }
}

fn sample_string(obj: &Map<String, Value>) -> String {
    let formatted = match obj.get("format").and_then(Value::as_str) {
        Some("date") => Some("1970-01-01"),
        Some("date-time") => Some("1970-01-01T00:00:00Z"),
        Some("time") => Some("00:00:00"),
        Some("uuid") => Some("00000000-0000-0000-0000-000000000000"),
        Some("email") => Some("a@b.co"),
        Some("uri") | Some("url") => Some("http://a.co"),
        Some("hostname") => Some("a.co"),
        Some("ipv4") => Some("0.0.0.0"),
        Some("ipv6") => Some("::1"),
        _ => None,
    };
    if let Some(f) = formatted {
        return f.to_string();
    }
    let min = obj
        .get("minLength")
        .and_then(Value::as_u64)
        .unwrap_or(0)
        .min(MAX_SAMPLE_LEN);
    "a".repeat(min as usize)
}

fn sample_integer(obj: &Map<String, Value>) -> i64 {
    let mut v = 0;
    if let Some(lo) = int_lower_bound(obj) {
        v = v.max(lo);
    }
    if let Some(hi) = int_upper_bound(obj) {
        v = v.min(hi);
    }
    v
}

fn sample_number(obj: &Map<String, Value>) -> f64 {
    let mut v: f64 = 0.0;
    if let Some(lo) = obj.get("minimum").and_then(Value::as_f64) {
        let exclusive = obj.get("exclusiveMinimum").and_then(Value::as_bool) == Some(true);
        v = v.max(if exclusive { lo + 1.0 } else { lo });
    }
    if let Some(lo) = obj.get("exclusiveMinimum").and_then(Value::as_f64) {
        v = v.max(lo + 1.0);
    }
    if let Some(hi) = obj.get("maximum").and_then(Value::as_f64) {
        let exclusive = obj.get("exclusiveMaximum").and_then(Value::as_bool) == Some(true);
        v = v.min(if exclusive { hi - 1.0 } else { hi });
    }
    if let Some(hi) = obj.get("exclusiveMaximum").and_then(Value::as_f64) {
        v = v.min(hi - 1.0);
    }
    v
}

/// Smallest allowed integer, honoring both OAS 3.0 boolean and 3.1 numeric exclusivity.
fn int_lower_bound(obj: &Map<String, Value>) -> Option<i64> {
    let inclusive = obj.get("minimum").and_then(Value::as_f64).map(|m| {
        if obj.get("exclusiveMinimum").and_then(Value::as_bool) == Some(true) {
            (m.floor() as i64).saturating_add(1)
        } else {
            m.ceil() as i64
        }
    });
    let exclusive = obj
        .get("exclusiveMinimum")
        .and_then(Value::as_f64)
        .map(|x| (x.floor() as i64).saturating_add(1));
    match (inclusive, exclusive) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// Largest allowed integer.
fn int_upper_bound(obj: &Map<String, Value>) -> Option<i64> {
    let inclusive = obj.get("maximum").and_then(Value::as_f64).map(|m| {
        if obj.get("exclusiveMaximum").and_then(Value::as_bool) == Some(true) {
            (m.ceil() as i64).saturating_sub(1)
        } else {
            m.floor() as i64
        }
    });
    let exclusive = obj
        .get("exclusiveMaximum")
        .and_then(Value::as_f64)
        .map(|x| (x.ceil() as i64).saturating_sub(1));
    match (inclusive, exclusive) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn sample_object(obj: &Map<String, Value>, depth: usize) -> Value {
    let Some(properties) = obj.get("properties").and_then(Value::as_object) else {
        return Value::Object(Map::new());
    };
    let required = required_fields(obj);

    let mut names: Vec<&String> = properties
        .keys()
        .filter(|k| required.is_empty() || required.contains(*k))
        .collect();
    names.sort();

    let mut out = Map::new();
    for name in names {
        out.insert(name.clone(), sample_at(&properties[name.as_str()], depth + 1));
    }
    Value::Object(out)
}

/// Flattens `allOf` into one schema: properties merged, `required` unioned,
/// other keywords taken from the first branch that declares them.
pub fn merge_all_of(obj: &Map<String, Value>) -> Value {
    let mut merged = obj.clone();
    let branches = merged
        .remove("allOf")
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default();

    for branch in branches {
        let branch = match branch.as_object() {
            Some(b) if b.contains_key("allOf") => merge_all_of(b),
            _ => branch.clone(),
        };
        let Some(branch) = branch.as_object() else {
            continue;
        };
        for (key, value) in branch {
            match key.as_str() {
                "properties" => {
                    let target = merged
                        .entry("properties")
                        .or_insert_with(|| Value::Object(Map::new()));
                    if let (Some(t), Some(src)) = (target.as_object_mut(), value.as_object()) {
                        for (name, schema) in src {
                            t.entry(name.clone()).or_insert_with(|| schema.clone());
                        }
                    }
                }
                "required" => {
                    let target = merged
                        .entry("required")
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if let (Some(t), Some(src)) = (target.as_array_mut(), value.as_array()) {
                        for name in src {
                            if !t.contains(name) {
                                t.push(name.clone());
                            }
                        }
                    }
                }
                _ => {
                    merged.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
        }
    }
    Value::Object(merged)
}

/// Sorted `required` names of an object schema (after `allOf` merging).
pub fn required_fields(obj: &Map<String, Value>) -> Vec<String> {
    let merged;
    let obj = if obj.contains_key("allOf") {
        merged = merge_all_of(obj);
        match merged.as_object() {
            Some(m) => m,
            None => return Vec::new(),
        }
    } else {
        obj
    };

    let mut names: Vec<String> = obj
        .get("required")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();
    names.sort();
    names.dedup();
    names
}

/// A value of the wrong type for the schema, when one is expressible on the channel.
pub fn wrong_type_value(schema: &Value, channel: Channel) -> Option<Value> {
    let obj = schema.as_object()?;
    let ty = schema_type(obj)?;
    match (channel, ty) {
        (_, "integer") | (_, "number") => Some(json!("not-a-number")),
        (_, "boolean") => Some(json!("not-a-boolean")),
        (Channel::Body, "string") => Some(json!(12345)),
        (Channel::Body, "array") => Some(json!("not-an-array")),
        (Channel::Body, "object") => Some(json!("not-an-object")),
        _ => None,
    }
}

/// A value violating `enum`, numeric bounds or length bounds, in that priority.
pub fn out_of_range_value(schema: &Value) -> Option<Value> {
    let obj = schema.as_object()?;

    if let Some(options) = obj.get("enum").and_then(Value::as_array) {
        if !options.is_empty() {
            return Some(outside_enum(options));
        }
    }

    match schema_type(obj) {
        // A bound at the i64 limit has no representable neighbour.
        Some("integer") => int_lower_bound(obj)
            .and_then(|lo| lo.checked_sub(1))
            .or_else(|| int_upper_bound(obj).and_then(|hi| hi.checked_add(1)))
            .map(|v| json!(v)),
        Some("number") => {
            let lo = obj
                .get("minimum")
                .or_else(|| obj.get("exclusiveMinimum").filter(|v| v.is_number()))
                .and_then(Value::as_f64);
            let hi = obj
                .get("maximum")
                .or_else(|| obj.get("exclusiveMaximum").filter(|v| v.is_number()))
                .and_then(Value::as_f64);
            lo.map(|lo| json!(lo - 1.0))
                .or_else(|| hi.map(|hi| json!(hi + 1.0)))
        }
        Some("string") => {
            let min = obj.get("minLength").and_then(Value::as_u64).unwrap_or(0);
            if min > 0 && min <= MAX_SAMPLE_LEN {
                return Some(json!("a".repeat(min as usize - 1)));
            }
            obj.get("maxLength")
                .and_then(Value::as_u64)
                .filter(|max| *max < MAX_SAMPLE_LEN)
                .map(|max| json!("a".repeat(max as usize + 1)))
        }
        _ => None,
    }
}

fn outside_enum(options: &[Value]) -> Value {
    let numeric: Vec<i64> = options.iter().filter_map(Value::as_i64).collect();
    if numeric.len() == options.len() {
        let above = numeric.iter().copied().max().and_then(|m| m.checked_add(1));
        let below = numeric.iter().copied().min().and_then(|m| m.checked_sub(1));
        if let Some(v) = above.or(below) {
            return json!(v);
        }
    }

    let mut candidate = String::from("__invalid_enum__");
    while options.iter().any(|o| o.as_str() == Some(candidate.as_str())) {
        candidate.push('_');
    }
    Value::String(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_wins() {
        assert_eq!(
            sample_value(&json!({"type": "string", "example": "doggie"})),
            json!("doggie")
        );
        assert_eq!(
            sample_value(&json!({"type": "string", "enum": ["available", "sold"]})),
            json!("available")
        );
    }

    #[test]
    fn test_minimal_scalars() {
        assert_eq!(sample_value(&json!({"type": "string"})), json!(""));
        assert_eq!(sample_value(&json!({"type": "string", "minLength": 3})), json!("aaa"));
        assert_eq!(sample_value(&json!({"type": "integer"})), json!(0));
        assert_eq!(sample_value(&json!({"type": "integer", "minimum": 1})), json!(1));
        assert_eq!(
            sample_value(&json!({"type": "integer", "minimum": 1, "exclusiveMinimum": true})),
            json!(2)
        );
        assert_eq!(sample_value(&json!({"type": "integer", "maximum": -5})), json!(-5));
        assert_eq!(sample_value(&json!({"type": "boolean"})), json!(true));
        assert_eq!(
            sample_value(&json!({"type": "string", "format": "uuid"})),
            json!("00000000-0000-0000-0000-000000000000")
        );
    }

    #[test]
    fn test_object_uses_required_only() {
        let schema = json!({
            "type": "object",
            "required": ["name", "id"],
            "properties": {
                "status": {"type": "string"},
                "name": {"type": "string", "example": "doggie"},
                "id": {"type": "integer"}
            }
        });
        let value = sample_value(&schema);
        assert_eq!(value, json!({"id": 0, "name": "doggie"}));
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["id", "name"]);
    }

    #[test]
    fn test_object_without_required_uses_all_properties() {
        let schema = json!({"properties": {"b": {"type": "boolean"}, "a": {"type": "integer"}}});
        assert_eq!(sample_value(&schema), json!({"a": 0, "b": true}));
    }

    #[test]
    fn test_all_of_is_merged() {
        let schema = json!({"allOf": [
            {"type": "object", "required": ["a"], "properties": {"a": {"type": "integer"}}},
            {"required": ["b"], "properties": {"b": {"type": "string", "minLength": 1}}}
        ]});
        assert_eq!(sample_value(&schema), json!({"a": 0, "b": "a"}));
        assert_eq!(
            required_fields(schema.as_object().unwrap()),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn test_nullable_type_list_and_arrays() {
        assert_eq!(sample_value(&json!({"type": ["null", "integer"]})), json!(0));
        assert_eq!(
            sample_value(&json!({"type": "array", "minItems": 2, "items": {"type": "boolean"}})),
            json!([true, true])
        );
        assert_eq!(sample_value(&json!({"$ref": "#/recursive"})), Value::Null);
    }

    #[test]
    fn test_wrong_type_depends_on_channel() {
        let s = json!({"type": "string"});
        assert_eq!(wrong_type_value(&s, Channel::Param), None);
        assert_eq!(wrong_type_value(&s, Channel::Body), Some(json!(12345)));
        let i = json!({"type": "integer"});
        assert_eq!(wrong_type_value(&i, Channel::Param), Some(json!("not-a-number")));
    }

    #[test]
    fn test_out_of_range_values() {
        assert_eq!(
            out_of_range_value(&json!({"type": "string", "enum": ["a", "b"]})),
            Some(json!("__invalid_enum__"))
        );
        assert_eq!(out_of_range_value(&json!({"enum": [1, 3]})), Some(json!(4)));
        assert_eq!(
            out_of_range_value(&json!({"type": "integer", "minimum": 1})),
            Some(json!(0))
        );
        assert_eq!(
            out_of_range_value(&json!({"type": "integer", "maximum": 10})),
            Some(json!(11))
        );
        assert_eq!(
            out_of_range_value(&json!({"type": "string", "maxLength": 2})),
            Some(json!("aaa"))
        );
        assert_eq!(out_of_range_value(&json!({"type": "string"})), None);
    }

    #[test]
    fn test_bounds_at_integer_limits() {
        let max = json!({"type": "integer", "format": "int64", "minimum": i64::MAX});
        assert_eq!(sample_value(&max), json!(i64::MAX));
        assert_eq!(out_of_range_value(&max), Some(json!(i64::MAX - 1)));

        let exclusive = json!({"type": "integer", "exclusiveMaximum": i64::MAX});
        assert_eq!(out_of_range_value(&exclusive), Some(json!(i64::MAX)));

        let min_only = json!({"type": "integer", "maximum": i64::MIN});
        assert_eq!(out_of_range_value(&min_only), Some(json!(i64::MIN + 1)));

        assert_eq!(
            out_of_range_value(&json!({"enum": [1, i64::MAX]})),
            Some(json!(0))
        );
        assert_eq!(
            out_of_range_value(&json!({"enum": [i64::MIN, i64::MAX]})),
            Some(json!("__invalid_enum__"))
        );
    }

    #[test]
    fn test_huge_lengths_are_clamped() {
        let s = json!({"type": "string", "minLength": u64::MAX});
        assert_eq!(sample_value(&s).as_str().map(str::len), Some(4096));
        assert_eq!(out_of_range_value(&s), None);

        let long_max = json!({"type": "string", "maxLength": u64::MAX});
        assert_eq!(out_of_range_value(&long_max), None);

        let arr = json!({"type": "array", "items": {"type": "integer"}, "minItems": u64::MAX});
        assert_eq!(sample_value(&arr).as_array().map(Vec::len), Some(4096));
    }
}
