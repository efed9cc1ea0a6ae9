#![deny(missing_docs)]

//! # Document Loading
//!
//! Turns raw contract text (JSON or YAML) into a `serde_json::Value` tree.
//!
//! YAML is first read into `serde_yaml::Value` and converted by hand so that
//! non-string mapping keys (e.g. unquoted `200:` response codes) become strings
//! instead of failing deserialization.

use crate::error::{AppResult, SyncError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;
use std::str::FromStr;

/// Declared syntax of the contract text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractFormat {
    /// Sniff from the first non-whitespace character.
    #[default]
    Auto,
    /// JSON text.
    Json,
    /// YAML text.
    Yaml,
}

impl FromStr for ContractFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(format!("unknown contract format '{}'", other)),
        }
    }
}

impl fmt::Display for ContractFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Auto => "auto",
            Self::Json => "json",
            Self::Yaml => "yaml",
        };
        f.write_str(s)
    }
}

/// Resolves `Auto` against the text.
pub fn sniff_format(text: &str) -> ContractFormat {
    match text.trim_start().chars().next() {
        Some('{') | Some('[') => ContractFormat::Json,
        _ => ContractFormat::Yaml,
    }
}

/// Parses contract text into a JSON tree.
///
/// # Arguments
///
/// * `text` - Raw contract text.
/// * `format` - Declared format; `Auto` sniffs.
pub fn load_document(text: &str, format: ContractFormat) -> AppResult<Value> {
    if text.trim().is_empty() {
        return Err(SyncError::SpecParse("contract text is empty".into()));
    }

    let format = match format {
        ContractFormat::Auto => sniff_format(text),
        other => other,
    };

    match format {
        ContractFormat::Json => serde_json::from_str(text)
            .map_err(|e| SyncError::SpecParse(format!("invalid JSON: {}", e))),
        _ => {
            let yaml: serde_yaml::Value = serde_yaml::from_str(text)
                .map_err(|e| SyncError::SpecParse(format!("invalid YAML: {}", e)))?;
            yaml_to_json(yaml)
        }
    }
}

fn yaml_to_json(value: serde_yaml::Value) -> AppResult<Value> {
    Ok(match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => yaml_number(&n),
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<AppResult<Vec<_>>>()?,
        ),
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = Map::new();
            for (k, v) in mapping {
                map.insert(yaml_key(k)?, yaml_to_json(v)?);
            }
            Value::Object(map)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

fn yaml_number(n: &serde_yaml::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::Number(i.into())
    } else if let Some(u) = n.as_u64() {
        Value::Number(u.into())
    } else {
        n.as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn yaml_key(key: serde_yaml::Value) -> AppResult<String> {
    match key {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Null => Ok("null".to_string()),
        serde_yaml::Value::Tagged(tagged) => yaml_key(tagged.value),
        other => Err(SyncError::SpecParse(format!(
            "unsupported YAML mapping key: {:?}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sniff_format() {
        assert_eq!(sniff_format("  {\"a\": 1}"), ContractFormat::Json);
        assert_eq!(sniff_format("openapi: 3.0.0"), ContractFormat::Yaml);
    }

    #[test]
    fn test_yaml_numeric_keys_become_strings() {
        let doc = load_document("responses:\n  200:\n    description: OK\n", ContractFormat::Auto)
            .unwrap();
        assert_eq!(doc, json!({"responses": {"200": {"description": "OK"}}}));
    }

    #[test]
    fn test_json_and_yaml_agree() {
        let a = load_document(r#"{"a": [1, 2.5, true, null], "b": "x"}"#, ContractFormat::Json)
            .unwrap();
        let b = load_document("b: x\na: [1, 2.5, true, null]\n", ContractFormat::Yaml).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = load_document("{\"paths\": ", ContractFormat::Auto).unwrap_err();
        assert!(matches!(err, SyncError::SpecParse(_)));
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        let err = load_document("paths: [unclosed", ContractFormat::Yaml).unwrap_err();
        assert!(matches!(err, SyncError::SpecParse(_)));
    }

    #[test]
    fn test_empty_text_is_parse_error() {
        assert!(matches!(
            load_document("   \n", ContractFormat::Auto),
            Err(SyncError::SpecParse(_))
        ));
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("YML".parse::<ContractFormat>().unwrap(), ContractFormat::Yaml);
        assert!("toml".parse::<ContractFormat>().is_err());
    }
}
