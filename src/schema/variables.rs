//! Stable encoding of node variables into slot keys

use crate::schema::types::SchemaNode;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Encode the values of the `declared` variables found in `variables`.
///
/// Values are looked up by name in the flat operation-variables object; a
/// missing value encodes as `null`. Names are emitted in sorted order so the
/// same value set always yields the same key.
pub fn encode_variables(declared: &BTreeMap<String, SchemaNode>, variables: &Value) -> String {
    let picked: Map<String, Value> = declared
        .keys()
        .map(|name| {
            let value = variables.get(name).cloned().unwrap_or(Value::Null);
            (name.clone(), value)
        })
        .collect();
    Value::Object(picked).to_string()
}
