use crate::{Error, ErrorContext, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One page of upstream records.
///
/// RedTrack answers either with a bare array or with `{"items": [...], "total": n}`;
/// both shapes decode into this through [`Page::from_value`]. The derived
/// serde impls only cover the normalized `{items, total}` form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }
}

impl<T> Page<T> {
    /// Upstream reported more records than this page carries.
    pub fn is_partial(&self) -> bool {
        self.total > self.items.len() as u64
    }
}

impl<T: DeserializeOwned> Page<T> {
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Array(items) => {
                let items = decode_items(items)?;
                Ok(Self {
                    total: items.len() as u64,
                    items,
                })
            }
            Value::Object(mut map) => {
                let items = match map.remove("items") {
                    Some(Value::Array(items)) => decode_items(items)?,
                    Some(Value::Null) | None => Vec::new(),
                    Some(other) => return Err(shape_error(&other)),
                };
                let total = map
                    .get("total")
                    .and_then(|t| t.as_u64().or_else(|| t.as_str().and_then(|s| s.parse().ok())))
                    .unwrap_or(items.len() as u64);
                Ok(Self { items, total })
            }
            other => Err(shape_error(&other)),
        }
    }
}

fn decode_items<T: DeserializeOwned>(items: Vec<Value>) -> Result<Vec<T>> {
    items
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(Error::from))
        .collect()
}

fn shape_error(value: &Value) -> Error {
    let kind = match value {
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        _ => "unexpected value",
    };
    Error::runtime_with_context(
        "unexpected upstream payload shape",
        ErrorContext::new()
            .with_details(format!("expected array or {{items,total}}, got {kind}"))
            .with_source("redtrack_page"),
    )
}
