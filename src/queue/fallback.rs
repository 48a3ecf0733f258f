use serde_json::{json, Value};

/// Payload returned in place of a response when rate-limit retries run out.
///
/// Callers render it as "no data for this period".
#[derive(Debug, Clone, PartialEq)]
pub enum Fallback {
    /// `[]`
    EmptyList,
    /// `{"items": [], "total": 0}`
    EmptyPage,
    Value(Value),
}

impl Fallback {
    pub fn into_value(self) -> Value {
        match self {
            Fallback::EmptyList => json!([]),
            Fallback::EmptyPage => json!({ "items": [], "total": 0 }),
            Fallback::Value(v) => v,
        }
    }
}

impl From<Value> for Fallback {
    fn from(v: Value) -> Self {
        Fallback::Value(v)
    }
}
