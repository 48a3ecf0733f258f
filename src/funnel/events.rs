//! Upstream event records consumed by the projector.
//!
//! RedTrack is loose with types: counters come back as numbers, numeric
//! strings or `null` depending on the endpoint, so every field decodes
//! leniently and defaults to zero/empty.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionEvent {
    #[serde(
        default,
        rename = "type",
        alias = "event_type",
        deserialize_with = "lenient_string"
    )]
    pub event_type: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: String,
    #[serde(default, alias = "pre_landing_views", deserialize_with = "lenient_u64")]
    pub prelp_views: u64,
    #[serde(default, alias = "landing_views", deserialize_with = "lenient_u64")]
    pub lp_views: u64,
    #[serde(default, alias = "lp_clicks", deserialize_with = "lenient_u64")]
    pub offer_views: u64,
}

impl ConversionEvent {
    pub fn is_type(&self, tag: &str) -> bool {
        self.event_type.eq_ignore_ascii_case(tag)
    }

    pub fn is_approved(&self) -> bool {
        self.status.eq_ignore_ascii_case("APPROVED")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackEvent {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub clicks: u64,
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| *f > 0.0).map(|f| f as u64))
                .unwrap_or(0)
        }
        _ => 0,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}
