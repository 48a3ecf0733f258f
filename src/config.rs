//! Server configuration.
//!
//! Values come from an optional YAML file named by `VMETRICS_CONFIG`, then
//! environment variables override individual fields:
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `VMETRICS_BIND` | `bind` | `0.0.0.0` |
//! | `VMETRICS_PORT` | `port` | `3001` |
//! | `REDTRACK_BASE_URL` | `redtrack_base_url` | `https://api.redtrack.io` |
//! | `VMETRICS_MIN_INTERVAL_MS` | `queue.min_interval_ms` | `1000` |
//! | `VMETRICS_RATE_LIMIT_BACKOFF_MS` | `queue.rate_limit_backoff_ms` | `5000` |
//! | `VMETRICS_RATE_LIMIT_RETRIES` | `queue.rate_limit_retries` | `1` |
//! | `VMETRICS_CACHE_ENABLED` | `cache.enabled` | `true` |
//! | `VMETRICS_CACHE_MAX_ENTRIES` | `cache.max_entries` | `1000` |
//! | `VMETRICS_FUNNEL_TTL_SECS` | `cache.funnel_ttl_secs` | `300` |
//! | `VMETRICS_CONVERSIONS_TTL_SECS` | `cache.conversions_ttl_secs` | `60` |
//! | `VMETRICS_CAMPAIGNS_TTL_SECS` | `cache.campaigns_ttl_secs` | `300` |

use crate::queue::QueueConfig;
use crate::{Error, ErrorContext, Result};
use serde::Deserialize;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    pub min_interval_ms: u64,
    pub rate_limit_backoff_ms: u64,
    pub rate_limit_retries: u32,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            min_interval_ms: 1_000,
            rate_limit_backoff_ms: 5_000,
            rate_limit_retries: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// `false` swaps every endpoint cache for a no-op backend.
    pub enabled: bool,
    pub max_entries: usize,
    pub funnel_ttl_secs: u64,
    pub conversions_ttl_secs: u64,
    pub campaigns_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 1_000,
            funnel_ttl_secs: 300,
            conversions_ttl_secs: 60,
            campaigns_ttl_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub redtrack_base_url: String,
    pub queue: QueueSettings,
    pub cache: CacheSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3001,
            redtrack_base_url: "https://api.redtrack.io".to_string(),
            queue: QueueSettings::default(),
            cache: CacheSettings::default(),
        }
    }
}

impl Config {
    /// Load from `VMETRICS_CONFIG` (if set) and the process environment.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var("VMETRICS_CONFIG") {
            Ok(path) => {
                info!("Loading configuration from {path}");
                Self::from_yaml_str(&std::fs::read_to_string(&path)?)?
            }
            Err(_) => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Override fields from `lookup`, which maps a variable name to its value.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("VMETRICS_BIND") {
            self.bind = bind;
        }
        override_parsed(&lookup, "VMETRICS_PORT", &mut self.port)?;
        if let Some(url) = lookup("REDTRACK_BASE_URL") {
            self.redtrack_base_url = url;
        }

        let q = &mut self.queue;
        override_parsed(&lookup, "VMETRICS_MIN_INTERVAL_MS", &mut q.min_interval_ms)?;
        override_parsed(&lookup, "VMETRICS_RATE_LIMIT_BACKOFF_MS", &mut q.rate_limit_backoff_ms)?;
        override_parsed(&lookup, "VMETRICS_RATE_LIMIT_RETRIES", &mut q.rate_limit_retries)?;

        let c = &mut self.cache;
        override_parsed(&lookup, "VMETRICS_CACHE_ENABLED", &mut c.enabled)?;
        override_parsed(&lookup, "VMETRICS_CACHE_MAX_ENTRIES", &mut c.max_entries)?;
        override_parsed(&lookup, "VMETRICS_FUNNEL_TTL_SECS", &mut c.funnel_ttl_secs)?;
        override_parsed(&lookup, "VMETRICS_CONVERSIONS_TTL_SECS", &mut c.conversions_ttl_secs)?;
        override_parsed(&lookup, "VMETRICS_CAMPAIGNS_TTL_SECS", &mut c.campaigns_ttl_secs)?;

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig::new()
            .with_min_interval(Duration::from_millis(self.queue.min_interval_ms))
            .with_rate_limit_backoff(Duration::from_millis(self.queue.rate_limit_backoff_ms))
            .with_rate_limit_retries(self.queue.rate_limit_retries)
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, slot: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(());
    };
    *slot = raw.trim().parse().map_err(|e: T::Err| {
        Error::configuration_with_context(
            format!("invalid value for {key}: {e}"),
            ErrorContext::new()
                .with_field_path(key)
                .with_details(format!("got {raw:?}"))
                .with_source("config_loader"),
        )
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.bind_address(), "0.0.0.0:3001");
        let q = config.queue_config();
        assert_eq!(q.min_interval, Duration::from_secs(1));
        assert_eq!(q.rate_limit_backoff, Duration::from_secs(5));
        assert_eq!(q.rate_limit_retries, 1);
    }

    #[test]
    fn test_yaml_then_env_override() {
        let mut config = Config::from_yaml_str(
            r#"
port: 8080
queue:
  min_interval_ms: 1500
cache:
  funnel_ttl_secs: 120
"#,
        )
        .unwrap();
        assert_eq!(config.queue.rate_limit_backoff_ms, 5_000);
        assert_eq!(config.cache.funnel_ttl_secs, 120);

        config
            .apply_env(env(&[
                ("VMETRICS_PORT", "9090"),
                ("VMETRICS_MIN_INTERVAL_MS", " 2000 "),
                ("REDTRACK_BASE_URL", "http://localhost:4010"),
                ("VMETRICS_CACHE_ENABLED", "false"),
            ]))
            .unwrap();

        assert_eq!(config.port, 9090);
        assert_eq!(config.queue.min_interval_ms, 2_000);
        assert_eq!(config.redtrack_base_url, "http://localhost:4010");
        assert_eq!(config.cache.funnel_ttl_secs, 120);
        assert!(!config.cache.enabled);
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = Config::default();
        let err = config
            .apply_env(env(&[("VMETRICS_RATE_LIMIT_RETRIES", "twice")]))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("VMETRICS_RATE_LIMIT_RETRIES")
        );
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            Config::from_yaml_str("port: [not, a, port]"),
            Err(Error::Yaml(_))
        ));
    }
}
