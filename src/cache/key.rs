//! Cache key derivation.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Reserved query parameter that forces a cache miss.
pub const CACHE_BUST_PARAM: &str = "_t";

/// `<endpoint>:<sha256 of the canonical parameter set>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Key for `endpoint` under the given query parameters. Parameter order
    /// does not matter and [`CACHE_BUST_PARAM`] is ignored.
    pub fn for_endpoint<I, K, V>(endpoint: &str, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let canonical: BTreeMap<String, String> = params
            .into_iter()
            .filter(|(k, _)| k.as_ref() != CACHE_BUST_PARAM)
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .collect();

        let mut hasher = Sha256::new();
        hasher.update(endpoint.as_bytes());
        for (k, v) in &canonical {
            // NUL never appears in a decoded query string, so pairs cannot run together.
            hasher.update([0]);
            hasher.update(k.as_bytes());
            hasher.update([0]);
            hasher.update(v.as_bytes());
        }
        let digest: String = hasher.finalize().iter().map(|b| format!("{b:02x}")).collect();
        Self(format!("{endpoint}:{digest}"))
    }

    /// Same key under a namespace prefix.
    pub fn prefixed(&self, prefix: &str) -> Self {
        Self(format!("{prefix}:{}", self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
