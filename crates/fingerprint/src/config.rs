//! Lookup endpoint configuration.
//!
//! An empty URL or the literal "mock" disables the corresponding lookup.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FingerprintConfig {
    #[serde(default)]
    pub geo: GeoConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoConfig {
    /// ipapi.co compatible base URL
    #[serde(default = "default_geo_url")]
    pub url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_geo_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// vpnapi.io compatible base URL
    #[serde(default = "default_intel_url")]
    pub intel_url: String,
    #[serde(default)]
    pub intel_api_key: Option<String>,
    #[serde(default = "default_tor_list_url")]
    pub tor_list_url: String,
    #[serde(default = "default_tor_list_ttl_secs")]
    pub tor_list_ttl_secs: u64,
    #[serde(default = "default_reputation_ttl_secs")]
    pub reputation_ttl_secs: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_geo_url() -> String {
    "https://ipapi.co".to_string()
}

fn default_intel_url() -> String {
    "https://vpnapi.io".to_string()
}

fn default_tor_list_url() -> String {
    "https://check.torproject.org/torbulkexitlist".to_string()
}

fn default_timeout_ms() -> u64 {
    3_000
}

fn default_geo_cache_ttl_secs() -> u64 {
    600
}

fn default_tor_list_ttl_secs() -> u64 {
    3_600
}

fn default_reputation_ttl_secs() -> u64 {
    86_400
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            url: default_geo_url(),
            timeout_ms: default_timeout_ms(),
            cache_ttl_secs: default_geo_cache_ttl_secs(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            intel_url: default_intel_url(),
            intel_api_key: None,
            tor_list_url: default_tor_list_url(),
            tor_list_ttl_secs: default_tor_list_ttl_secs(),
            reputation_ttl_secs: default_reputation_ttl_secs(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl GeoConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl SecurityConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn tor_list_ttl(&self) -> Duration {
        Duration::from_secs(self.tor_list_ttl_secs)
    }

    pub fn reputation_ttl(&self) -> Duration {
        Duration::from_secs(self.reputation_ttl_secs)
    }
}

pub(crate) fn is_disabled(url: &str) -> bool {
    url.is_empty() || url == "mock"
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("session-lifecycle/", env!("CARGO_PKG_VERSION")))
        .build()
}
