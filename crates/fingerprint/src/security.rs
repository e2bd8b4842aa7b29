//! Advisory security heuristics.
//!
//! Everything here fails open: a lookup error leaves all network flags false
//! while the check time is still recorded. Nothing here can block sign-in.

use async_trait::async_trait;
use moka::future::Cache;
use serde::Deserialize;
use session_core::{ClientEnvironment, SecurityFlags};
use std::net::IpAddr;
use std::sync::Arc;
use telemetry::metrics;
use tracing::{debug, warn};
use url::Url;

use crate::config::{http_client, is_disabled, SecurityConfig};
use crate::error::LookupError;
use crate::tor::TorExitSource;

const REPUTATION_CACHE_MAX_CAPACITY: u64 = 10_000;

/// Network reputation of one address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct IpReputation {
    #[serde(default)]
    pub vpn: bool,
    #[serde(default)]
    pub proxy: bool,
    #[serde(default)]
    pub tor: bool,
    #[serde(default)]
    pub relay: bool,
}

#[async_trait]
pub trait IpIntelligence: Send + Sync {
    async fn check(&self, ip: IpAddr) -> Result<IpReputation, LookupError>;
}

#[derive(Debug, Deserialize)]
struct VpnApiResponse {
    security: IpReputation,
}

/// vpnapi.io compatible client (`{base}/api/{ip}?key=...`).
#[derive(Clone)]
pub struct HttpIpIntelligence {
    base_url: Option<Url>,
    api_key: Option<String>,
    http_client: reqwest::Client,
    cache: Cache<IpAddr, IpReputation>,
}

impl HttpIpIntelligence {
    pub fn new(config: &SecurityConfig) -> Result<Self, LookupError> {
        let base_url = if is_disabled(&config.intel_url) {
            None
        } else {
            Some(Url::parse(&config.intel_url)?)
        };

        Ok(Self {
            base_url,
            api_key: config.intel_api_key.clone(),
            http_client: http_client(config.timeout())?,
            cache: Cache::builder()
                .max_capacity(REPUTATION_CACHE_MAX_CAPACITY)
                .time_to_live(config.reputation_ttl())
                .build(),
        })
    }

    async fn fetch(&self, base: &Url, ip: IpAddr) -> Result<IpReputation, LookupError> {
        let mut url = base.join(&format!("api/{}", ip))?;
        if let Some(key) = &self.api_key {
            url.query_pairs_mut().append_pair("key", key);
        }

        let response = self.http_client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(LookupError::Status(response.status().as_u16()));
        }

        let body: VpnApiResponse = response
            .json()
            .await
            .map_err(|e| LookupError::Malformed(e.to_string()))?;
        Ok(body.security)
    }
}

#[async_trait]
impl IpIntelligence for HttpIpIntelligence {
    async fn check(&self, ip: IpAddr) -> Result<IpReputation, LookupError> {
        let Some(base) = &self.base_url else {
            return Err(LookupError::Disabled);
        };
        if let Some(cached) = self.cache.get(&ip).await {
            return Ok(cached);
        }

        let reputation = self.fetch(base, ip).await?;
        self.cache.insert(ip, reputation).await;
        Ok(reputation)
    }
}

/// Produces the security flags stored on a new session.
#[async_trait]
pub trait SecurityEvaluator: Send + Sync {
    async fn evaluate(&self, env: &ClientEnvironment) -> SecurityFlags;
}

pub struct HeuristicSecurityEvaluator {
    intelligence: Arc<dyn IpIntelligence>,
    tor_exits: Arc<dyn TorExitSource>,
}

impl HeuristicSecurityEvaluator {
    pub fn new(intelligence: Arc<dyn IpIntelligence>, tor_exits: Arc<dyn TorExitSource>) -> Self {
        Self {
            intelligence,
            tor_exits,
        }
    }
}

#[async_trait]
impl SecurityEvaluator for HeuristicSecurityEvaluator {
    async fn evaluate(&self, env: &ClientEnvironment) -> SecurityFlags {
        let incognito = env.storage.looks_incognito();

        let Some(ip) = env.client_ip else {
            debug!("No client address, skipping network reputation checks");
            return SecurityFlags::fail_open(incognito);
        };

        let (reputation, tor_exit) = tokio::join!(
            self.intelligence.check(ip),
            self.tor_exits.is_exit_node(ip)
        );

        match (reputation, tor_exit) {
            (Ok(reputation), Ok(tor_exit)) => SecurityFlags::new(
                reputation.vpn,
                reputation.proxy || reputation.relay,
                reputation.tor || tor_exit,
                incognito,
            ),
            (reputation, tor_exit) => {
                let error = reputation.err().or(tor_exit.err());
                if let Some(e) = &error {
                    if !matches!(e, LookupError::Disabled) {
                        warn!(%ip, error = %e, "Security lookup failed, failing open");
                        metrics().security_lookup_failures.inc();
                    }
                }
                SecurityFlags::fail_open(incognito)
            }
        }
    }
}
