//! Tor exit node membership.

use async_trait::async_trait;
use moka::future::Cache;
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use telemetry::metrics;
use tracing::{debug, info};
use url::Url;

use crate::config::{http_client, is_disabled, SecurityConfig};
use crate::error::LookupError;

#[async_trait]
pub trait TorExitSource: Send + Sync {
    async fn is_exit_node(&self, ip: IpAddr) -> Result<bool, LookupError>;
}

/// The bulk exit list, downloaded at most once per TTL.
#[derive(Clone)]
pub struct TorExitList {
    url: Option<Url>,
    http_client: reqwest::Client,
    /// Single entry holding the whole list.
    cache: Cache<(), Arc<HashSet<IpAddr>>>,
}

impl TorExitList {
    pub fn new(config: &SecurityConfig) -> Result<Self, LookupError> {
        let url = if is_disabled(&config.tor_list_url) {
            None
        } else {
            Some(Url::parse(&config.tor_list_url)?)
        };

        Ok(Self {
            url,
            http_client: http_client(config.timeout())?,
            cache: Cache::builder()
                .max_capacity(1)
                .time_to_live(config.tor_list_ttl())
                .build(),
        })
    }

    async fn download(&self, url: &Url) -> Result<Arc<HashSet<IpAddr>>, LookupError> {
        debug!(url = %url, "Downloading Tor exit list");
        let response = self.http_client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(LookupError::Status(response.status().as_u16()));
        }

        let body = response.text().await?;
        let exits = parse_exit_list(&body);
        metrics().tor_list_refreshes.inc();
        info!(exit_nodes = exits.len(), "Tor exit list refreshed");
        Ok(Arc::new(exits))
    }
}

#[async_trait]
impl TorExitSource for TorExitList {
    async fn is_exit_node(&self, ip: IpAddr) -> Result<bool, LookupError> {
        let Some(url) = &self.url else {
            return Err(LookupError::Disabled);
        };

        let exits = self
            .cache
            .try_get_with((), self.download(url))
            .await
            .map_err(|e| LookupError::Malformed(format!("exit list unavailable: {}", e)))?;
        Ok(exits.contains(&ip))
    }
}

/// One address per line; comments and junk are skipped.
pub fn parse_exit_list(body: &str) -> HashSet<IpAddr> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.parse().ok())
        .collect()
}
