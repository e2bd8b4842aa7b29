//! IP geolocation.
//!
//! Calls an ipapi.co compatible endpoint (`{base}/{ip}/json/`, or
//! `{base}/json/` for the caller's own address) and caches answers per IP.

use async_trait::async_trait;
use moka::future::Cache;
use serde::Deserialize;
use session_core::{Location, UNKNOWN};
use std::net::IpAddr;
use std::time::Instant;
use telemetry::{health, metrics};
use tracing::{debug, warn};
use url::Url;

use crate::config::{http_client, is_disabled, GeoConfig};
use crate::error::LookupError;

const GEO_CACHE_MAX_CAPACITY: u64 = 10_000;

/// Location of an address, plus the address the service saw.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoRecord {
    /// Public IP echoed back by the service.
    pub ip: Option<IpAddr>,
    pub location: Location,
}

#[async_trait]
pub trait GeoLookup: Send + Sync {
    /// Looks up `ip`, or the caller's own public address when `None`.
    async fn lookup(&self, ip: Option<IpAddr>) -> Result<GeoRecord, LookupError>;
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    ip: Option<String>,
    city: Option<String>,
    region: Option<String>,
    country_name: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    timezone: Option<String>,
    #[serde(default)]
    error: bool,
    reason: Option<String>,
}

impl IpApiResponse {
    fn into_record(self) -> Result<GeoRecord, LookupError> {
        if self.error {
            return Err(LookupError::Malformed(
                self.reason.unwrap_or_else(|| "lookup rejected".to_string()),
            ));
        }

        let text = |v: Option<String>| v.filter(|s| !s.is_empty()).unwrap_or_else(|| UNKNOWN.to_string());
        Ok(GeoRecord {
            ip: self.ip.as_deref().and_then(|ip| ip.parse().ok()),
            location: Location {
                city: text(self.city),
                country: text(self.country_name),
                region: text(self.region),
                latitude: self.latitude.unwrap_or(0.0),
                longitude: self.longitude.unwrap_or(0.0),
                timezone: text(self.timezone),
            },
        })
    }
}

/// HTTP geolocation client.
#[derive(Clone)]
pub struct HttpGeoLookup {
    base_url: Option<Url>,
    http_client: reqwest::Client,
    /// Only explicit addresses are cached; "my own address" is not stable.
    cache: Cache<IpAddr, GeoRecord>,
}

impl HttpGeoLookup {
    pub fn new(config: &GeoConfig) -> Result<Self, LookupError> {
        let base_url = if is_disabled(&config.url) {
            None
        } else {
            Some(Url::parse(&config.url)?)
        };

        Ok(Self {
            base_url,
            http_client: http_client(config.timeout())?,
            cache: Cache::builder()
                .max_capacity(GEO_CACHE_MAX_CAPACITY)
                .time_to_live(config.cache_ttl())
                .build(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.base_url.is_some()
    }

    fn endpoint(base: &Url, ip: Option<IpAddr>) -> Result<Url, LookupError> {
        let path = match ip {
            Some(ip) => format!("{}/json/", ip),
            None => "json/".to_string(),
        };
        let mut base = base.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        Ok(base.join(&path)?)
    }

    async fn fetch(&self, base: &Url, ip: Option<IpAddr>) -> Result<GeoRecord, LookupError> {
        let url = Self::endpoint(base, ip)?;
        debug!(url = %url, "Calling geolocation service");

        let response = self.http_client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(LookupError::Status(response.status().as_u16()));
        }

        let body: IpApiResponse = response
            .json()
            .await
            .map_err(|e| LookupError::Malformed(e.to_string()))?;
        body.into_record()
    }
}

#[async_trait]
impl GeoLookup for HttpGeoLookup {
    async fn lookup(&self, ip: Option<IpAddr>) -> Result<GeoRecord, LookupError> {
        let Some(base) = &self.base_url else {
            return Err(LookupError::Disabled);
        };

        if let Some(ip) = ip {
            if let Some(cached) = self.cache.get(&ip).await {
                debug!(%ip, "Geolocation cache hit");
                return Ok(cached);
            }
        }

        metrics().geo_lookups.inc();
        let started = Instant::now();
        let result = self.fetch(base, ip).await;
        metrics()
            .lookup_latency_ms
            .observe(started.elapsed().as_millis() as u64);

        match &result {
            Ok(record) => {
                health().geolocation.set_healthy();
                if let Some(ip) = ip.or(record.ip) {
                    self.cache.insert(ip, record.clone()).await;
                }
            }
            Err(e) => {
                warn!(error = %e, "Geolocation lookup failed");
                metrics().geo_lookup_failures.inc();
                health().geolocation.set_unhealthy(e.to_string());
            }
        }
        result
    }
}
