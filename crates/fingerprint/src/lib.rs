//! Device fingerprinting and advisory security heuristics.

pub mod collector;
pub mod config;
pub mod device;
pub mod error;
pub mod geo;
pub mod security;
pub mod tor;
pub mod user_agent;

pub use collector::{Fingerprint, FingerprintCollector};
pub use config::{FingerprintConfig, GeoConfig, SecurityConfig};
pub use device::{classify, DeviceHints};
pub use error::LookupError;
pub use geo::{GeoLookup, GeoRecord, HttpGeoLookup};
pub use security::{
    HeuristicSecurityEvaluator, HttpIpIntelligence, IpIntelligence, IpReputation,
    SecurityEvaluator,
};
pub use tor::{TorExitList, TorExitSource};
pub use user_agent::{ParsedAgent, UserAgentParser};

use std::sync::Arc;

/// Builds the HTTP-backed collector and evaluator from configuration.
pub fn from_config(
    config: &FingerprintConfig,
) -> Result<(FingerprintCollector, HeuristicSecurityEvaluator), LookupError> {
    let geo = HttpGeoLookup::new(&config.geo)?;
    let intelligence = HttpIpIntelligence::new(&config.security)?;
    let tor_exits = TorExitList::new(&config.security)?;

    Ok((
        FingerprintCollector::new(Arc::new(geo)),
        HeuristicSecurityEvaluator::new(Arc::new(intelligence), Arc::new(tor_exits)),
    ))
}
