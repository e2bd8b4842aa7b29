//! Fingerprint collection.

use session_core::{BrowserInfo, ClientEnvironment, DeviceType, Location, OsInfo, UNKNOWN};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::debug;

use crate::device::{classify, DeviceHints};
use crate::geo::GeoLookup;
use crate::user_agent::UserAgentParser;

/// Everything known about the signing-in device.
#[derive(Debug, Clone, PartialEq)]
pub struct Fingerprint {
    pub device_type: DeviceType,
    pub browser: BrowserInfo,
    pub os: OsInfo,
    pub user_agent: String,
    pub screen_resolution: String,
    pub language: String,
    pub timezone: String,
    pub public_ip: Option<IpAddr>,
    pub location: Location,
}

impl Fingerprint {
    /// Public address as stored on the session record.
    pub fn network_address(&self) -> String {
        self.public_ip
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }
}

/// Builds a [`Fingerprint`] from a [`ClientEnvironment`].
///
/// Collection never fails as a unit: every lookup is attempted once and a
/// failure leaves the affected fields "Unknown".
pub struct FingerprintCollector {
    parser: UserAgentParser,
    geo: Arc<dyn GeoLookup>,
}

impl FingerprintCollector {
    pub fn new(geo: Arc<dyn GeoLookup>) -> Self {
        Self {
            parser: UserAgentParser::new(),
            geo,
        }
    }

    pub async fn collect(&self, env: &ClientEnvironment) -> Fingerprint {
        let parsed = self.parser.parse(&env.user_agent);
        let device_type = classify(DeviceHints {
            user_agent: &env.user_agent,
            category: &parsed.category,
            max_touch_points: env.max_touch_points,
            standalone: env.standalone,
        });

        // Failures are already logged and counted by the lookup itself.
        let geo = self.geo.lookup(env.client_ip).await.ok();
        let public_ip = env.client_ip.or(geo.as_ref().and_then(|g| g.ip));
        let location = geo.map(|g| g.location).unwrap_or_else(Location::unknown);

        let or_unknown = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(UNKNOWN)
                .to_string()
        };
        let timezone = match env.timezone.as_deref() {
            Some(tz) if !tz.trim().is_empty() => tz.trim().to_string(),
            _ => location.timezone.clone(),
        };

        let fingerprint = Fingerprint {
            device_type,
            browser: parsed.browser,
            os: parsed.os,
            user_agent: if env.user_agent.trim().is_empty() {
                UNKNOWN.to_string()
            } else {
                env.user_agent.clone()
            },
            screen_resolution: or_unknown(&env.screen_resolution),
            language: or_unknown(&env.language),
            timezone,
            public_ip,
            location,
        };

        debug!(
            device_type = %fingerprint.device_type,
            browser = %fingerprint.browser.name,
            network_address = %fingerprint.network_address(),
            "Collected device fingerprint"
        );
        fingerprint
    }
}
