//! Raw client environment reported at sign-in.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use validator::Validate;

/// Results of probing persistent storage primitives on the client.
///
/// `None` means the client did not report the probe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageProbe {
    pub local_storage: Option<bool>,
    pub indexed_db: Option<bool>,
    pub persistent_quota: Option<bool>,
}

impl StorageProbe {
    /// True when any expected persistent storage primitive is reported unavailable.
    pub fn looks_incognito(&self) -> bool {
        [self.local_storage, self.indexed_db, self.persistent_quota]
            .iter()
            .any(|probe| *probe == Some(false))
    }
}

/// Snapshot of the signing-in client's environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ClientEnvironment {
    #[validate(length(max = 1024))]
    #[serde(default)]
    pub user_agent: String,
    /// e.g. "1920x1080"
    #[validate(length(max = 32))]
    pub screen_resolution: Option<String>,
    #[validate(length(max = 64))]
    pub language: Option<String>,
    #[validate(length(max = 64))]
    pub timezone: Option<String>,
    /// `navigator.maxTouchPoints` style hint.
    pub max_touch_points: Option<u32>,
    /// Whether the client runs in a standalone (installed app) display mode.
    #[serde(default)]
    pub standalone: bool,
    #[serde(default)]
    pub storage: StorageProbe,
    /// Address observed by the server, when known.
    #[serde(skip)]
    pub client_ip: Option<IpAddr>,
}

impl ClientEnvironment {
    pub fn with_user_agent(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            ..Default::default()
        }
    }

    pub fn with_client_ip(mut self, ip: Option<IpAddr>) -> Self {
        self.client_ip = ip;
        self
    }
}
