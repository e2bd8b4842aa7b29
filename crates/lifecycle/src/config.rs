//! Lifecycle tuning.

use serde::{Deserialize, Serialize};
use session_core::HEARTBEAT_INTERVAL_SECS;
use std::time::Duration;

use crate::heartbeat::HeartbeatScope;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    #[serde(default)]
    pub heartbeat_scope: HeartbeatScope,
    /// Account actors exit after this long without a command.
    #[serde(default = "default_actor_idle_timeout_secs")]
    pub actor_idle_timeout_secs: u64,
    #[serde(default = "default_actor_mailbox")]
    pub actor_mailbox: usize,
}

fn default_heartbeat_interval_secs() -> u64 {
    HEARTBEAT_INTERVAL_SECS
}

fn default_actor_idle_timeout_secs() -> u64 {
    600
}

fn default_actor_mailbox() -> usize {
    32
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            heartbeat_scope: HeartbeatScope::default(),
            actor_idle_timeout_secs: default_actor_idle_timeout_secs(),
            actor_mailbox: default_actor_mailbox(),
        }
    }
}

impl LifecycleConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    pub fn actor_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.actor_idle_timeout_secs.max(1))
    }
}
