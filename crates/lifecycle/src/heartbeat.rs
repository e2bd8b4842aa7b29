//! Periodic `last_active` refresh.

use chrono::Utc;
use registry::SessionRegistry;
use serde::{Deserialize, Serialize};
use session_core::{Result, SessionFilter, SessionPatch};
use std::sync::Arc;
use std::time::Duration;
use telemetry::metrics;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::client::{ClientShared, ClientState};

/// Which records one client's heartbeat refreshes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeartbeatScope {
    /// Every active record of the account.
    #[default]
    Account,
    /// Only the client's own record.
    Record,
}

pub(crate) struct Heartbeat {
    registry: Arc<dyn SessionRegistry>,
    client: Arc<ClientShared>,
    scope: HeartbeatScope,
    period: Duration,
}

impl Heartbeat {
    pub(crate) fn new(
        registry: Arc<dyn SessionRegistry>,
        client: Arc<ClientShared>,
        scope: HeartbeatScope,
        period: Duration,
    ) -> Self {
        Self {
            registry,
            client,
            scope,
            period,
        }
    }

    /// Beats every period until the client signs out. The record was just
    /// written at creation, so the first beat is one period away.
    pub(crate) async fn run(self) {
        let mut state = self.client.subscribe();
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *state.borrow_and_update() == ClientState::SignedOut {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    match self.beat().await {
                        Ok(refreshed) => {
                            metrics().heartbeats.inc_by(refreshed as u64);
                            debug!(record_id = %self.client.record_id, refreshed, "Heartbeat");
                        }
                        Err(e) => {
                            metrics().heartbeat_errors.inc();
                            warn!(record_id = %self.client.record_id, error = %e, "Heartbeat failed");
                        }
                    }
                }
                changed = state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        debug!(record_id = %self.client.record_id, "Heartbeat stopped");
    }

    /// One refresh. Returns how many records were touched.
    pub(crate) async fn beat(&self) -> Result<usize> {
        let now = Utc::now();
        match self.scope {
            HeartbeatScope::Record => {
                let touched = self
                    .registry
                    .update(&self.client.record_id, SessionPatch::touch(now))
                    .await?;
                Ok(usize::from(touched.is_some()))
            }
            HeartbeatScope::Account => {
                let filter = SessionFilter::account(self.client.account_id.clone()).active(true);
                let sessions = self.registry.query(&filter).await?;

                let mut refreshed = 0;
                for session in sessions {
                    match self.registry.update(&session.id, SessionPatch::touch(now)).await {
                        Ok(Some(_)) => refreshed += 1,
                        // Deleted between the query and the write.
                        Ok(None) => {}
                        Err(e) => {
                            metrics().heartbeat_errors.inc();
                            warn!(record_id = %session.id, error = %e, "Heartbeat write failed");
                        }
                    }
                }
                Ok(refreshed)
            }
        }
    }
}
