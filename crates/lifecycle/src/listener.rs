//! Remote termination listener.
//!
//! Watches the client's own session record. Once the record is observed
//! absent, the client is signed out exactly once and the listener exits.

use registry::{RecordChange, SessionRegistry};
use session_core::AuthProvider;
use std::sync::Arc;
use std::time::Duration;
use telemetry::metrics;
use tracing::{debug, error, info, warn};

use crate::client::{ClientShared, ClientState, SignOutReason};

const RESUBSCRIBE_BACKOFF: Duration = Duration::from_secs(1);

pub(crate) struct RemoteTerminationListener {
    registry: Arc<dyn SessionRegistry>,
    auth: Arc<dyn AuthProvider>,
    client: Arc<ClientShared>,
}

enum Presence {
    Present,
    Gone,
    Unknown,
}

impl RemoteTerminationListener {
    pub(crate) fn new(
        registry: Arc<dyn SessionRegistry>,
        auth: Arc<dyn AuthProvider>,
        client: Arc<ClientShared>,
    ) -> Self {
        Self {
            registry,
            auth,
            client,
        }
    }

    pub(crate) async fn run(self) {
        let record_id = self.client.record_id.clone();
        let mut state = self.client.subscribe();

        'subscribe: loop {
            let mut subscription = match self.registry.watch_record(&record_id).await {
                Ok(subscription) => subscription,
                Err(e) => {
                    warn!(record_id = %record_id, error = %e, "Record subscription failed, retrying");
                    tokio::time::sleep(RESUBSCRIBE_BACKOFF).await;
                    continue 'subscribe;
                }
            };
            debug!(record_id = %record_id, "Watching session record");

            loop {
                if *state.borrow_and_update() == ClientState::SignedOut {
                    return;
                }

                let change = tokio::select! {
                    change = subscription.next() => change,
                    changed = state.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        continue;
                    }
                };

                let presence = match change {
                    Some(RecordChange::Present(_)) => Presence::Present,
                    Some(RecordChange::Removed) => Presence::Gone,
                    Some(RecordChange::Resync) => self.reread().await,
                    None => match self.reread().await {
                        Presence::Gone => Presence::Gone,
                        _ => {
                            tokio::time::sleep(RESUBSCRIBE_BACKOFF).await;
                            continue 'subscribe;
                        }
                    },
                };

                if let Presence::Gone = presence {
                    self.force_sign_out().await;
                    return;
                }
            }
        }
    }

    async fn reread(&self) -> Presence {
        match self.registry.get(&self.client.record_id).await {
            Ok(Some(_)) => Presence::Present,
            Ok(None) => Presence::Gone,
            Err(e) => {
                warn!(record_id = %self.client.record_id, error = %e, "Could not re-read session record");
                Presence::Unknown
            }
        }
    }

    /// Failure here is logged and not retried.
    async fn force_sign_out(&self) {
        info!(
            account_id = %self.client.account_id,
            record_id = %self.client.record_id,
            "Session record removed remotely, signing out"
        );
        match self
            .client
            .sign_out(self.auth.as_ref(), SignOutReason::RemoteTermination)
            .await
        {
            Ok(true) => metrics().forced_sign_outs.inc(),
            Ok(false) => {}
            Err(e) => {
                metrics().sign_out_failures.inc();
                error!(record_id = %self.client.record_id, error = %e, "Forced sign-out failed");
            }
        }
    }
}
