//! Handle for one signed-in client.

use parking_lot::Mutex;
use serde::Serialize;
use session_core::{AccountId, AuthProvider, AuthToken, RecordId, Result, SessionToken};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use telemetry::metrics;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientState {
    Active,
    SignedOut,
}

/// Why a client was signed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SignOutReason {
    Logout,
    TerminatedSelf,
    RemoteTermination,
}

impl SignOutReason {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Logout => "logout",
            Self::TerminatedSelf => "terminated_self",
            Self::RemoteTermination => "remote_termination",
        }
    }
}

/// State shared between the client handle and its background tasks.
pub(crate) struct ClientShared {
    pub(crate) token: AuthToken,
    pub(crate) account_id: AccountId,
    pub(crate) session_id: SessionToken,
    pub(crate) record_id: RecordId,
    state: watch::Sender<ClientState>,
    sign_out_started: AtomicBool,
}

impl ClientShared {
    pub(crate) fn new(
        token: AuthToken,
        account_id: AccountId,
        session_id: SessionToken,
        record_id: RecordId,
    ) -> Self {
        let (state, _) = watch::channel(ClientState::Active);
        Self {
            token,
            account_id,
            session_id,
            record_id,
            state,
            sign_out_started: AtomicBool::new(false),
        }
    }

    pub(crate) fn state(&self) -> ClientState {
        *self.state.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ClientState> {
        self.state.subscribe()
    }

    #[cfg(test)]
    pub(crate) fn state_for_test(&self, state: ClientState) {
        self.state.send_replace(state);
    }

    /// Invokes the sign-out primitive at most once per client, whichever
    /// path gets here first. Returns `Ok(false)` if another path already did.
    pub(crate) async fn sign_out(
        &self,
        auth: &dyn AuthProvider,
        reason: SignOutReason,
    ) -> Result<bool> {
        if !self.claim_sign_out() {
            debug!(record_id = %self.record_id, reason = reason.as_str(), "Sign-out already in progress");
            return Ok(false);
        }
        self.complete_sign_out(auth, reason).await.map(|_| true)
    }

    /// Reserves the sign-out for the calling path. False if another path
    /// holds it.
    pub(crate) fn claim_sign_out(&self) -> bool {
        !self.sign_out_started.swap(true, Ordering::SeqCst)
    }

    /// Gives back a claim that will not be completed.
    pub(crate) fn release_sign_out(&self) {
        self.sign_out_started.store(false, Ordering::SeqCst);
    }

    /// Runs the sign-out primitive under a claim taken by the caller.
    pub(crate) async fn complete_sign_out(
        &self,
        auth: &dyn AuthProvider,
        reason: SignOutReason,
    ) -> Result<()> {
        let result = auth.sign_out(&self.token).await;
        self.state.send_replace(ClientState::SignedOut);
        metrics().active_clients.dec();

        info!(
            account_id = %self.account_id,
            record_id = %self.record_id,
            reason = reason.as_str(),
            ok = result.is_ok(),
            "Client signed out"
        );
        result
    }

    /// Resolves once the client is signed out.
    pub(crate) async fn wait_signed_out(&self) {
        let mut rx = self.subscribe();
        loop {
            if *rx.borrow_and_update() == ClientState::SignedOut {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// A signed-in client: its auth token, its session record, and the
/// heartbeat and termination listener tasks that run on its behalf.
///
/// Dropping the handle stops both tasks.
pub struct ClientSession {
    shared: Arc<ClientShared>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ClientSession {
    pub(crate) fn new(shared: Arc<ClientShared>) -> Self {
        metrics().active_clients.inc();
        Self {
            shared,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn shared(&self) -> &Arc<ClientShared> {
        &self.shared
    }

    pub(crate) fn attach(&self, task: JoinHandle<()>) {
        self.tasks.lock().push(task);
    }

    pub fn token(&self) -> &AuthToken {
        &self.shared.token
    }

    pub fn account_id(&self) -> &AccountId {
        &self.shared.account_id
    }

    /// Token this client generated at sign-in; compare with
    /// `Session::session_id` to find "this device" in a listing.
    pub fn current_session_id(&self) -> SessionToken {
        self.shared.session_id
    }

    pub fn record_id(&self) -> &RecordId {
        &self.shared.record_id
    }

    pub fn state(&self) -> ClientState {
        self.shared.state()
    }

    pub fn is_signed_in(&self) -> bool {
        self.state() == ClientState::Active
    }

    /// Resolves once the client is signed out, for whatever reason.
    pub async fn signed_out(&self) {
        self.shared.wait_signed_out().await
    }

    /// Observe state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ClientState> {
        self.shared.subscribe()
    }

    /// Stops the heartbeat and the termination listener.
    pub fn detach(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.detach();
        if self.state() == ClientState::Active {
            metrics().active_clients.dec();
        }
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("account_id", &self.shared.account_id)
            .field("record_id", &self.shared.record_id)
            .field("session_id", &self.shared.session_id)
            .field("state", &self.state())
            .finish()
    }
}
