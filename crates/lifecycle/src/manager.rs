//! Session lifecycle manager.

use chrono::Utc;
use fingerprint::{FingerprintCollector, SecurityEvaluator};
use registry::{QuerySubscription, SessionRegistry};
use serde::Serialize;
use session_core::{
    AccountId, AuthErrorCode, AuthGrant, AuthProvider, ClientEnvironment, Error, RecordId,
    Result, Session, SessionDraft, SessionFilter, SessionList, SessionToken,
};
use std::sync::Arc;
use std::time::Instant;
use telemetry::metrics;
use tracing::{info, instrument, warn};

use crate::actor::{AccountCommand, ActorDirectory, TerminationReport};
use crate::client::{ClientSession, ClientShared, SignOutReason};
use crate::config::LifecycleConfig;
use crate::heartbeat::Heartbeat;
use crate::listener::RemoteTerminationListener;

/// Outcome of a single-session termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminationOutcome {
    /// False when the record was already gone.
    pub removed: bool,
    /// True when the target was the caller's own session.
    pub signed_out: bool,
}

pub struct SessionLifecycleManager {
    registry: Arc<dyn SessionRegistry>,
    auth: Arc<dyn AuthProvider>,
    collector: Arc<FingerprintCollector>,
    evaluator: Arc<dyn SecurityEvaluator>,
    actors: ActorDirectory,
    config: LifecycleConfig,
}

impl SessionLifecycleManager {
    pub fn new(
        registry: Arc<dyn SessionRegistry>,
        auth: Arc<dyn AuthProvider>,
        collector: Arc<FingerprintCollector>,
        evaluator: Arc<dyn SecurityEvaluator>,
        config: LifecycleConfig,
    ) -> Self {
        let actors = ActorDirectory::new(
            registry.clone(),
            config.actor_idle_timeout(),
            config.actor_mailbox,
        );
        Self {
            registry,
            auth,
            collector,
            evaluator,
            actors,
            config,
        }
    }

    pub fn auth(&self) -> &Arc<dyn AuthProvider> {
        &self.auth
    }

    pub fn registry(&self) -> &Arc<dyn SessionRegistry> {
        &self.registry
    }

    /// Signs in, registers the device session, and starts the client's
    /// heartbeat and termination listener.
    #[instrument(skip_all)]
    pub async fn sign_in(
        &self,
        identity: &str,
        secret: &str,
        env: ClientEnvironment,
    ) -> Result<Arc<ClientSession>> {
        let started = Instant::now();
        metrics().sign_ins.inc();

        let grant = self.auth.sign_in(identity, secret).await.inspect_err(|_| {
            metrics().sign_in_failures.inc();
        })?;

        let client = match self.create_session(&grant, env).await {
            Ok(client) => client,
            Err(e) => {
                // No record means no listener; close the auth session here.
                warn!(account_id = %grant.account_id, error = %e, "Session registration failed");
                metrics().sign_in_failures.inc();
                if let Err(sign_out_err) = self.auth.sign_out(&grant.token).await {
                    warn!(error = %sign_out_err, "Sign-out after failed registration also failed");
                }
                return Err(e);
            }
        };

        metrics()
            .sign_in_latency_ms
            .observe(started.elapsed().as_millis() as u64);
        Ok(client)
    }

    async fn create_session(
        &self,
        grant: &AuthGrant,
        env: ClientEnvironment,
    ) -> Result<Arc<ClientSession>> {
        let session_id = SessionToken::generate();
        let (fingerprint, security) =
            tokio::join!(self.collector.collect(&env), self.evaluator.evaluate(&env));

        let draft = SessionDraft {
            session_id,
            user_id: grant.account_id.clone(),
            device_type: fingerprint.device_type,
            network_address: fingerprint.network_address(),
            browser: fingerprint.browser,
            os: fingerprint.os,
            location: fingerprint.location,
            user_agent: fingerprint.user_agent,
            screen_resolution: fingerprint.screen_resolution,
            language: fingerprint.language,
            security,
            created_at: Utc::now(),
        };

        let session = self
            .actors
            .request(&grant.account_id, |responder| AccountCommand::Create {
                draft,
                responder,
            })
            .await?;

        let shared = Arc::new(ClientShared::new(
            grant.token.clone(),
            grant.account_id.clone(),
            session_id,
            session.id.clone(),
        ));
        let client = Arc::new(ClientSession::new(shared.clone()));

        // Creation, sweep included, is complete before either task starts.
        client.attach(tokio::spawn(
            RemoteTerminationListener::new(self.registry.clone(), self.auth.clone(), shared.clone())
                .run(),
        ));
        client.attach(tokio::spawn(
            Heartbeat::new(
                self.registry.clone(),
                shared,
                self.config.heartbeat_scope,
                self.config.heartbeat_interval(),
            )
            .run(),
        ));

        Ok(client)
    }

    /// All sessions of an account, split into the current one and the rest.
    pub async fn list_sessions(&self, account_id: &AccountId) -> Result<SessionList> {
        let sessions = self
            .registry
            .query(&SessionFilter::account(account_id.clone()))
            .await?;
        Ok(SessionList::partition(sessions))
    }

    /// Point read of one of the account's sessions.
    pub async fn get_session(&self, account_id: &AccountId, id: &RecordId) -> Result<Session> {
        match self.registry.get(id).await? {
            Some(session) if session.is_owned_by(account_id) => Ok(session),
            Some(_) => Err(Error::permission_denied("You may not manage this session")),
            None => Err(Error::not_found(format!("Session {} not found", id))),
        }
    }

    /// Live feed of an account's session changes.
    pub async fn watch_sessions(&self, account_id: &AccountId) -> Result<QuerySubscription> {
        self.registry
            .watch_query(SessionFilter::account(account_id.clone()))
            .await
    }

    /// Re-proves the password behind the client's token. Never cached.
    async fn reauthenticate(&self, client: &ClientSession, password: &str) -> Result<()> {
        if !client.is_signed_in() {
            return Err(Error::unauthenticated("Client is signed out"));
        }

        match self.auth.reauthenticate(client.token(), password).await {
            Ok(()) => Ok(()),
            Err(e) if is_credential_failure(&e) => {
                metrics().reauth_failures.inc();
                warn!(account_id = %client.account_id(), "Reauthentication failed");
                Err(Error::reauthentication_failed())
            }
            Err(e) => Err(e),
        }
    }

    /// Terminates one session after reauthentication. Terminating the
    /// caller's own session signs the caller out once the delete is done.
    #[instrument(skip_all, fields(account_id = %client.account_id(), target = %target))]
    pub async fn terminate(
        &self,
        client: &ClientSession,
        target: &RecordId,
        password: &str,
    ) -> Result<TerminationOutcome> {
        self.reauthenticate(client, password).await?;

        let own = target == client.record_id();
        // Own-record deletes must not be mistaken for a remote termination.
        let owns_sign_out = own && client.shared().claim_sign_out();

        let target_id = target.clone();
        let removed = match self
            .actors
            .request(client.account_id(), |responder| AccountCommand::TerminateOne {
                target: target_id,
                responder,
            })
            .await
        {
            Ok(removed) => removed,
            Err(e) => {
                if owns_sign_out {
                    self.release_sign_out(client).await;
                }
                return Err(e);
            }
        };

        if own {
            self.finish_sign_out(client, owns_sign_out, SignOutReason::TerminatedSelf)
                .await?;
        }

        info!(removed, own, "Session terminated");
        Ok(TerminationOutcome {
            removed,
            signed_out: own,
        })
    }

    /// Terminates every session of the account except the caller's own.
    #[instrument(skip_all, fields(account_id = %client.account_id()))]
    pub async fn terminate_all_others(
        &self,
        client: &ClientSession,
        password: &str,
    ) -> Result<TerminationReport> {
        self.reauthenticate(client, password).await?;

        let keep = client.record_id().clone();
        self.actors
            .request(client.account_id(), |responder| {
                AccountCommand::TerminateAllOthers { keep, responder }
            })
            .await
    }

    /// Deletes the caller's own record, then signs out and stops the
    /// client's background tasks. Sign-out runs even when the delete fails;
    /// the delete error is still returned.
    #[instrument(skip_all, fields(account_id = %client.account_id()))]
    pub async fn logout(&self, client: &ClientSession) -> Result<()> {
        let owns_sign_out = client.shared().claim_sign_out();

        let record = client.record_id().clone();
        let deleted = self
            .actors
            .request(client.account_id(), |responder| AccountCommand::SelfLogout {
                record,
                responder,
            })
            .await;
        if let Err(e) = &deleted {
            warn!(record_id = %client.record_id(), error = %e, "Could not delete own session record at logout");
        }

        metrics().self_logouts.inc();
        let signed_out = self
            .finish_sign_out(client, owns_sign_out, SignOutReason::Logout)
            .await;
        deleted?;
        signed_out
    }

    /// Completes a claimed sign-out, or waits for the path that holds the
    /// claim, then stops the client's tasks.
    async fn finish_sign_out(
        &self,
        client: &ClientSession,
        owns_sign_out: bool,
        reason: SignOutReason,
    ) -> Result<()> {
        let result = if owns_sign_out {
            client
                .shared()
                .complete_sign_out(self.auth.as_ref(), reason)
                .await
        } else {
            client.shared().wait_signed_out().await;
            Ok(())
        };
        client.detach();
        result
    }

    /// Hands the sign-out back after a failed own-record delete. The
    /// listener skips removals while the claim is held, so a record that
    /// vanished in the meantime is handled here.
    async fn release_sign_out(&self, client: &ClientSession) {
        client.shared().release_sign_out();
        match self.registry.get(client.record_id()).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                if let Err(e) = client
                    .shared()
                    .sign_out(self.auth.as_ref(), SignOutReason::RemoteTermination)
                    .await
                {
                    metrics().sign_out_failures.inc();
                    warn!(record_id = %client.record_id(), error = %e, "Sign-out of removed session failed");
                }
            }
            Err(e) => {
                warn!(record_id = %client.record_id(), error = %e, "Could not re-read session record");
            }
        }
    }

    /// Drops bookkeeping for exited account actors.
    pub fn prune_idle_actors(&self) -> usize {
        self.actors.prune()
    }
}

fn is_credential_failure(error: &Error) -> bool {
    error.is_reauthentication_failure()
        || error.error_code() == Some(AuthErrorCode::InvalidCredentials.code())
}
