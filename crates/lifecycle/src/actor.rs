//! Per-account single-writer actor.
//!
//! Every mutating operation for one account (create with its demotion
//! sweep, terminations, self-logout) runs on that account's actor, so
//! within this process they never interleave. Actors exit when idle and are
//! respawned on the next command.

use parking_lot::Mutex;
use registry::SessionRegistry;
use serde::Serialize;
use session_core::{
    AccountId, Error, RecordId, Result, Session, SessionDraft, SessionFilter, SessionPatch,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use telemetry::metrics;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Outcome of a bulk termination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminationReport {
    pub terminated: Vec<RecordId>,
    /// Records that were already gone when their delete ran.
    pub already_gone: usize,
}

#[derive(Debug)]
pub(crate) enum AccountCommand {
    Create {
        draft: SessionDraft,
        responder: oneshot::Sender<Result<Session>>,
    },
    TerminateOne {
        target: RecordId,
        responder: oneshot::Sender<Result<bool>>,
    },
    TerminateAllOthers {
        keep: RecordId,
        responder: oneshot::Sender<Result<TerminationReport>>,
    },
    SelfLogout {
        record: RecordId,
        responder: oneshot::Sender<Result<bool>>,
    },
}

impl AccountCommand {
    fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::TerminateOne { .. } => "terminate_one",
            Self::TerminateAllOthers { .. } => "terminate_all_others",
            Self::SelfLogout { .. } => "self_logout",
        }
    }
}

struct AccountActor {
    account_id: AccountId,
    registry: Arc<dyn SessionRegistry>,
    receiver: mpsc::Receiver<AccountCommand>,
    idle_timeout: Duration,
}

impl AccountActor {
    async fn run(mut self) {
        metrics().account_actors.inc();
        debug!(account_id = %self.account_id, "Account actor started");

        loop {
            match tokio::time::timeout(self.idle_timeout, self.receiver.recv()).await {
                Ok(Some(command)) => self.handle(command).await,
                Ok(None) => break,
                Err(_) => {
                    // Refuse new sends, then finish what was already queued.
                    self.receiver.close();
                    while let Some(command) = self.receiver.recv().await {
                        self.handle(command).await;
                    }
                    break;
                }
            }
        }

        metrics().account_actors.dec();
        debug!(account_id = %self.account_id, "Account actor stopped");
    }

    async fn handle(&self, command: AccountCommand) {
        debug!(account_id = %self.account_id, command = command.name(), "Handling command");
        // A dropped responder means the caller went away; nothing to report.
        match command {
            AccountCommand::Create { draft, responder } => {
                let _ = responder.send(self.create(draft).await);
            }
            AccountCommand::TerminateOne { target, responder } => {
                let _ = responder.send(self.delete(&target).await);
            }
            AccountCommand::TerminateAllOthers { keep, responder } => {
                let _ = responder.send(self.terminate_all_others(&keep).await);
            }
            AccountCommand::SelfLogout { record, responder } => {
                let _ = responder.send(self.delete(&record).await);
            }
        }
    }

    /// Writes the new record as current, then demotes every other current
    /// record of the account. Sweep failures are logged and skipped.
    async fn create(&self, draft: SessionDraft) -> Result<Session> {
        let session = self.registry.create(draft).await?;
        metrics().sessions_created.inc();

        let filter = SessionFilter::account(self.account_id.clone()).current(true);
        let current = match self.registry.query(&filter).await {
            Ok(current) => current,
            Err(e) => {
                warn!(account_id = %self.account_id, error = %e, "Demotion sweep query failed");
                return Ok(session);
            }
        };

        let mut demoted = 0;
        for stale in current.iter().filter(|s| s.session_id != session.session_id) {
            match self.registry.update(&stale.id, SessionPatch::demote()).await {
                Ok(Some(_)) => demoted += 1,
                Ok(None) => {}
                Err(e) => {
                    warn!(record_id = %stale.id, error = %e, "Demotion write failed, skipping")
                }
            }
        }
        metrics().sessions_demoted.inc_by(demoted);

        info!(
            account_id = %self.account_id,
            record_id = %session.id,
            session_id = %session.session_id,
            demoted,
            "Session created"
        );
        Ok(session)
    }

    async fn delete(&self, target: &RecordId) -> Result<bool> {
        match self.registry.delete(target, &self.account_id).await {
            Ok(removed) => {
                if removed {
                    metrics().sessions_terminated.inc();
                }
                debug!(record_id = %target, removed, "Session delete");
                Ok(removed)
            }
            Err(e) => {
                if e.is_permission_denied() {
                    metrics().permission_denied.inc();
                }
                Err(e)
            }
        }
    }

    /// Deletes every record of the account except `keep`. Each delete is
    /// attempted once; the first failure is returned after the rest ran.
    async fn terminate_all_others(&self, keep: &RecordId) -> Result<TerminationReport> {
        let sessions = self
            .registry
            .query(&SessionFilter::account(self.account_id.clone()))
            .await?;

        let mut report = TerminationReport::default();
        let mut first_error = None;
        for session in sessions.into_iter().filter(|s| &s.id != keep) {
            match self.delete(&session.id).await {
                Ok(true) => report.terminated.push(session.id),
                Ok(false) => report.already_gone += 1,
                Err(e) => {
                    warn!(record_id = %session.id, error = %e, "Bulk termination delete failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        info!(
            account_id = %self.account_id,
            terminated = report.terminated.len(),
            already_gone = report.already_gone,
            "Terminated all other sessions"
        );
        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }
}

/// Routes commands to account actors, spawning them on demand.
pub(crate) struct ActorDirectory {
    registry: Arc<dyn SessionRegistry>,
    senders: Mutex<HashMap<AccountId, mpsc::Sender<AccountCommand>>>,
    idle_timeout: Duration,
    mailbox: usize,
}

impl ActorDirectory {
    pub(crate) fn new(
        registry: Arc<dyn SessionRegistry>,
        idle_timeout: Duration,
        mailbox: usize,
    ) -> Self {
        Self {
            registry,
            senders: Mutex::new(HashMap::new()),
            idle_timeout,
            mailbox: mailbox.max(1),
        }
    }

    fn sender_for(&self, account_id: &AccountId) -> mpsc::Sender<AccountCommand> {
        let mut senders = self.senders.lock();
        if let Some(sender) = senders.get(account_id) {
            if !sender.is_closed() {
                return sender.clone();
            }
        }

        let (sender, receiver) = mpsc::channel(self.mailbox);
        let actor = AccountActor {
            account_id: account_id.clone(),
            registry: self.registry.clone(),
            receiver,
            idle_timeout: self.idle_timeout,
        };
        tokio::spawn(actor.run());
        senders.insert(account_id.clone(), sender.clone());
        sender
    }

    /// Drop map entries of actors that have exited.
    pub(crate) fn prune(&self) -> usize {
        let mut senders = self.senders.lock();
        let before = senders.len();
        senders.retain(|_, sender| !sender.is_closed());
        before - senders.len()
    }

    /// Sends a command built around a fresh responder and awaits its reply.
    pub(crate) async fn request<T>(
        &self,
        account_id: &AccountId,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> AccountCommand,
    ) -> Result<T> {
        let (responder, reply) = oneshot::channel();
        let mut command = build(responder);

        // An actor may close between lookup and send; one respawn covers it.
        for _ in 0..2 {
            let sender = self.sender_for(account_id);
            match sender.send(command).await {
                Ok(()) => {
                    return reply
                        .await
                        .map_err(|_| Error::internal("account actor dropped the request"))?;
                }
                Err(mpsc::error::SendError(returned)) => command = returned,
            }
        }
        Err(Error::internal("account actor unavailable"))
    }
}
