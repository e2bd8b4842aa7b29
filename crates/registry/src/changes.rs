//! Change events and subscriptions.
//!
//! Subscribers receive events through `tokio::sync::broadcast`. Delivery is
//! at-least-once from the subscriber's point of view: a receiver that falls
//! behind gets a `Resync` marker and is expected to re-read the registry.

use chrono::{DateTime, Utc};
use serde::Serialize;
use session_core::{AccountId, RecordId, Session, SessionFilter};
use telemetry::metrics;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

/// Kind of mutation that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// A single record mutation.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub record_id: RecordId,
    pub user_id: AccountId,
    /// Record state after the change; `None` for deletions.
    pub session: Option<Session>,
    pub at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn created(session: &Session) -> Self {
        Self::with_session(ChangeKind::Created, session)
    }

    pub fn updated(session: &Session) -> Self {
        Self::with_session(ChangeKind::Updated, session)
    }

    pub fn deleted(session: &Session) -> Self {
        Self {
            kind: ChangeKind::Deleted,
            record_id: session.id.clone(),
            user_id: session.user_id.clone(),
            session: None,
            at: Utc::now(),
        }
    }

    fn with_session(kind: ChangeKind, session: &Session) -> Self {
        Self {
            kind,
            record_id: session.id.clone(),
            user_id: session.user_id.clone(),
            session: Some(session.clone()),
            at: Utc::now(),
        }
    }

    /// Whether the event concerns a record inside (or leaving) `filter`.
    ///
    /// Updates are reported even when the new state no longer matches, so a
    /// query subscriber can drop a record that was demoted out of its view.
    pub fn touches(&self, filter: &SessionFilter) -> bool {
        if self.user_id != filter.user_id {
            return false;
        }
        match (&self.kind, &self.session) {
            (ChangeKind::Deleted, _) | (ChangeKind::Updated, _) => true,
            (ChangeKind::Created, Some(session)) => filter.matches(session),
            (ChangeKind::Created, None) => false,
        }
    }
}

/// What a single-record subscriber observes.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordChange {
    /// The record exists with this state.
    Present(Session),
    /// The record no longer exists.
    Removed,
    /// Events were dropped; re-read the record.
    Resync,
}

/// Live subscription to one record.
///
/// The first item is always a snapshot of the record taken atomically with
/// the subscription, so a deletion that raced the subscribe is not missed.
pub struct RecordSubscription {
    record_id: RecordId,
    initial: Option<RecordChange>,
    rx: broadcast::Receiver<ChangeEvent>,
}

impl RecordSubscription {
    pub fn new(
        record_id: RecordId,
        snapshot: Option<Session>,
        rx: broadcast::Receiver<ChangeEvent>,
    ) -> Self {
        let initial = match snapshot {
            Some(session) => RecordChange::Present(session),
            None => RecordChange::Removed,
        };
        Self {
            record_id,
            initial: Some(initial),
            rx,
        }
    }

    pub fn record_id(&self) -> &RecordId {
        &self.record_id
    }

    /// Waits for the next change. Returns `None` once the feed is closed.
    pub async fn next(&mut self) -> Option<RecordChange> {
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }

        loop {
            match self.rx.recv().await {
                Ok(event) if event.record_id == self.record_id => {
                    return Some(match event.session {
                        Some(session) => RecordChange::Present(session),
                        None => RecordChange::Removed,
                    });
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(record_id = %self.record_id, skipped, "Record subscriber lagged");
                    metrics().subscriber_resyncs.inc();
                    return Some(RecordChange::Resync);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// What a query subscriber observes.
#[derive(Debug, Clone)]
pub enum QueryChange {
    Event(ChangeEvent),
    /// Events were dropped; re-run the query.
    Resync,
}

/// Live subscription to the records of one account matching a filter.
pub struct QuerySubscription {
    filter: SessionFilter,
    rx: broadcast::Receiver<ChangeEvent>,
}

impl QuerySubscription {
    pub fn new(filter: SessionFilter, rx: broadcast::Receiver<ChangeEvent>) -> Self {
        Self { filter, rx }
    }

    pub fn filter(&self) -> &SessionFilter {
        &self.filter
    }

    /// Waits for the next relevant change. Returns `None` once the feed is closed.
    pub async fn next(&mut self) -> Option<QueryChange> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.touches(&self.filter) => return Some(QueryChange::Event(event)),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(user_id = %self.filter.user_id, skipped, "Query subscriber lagged");
                    metrics().subscriber_resyncs.inc();
                    return Some(QueryChange::Resync);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
