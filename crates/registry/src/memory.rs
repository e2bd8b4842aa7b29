//! In-process session registry.
//!
//! Documents live in a `HashMap` behind one `parking_lot` mutex. Change
//! events are published while that lock is held, so subscribers of a single
//! record observe writes in the order they were applied.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use session_core::{
    AccountId, Error, RecordId, Result, Session, SessionDraft, SessionFilter, SessionPatch,
};
use std::collections::HashMap;
use telemetry::metrics;
use tokio::sync::broadcast;
use tracing::debug;

use crate::changes::{ChangeEvent, QuerySubscription, RecordSubscription};
use crate::store::SessionRegistry;

/// Registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Buffered events per subscription channel before subscribers lag
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    64
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

#[derive(Default)]
struct State {
    records: HashMap<RecordId, Session>,
    record_feeds: HashMap<RecordId, broadcast::Sender<ChangeEvent>>,
    account_feeds: HashMap<AccountId, broadcast::Sender<ChangeEvent>>,
}

impl State {
    fn publish(&mut self, event: ChangeEvent) {
        if let Some(feed) = self.record_feeds.get(&event.record_id) {
            // Zero receivers is not an error.
            let _ = feed.send(event.clone());
        }
        if let Some(feed) = self.account_feeds.get(&event.user_id) {
            if feed.receiver_count() == 0 {
                self.account_feeds.remove(&event.user_id);
            } else {
                let _ = feed.send(event);
            }
        }
        metrics().change_events_published.inc();
    }
}

/// In-memory [`SessionRegistry`].
pub struct MemoryRegistry {
    state: Mutex<State>,
    config: RegistryConfig,
}

impl MemoryRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            state: Mutex::new(State::default()),
            config,
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

#[async_trait]
impl SessionRegistry for MemoryRegistry {
    async fn create(&self, draft: SessionDraft) -> Result<Session> {
        let session = Session::from_draft(RecordId::generate(), draft);

        let mut state = self.state.lock();
        state.records.insert(session.id.clone(), session.clone());
        state.publish(ChangeEvent::created(&session));
        metrics().registry_writes.inc();

        debug!(record_id = %session.id, user_id = %session.user_id, "Created session record");
        Ok(session)
    }

    async fn update(&self, id: &RecordId, patch: SessionPatch) -> Result<Option<Session>> {
        let mut state = self.state.lock();
        let Some(record) = state.records.get_mut(id) else {
            return Ok(None);
        };

        record.apply(&patch);
        let updated = record.clone();
        state.publish(ChangeEvent::updated(&updated));
        metrics().registry_writes.inc();

        Ok(Some(updated))
    }

    async fn delete(&self, id: &RecordId, owner: &AccountId) -> Result<bool> {
        let mut state = self.state.lock();
        match state.records.get(id) {
            None => return Ok(false),
            Some(record) if !record.is_owned_by(owner) => {
                return Err(Error::permission_denied(format!(
                    "Session {} belongs to another account",
                    id
                )));
            }
            Some(_) => {}
        }

        let Some(removed) = state.records.remove(id) else {
            return Ok(false);
        };
        state.publish(ChangeEvent::deleted(&removed));
        // Dropping the sender closes every record subscriber after the delete event.
        state.record_feeds.remove(id);
        metrics().registry_deletes.inc();

        debug!(record_id = %id, user_id = %owner, "Deleted session record");
        Ok(true)
    }

    async fn get(&self, id: &RecordId) -> Result<Option<Session>> {
        Ok(self.state.lock().records.get(id).cloned())
    }

    async fn query(&self, filter: &SessionFilter) -> Result<Vec<Session>> {
        let state = self.state.lock();
        let mut sessions: Vec<Session> = state
            .records
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(sessions)
    }

    async fn watch_record(&self, id: &RecordId) -> Result<RecordSubscription> {
        let mut state = self.state.lock();
        let snapshot = state.records.get(id).cloned();

        let rx = match snapshot {
            Some(_) => {
                let capacity = self.config.channel_capacity;
                state
                    .record_feeds
                    .entry(id.clone())
                    .or_insert_with(|| broadcast::channel(capacity).0)
                    .subscribe()
            }
            // Nothing will ever be published for a missing record.
            None => broadcast::channel(1).1,
        };

        Ok(RecordSubscription::new(id.clone(), snapshot, rx))
    }

    async fn watch_query(&self, filter: SessionFilter) -> Result<QuerySubscription> {
        let mut state = self.state.lock();
        let capacity = self.config.channel_capacity;
        let rx = state
            .account_feeds
            .entry(filter.user_id.clone())
            .or_insert_with(|| broadcast::channel(capacity).0)
            .subscribe();

        Ok(QuerySubscription::new(filter, rx))
    }

    fn is_healthy(&self) -> bool {
        true
    }
}
