//! The registry contract the lifecycle components depend on.

use async_trait::async_trait;
use session_core::{
    AccountId, RecordId, Result, Session, SessionDraft, SessionFilter, SessionPatch,
};

use crate::changes::{QuerySubscription, RecordSubscription};

/// Persistence and subscription substrate for session records.
///
/// Each individual call is atomic per document. Nothing here is
/// transactional across documents.
#[async_trait]
pub trait SessionRegistry: Send + Sync {
    /// Persist a new record under a freshly assigned id.
    async fn create(&self, draft: SessionDraft) -> Result<Session>;

    /// Apply a patch. Returns `None` if the record no longer exists.
    async fn update(&self, id: &RecordId, patch: SessionPatch) -> Result<Option<Session>>;

    /// Delete a record owned by `owner`.
    ///
    /// Returns `Ok(false)` when the record is already gone. A record owned
    /// by another account is rejected with a permission-denied error.
    async fn delete(&self, id: &RecordId, owner: &AccountId) -> Result<bool>;

    /// Point query by id.
    async fn get(&self, id: &RecordId) -> Result<Option<Session>>;

    /// Filtered query over one account's records.
    async fn query(&self, filter: &SessionFilter) -> Result<Vec<Session>>;

    /// Subscribe to one record.
    async fn watch_record(&self, id: &RecordId) -> Result<RecordSubscription>;

    /// Subscribe to one account's records matching `filter`.
    async fn watch_query(&self, filter: SessionFilter) -> Result<QuerySubscription>;

    /// Whether the backing store is reachable.
    fn is_healthy(&self) -> bool;
}
