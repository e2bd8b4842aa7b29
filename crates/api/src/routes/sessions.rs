//! Session management endpoints for the signed-in account.

use axum::{
    extract::{Path, State},
    Json,
};
use lifecycle::{TerminationOutcome, TerminationReport};
use session_core::{ReauthRequest, RecordId, Session};
use tracing::debug;

use crate::extractors::{AuthedClient, ValidJson};
use crate::response::{ApiError, SessionsResponse};
use crate::state::AppState;

/// GET /sessions - Current device plus every other session of the account.
pub async fn list_handler(
    State(state): State<AppState>,
    AuthedClient(client): AuthedClient,
) -> Result<Json<SessionsResponse>, ApiError> {
    let list = state.manager.list_sessions(client.account_id()).await?;
    debug!(
        account_id = %client.account_id(),
        sessions = list.len(),
        "Listed sessions"
    );

    Ok(Json(SessionsResponse {
        current: list.current,
        others: list.others,
        current_session_id: client.current_session_id(),
    }))
}

/// GET /sessions/:id - One session of the caller's account.
pub async fn get_handler(
    State(state): State<AppState>,
    AuthedClient(client): AuthedClient,
    Path(id): Path<RecordId>,
) -> Result<Json<Session>, ApiError> {
    let session = state.manager.get_session(client.account_id(), &id).await?;
    Ok(Json(session))
}

/// DELETE /sessions/:id - Terminate one session after reauthentication.
pub async fn terminate_handler(
    State(state): State<AppState>,
    AuthedClient(client): AuthedClient,
    Path(id): Path<RecordId>,
    ValidJson(request): ValidJson<ReauthRequest>,
) -> Result<Json<TerminationOutcome>, ApiError> {
    let outcome = state
        .manager
        .terminate(&client, &id, &request.password)
        .await?;

    if outcome.signed_out {
        state.clients.remove(client.token());
    }
    Ok(Json(outcome))
}

/// POST /sessions/terminate-others - Terminate every other session.
pub async fn terminate_others_handler(
    State(state): State<AppState>,
    AuthedClient(client): AuthedClient,
    ValidJson(request): ValidJson<ReauthRequest>,
) -> Result<Json<TerminationReport>, ApiError> {
    let report = state
        .manager
        .terminate_all_others(&client, &request.password)
        .await?;
    Ok(Json(report))
}
