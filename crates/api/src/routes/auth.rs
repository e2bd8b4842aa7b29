//! Sign-in and logout endpoints.

use axum::{extract::State, http::StatusCode, Json};
use session_core::{Error, SignInRequest};
use tracing::{info, warn};

use crate::extractors::{AuthedClient, ClientIp, RequestAgent, ValidJson};
use crate::response::{ApiError, SignInResponse};
use crate::state::AppState;

/// POST /auth/sign-in
///
/// The device block in the body is optional; the `User-Agent` header and
/// the primary `Accept-Language` tag fill gaps, and the client address
/// always comes from the connection headers.
pub async fn sign_in_handler(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    agent: RequestAgent,
    ValidJson(request): ValidJson<SignInRequest>,
) -> Result<Json<SignInResponse>, ApiError> {
    let SignInRequest {
        identity,
        secret,
        device,
    } = request;

    let mut env = device.with_client_ip(client_ip);
    if env.user_agent.is_empty() {
        env.user_agent = agent.user_agent.unwrap_or_default();
    }
    if env.language.is_none() {
        env.language = agent.language;
    }

    let client = state.manager.sign_in(&identity, &secret, env).await?;

    let session = match state.manager.registry().get(client.record_id()).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            // Terminated from another device before the response went out.
            return Err(Error::unauthenticated("Session was terminated").into());
        }
        Err(e) => {
            warn!(record_id = %client.record_id(), error = %e, "Could not read new session record");
            state.manager.logout(&client).await.ok();
            return Err(e.into());
        }
    };

    info!(
        account_id = %client.account_id(),
        record_id = %client.record_id(),
        session_id = %client.current_session_id(),
        device_type = %session.device_type,
        "Signed in"
    );

    state.clients.insert(client.clone());
    Ok(Json(SignInResponse {
        token: client.token().as_str().to_string(),
        current_session_id: client.current_session_id(),
        session,
    }))
}

/// POST /auth/logout
pub async fn logout_handler(
    State(state): State<AppState>,
    AuthedClient(client): AuthedClient,
) -> Result<StatusCode, ApiError> {
    state.clients.remove(client.token());
    state.manager.logout(&client).await?;
    Ok(StatusCode::NO_CONTENT)
}
