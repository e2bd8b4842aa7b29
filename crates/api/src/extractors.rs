//! Request extractors.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequest, FromRequestParts, Request},
    http::{header, request::Parts},
    Json,
};
use lifecycle::ClientSession;
use serde::de::DeserializeOwned;
use session_core::extract_bearer_token;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use validator::Validate;

use crate::response::ApiError;
use crate::state::AppState;

/// The signed-in client behind the bearer token.
#[derive(Debug, Clone)]
pub struct AuthedClient(pub Arc<ClientSession>);

#[async_trait]
impl FromRequestParts<AppState> for AuthedClient {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());
        let token = extract_bearer_token(auth_header)?;

        state
            .clients
            .get(&token)
            .map(AuthedClient)
            .ok_or_else(|| ApiError::unauthorized("Not signed in"))
    }
}

/// Client IP address from proxy headers, else the peer of the connection.
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub Option<IpAddr>);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // First hop of X-Forwarded-For, then X-Real-IP
        let forwarded = parts
            .headers
            .get("X-Forwarded-For")
            .and_then(|h| h.to_str().ok())
            .and_then(|xff| xff.split(',').next())
            .and_then(|ip| ip.trim().parse().ok());

        let ip = forwarded
            .or_else(|| {
                parts
                    .headers
                    .get("X-Real-IP")
                    .and_then(|h| h.to_str().ok())
                    .and_then(|ip| ip.trim().parse().ok())
            })
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip())
            });

        Ok(ClientIp(ip))
    }
}

/// `User-Agent` and the primary `Accept-Language` tag.
#[derive(Debug, Clone, Default)]
pub struct RequestAgent {
    pub user_agent: Option<String>,
    pub language: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestAgent
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header_str = |name| parts.headers.get(name).and_then(|h| h.to_str().ok());

        let user_agent = header_str(header::USER_AGENT).map(str::to_string);
        let language = header_str(header::ACCEPT_LANGUAGE)
            .and_then(|value| value.split(',').next())
            .map(|tag| tag.split(';').next().unwrap_or(tag).trim().to_string())
            .filter(|tag| !tag.is_empty() && tag != "*");

        Ok(RequestAgent {
            user_agent,
            language,
        })
    }
}

/// JSON body that is deserialized and validated, with failures reported
/// as `VALID_001`.
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
        value.validate()?;
        Ok(ValidJson(value))
    }
}
