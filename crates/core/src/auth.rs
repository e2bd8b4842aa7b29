//! Authentication provider contract and auth token handling.
//!
//! This module provides:
//! - The [`AuthProvider`] trait the lifecycle manager signs in, reauthenticates,
//!   and signs out through
//! - Auth token format validation (slt_xxx)
//! - Sign-in and reauthentication request types

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use validator::Validate;

use crate::environment::ClientEnvironment;
use crate::error::{AuthErrorCode, Error, Result};
use crate::session::AccountId;

/// Auth token pattern: `slt_` followed by 32 alphanumerics.
pub const AUTH_TOKEN_PATTERN: &str = r"^slt_[a-zA-Z0-9]{32}$";

/// Compiled auth token regex (lazy initialization).
static AUTH_TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(AUTH_TOKEN_PATTERN).expect("invalid auth token pattern"));

/// Opaque bearer token identifying one signed-in client.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    /// Parse and validate a token.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::auth(
                AuthErrorCode::Unauthenticated,
                "Auth token is required",
            ));
        }

        if !AUTH_TOKEN_REGEX.is_match(raw) {
            return Err(Error::auth(
                AuthErrorCode::Unauthenticated,
                "Invalid auth token format",
            ));
        }

        Ok(Self(raw.to_string()))
    }

    /// Builds a token from 32 alphanumeric characters.
    pub fn from_body(body: &str) -> Result<Self> {
        Self::parse(&format!("slt_{body}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never log the full token.
        write!(f, "AuthToken({}…)", &self.0[..self.0.len().min(8)])
    }
}

/// Result of a successful sign-in.
#[derive(Debug, Clone)]
pub struct AuthGrant {
    pub account_id: AccountId,
    pub token: AuthToken,
}

/// Credentials presented at sign-in, with optional device hints.
#[derive(Clone, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(length(min = 1, max = 254))]
    pub identity: String,
    #[validate(length(min = 1, max = 1024))]
    pub secret: String,
    #[serde(default)]
    #[validate(nested)]
    pub device: ClientEnvironment,
}

impl fmt::Debug for SignInRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignInRequest")
            .field("identity", &self.identity)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

/// Password presented to re-prove identity before a termination.
#[derive(Clone, Deserialize, Validate)]
pub struct ReauthRequest {
    #[validate(length(min = 1, max = 1024))]
    pub password: String,
}

impl fmt::Debug for ReauthRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ReauthRequest { .. }")
    }
}

/// External authentication provider.
///
/// `reauthenticate` must verify the secret every time it is called; callers
/// rely on it never answering from a cached credential.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Verify credentials and open an auth session.
    async fn sign_in(&self, identity: &str, secret: &str) -> Result<AuthGrant>;

    /// Re-verify the password of the account behind `token`.
    async fn reauthenticate(&self, token: &AuthToken, secret: &str) -> Result<()>;

    /// Close the auth session behind `token`.
    async fn sign_out(&self, token: &AuthToken) -> Result<()>;

    /// Resolve a token to its account, if it is still signed in.
    async fn resolve(&self, token: &AuthToken) -> Option<AccountId>;
}

/// Extract the auth token from an `Authorization: Bearer <token>` header.
pub fn extract_bearer_token(auth_header: Option<&str>) -> Result<AuthToken> {
    if let Some(auth) = auth_header {
        if let Some(token) = auth.strip_prefix("Bearer ") {
            return AuthToken::parse(token.trim());
        }
    }

    Err(Error::auth(
        AuthErrorCode::Unauthenticated,
        "Auth token is required",
    ))
}
