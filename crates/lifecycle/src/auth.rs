//! Local authentication provider.
//!
//! Verifies passwords against Argon2id PHC hashes from configuration and
//! hands out opaque `slt_` bearer tokens. Every reauthentication runs the
//! full hash verification; nothing is cached.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use session_core::{
    AccountId, AuthErrorCode, AuthGrant, AuthProvider, AuthToken, Error, Result,
};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A configured account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalAccount {
    /// Sign-in name, matched case-insensitively.
    pub identity: String,
    pub account_id: String,
    /// Argon2id PHC string.
    pub password_hash: String,
}

/// Hash a password for a [`LocalAccount`] entry.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::internal(format!("password hashing failed: {}", e)))
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| Error::internal(format!("stored password hash is invalid: {}", e)))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(Error::internal(format!("password verification failed: {}", e))),
    }
}

/// Runs the Argon2 verification off the async workers.
async fn verify_blocking(password: &str, hash: &str) -> Result<bool> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| Error::internal(format!("password verification task failed: {}", e)))?
}

pub struct LocalAuthProvider {
    /// Lowercased identity -> account
    accounts: HashMap<String, LocalAccount>,
    tokens: RwLock<HashMap<AuthToken, AccountId>>,
}

impl LocalAuthProvider {
    pub fn new(accounts: Vec<LocalAccount>) -> Self {
        let accounts = accounts
            .into_iter()
            .map(|account| (account.identity.to_lowercase(), account))
            .collect::<HashMap<_, _>>();
        info!(accounts = accounts.len(), "Local auth provider ready");

        Self {
            accounts,
            tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Number of tokens currently signed in.
    pub fn signed_in(&self) -> usize {
        self.tokens.read().len()
    }

    fn hash_for(&self, account_id: &AccountId) -> Option<&str> {
        self.accounts
            .values()
            .find(|account| account.account_id == account_id.as_str())
            .map(|account| account.password_hash.as_str())
    }

    fn issue_token(&self, account_id: AccountId) -> Result<AuthToken> {
        let token = AuthToken::from_body(&Uuid::new_v4().simple().to_string())?;
        self.tokens.write().insert(token.clone(), account_id);
        Ok(token)
    }
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    async fn sign_in(&self, identity: &str, secret: &str) -> Result<AuthGrant> {
        let invalid = || Error::auth(AuthErrorCode::InvalidCredentials, "Invalid identity or password");

        let Some(account) = self.accounts.get(&identity.to_lowercase()) else {
            debug!("Sign-in for unknown identity");
            return Err(invalid());
        };
        if !verify_blocking(secret, &account.password_hash).await? {
            return Err(invalid());
        }

        let account_id = AccountId::new(account.account_id.clone());
        let token = self.issue_token(account_id.clone())?;
        Ok(AuthGrant { account_id, token })
    }

    async fn reauthenticate(&self, token: &AuthToken, secret: &str) -> Result<()> {
        let Some(account_id) = self.resolve(token).await else {
            return Err(Error::unauthenticated("Not signed in"));
        };
        let Some(hash) = self.hash_for(&account_id) else {
            warn!(account_id = %account_id, "Signed-in account is no longer configured");
            return Err(Error::reauthentication_failed());
        };

        if verify_blocking(secret, hash).await? {
            Ok(())
        } else {
            Err(Error::reauthentication_failed())
        }
    }

    async fn sign_out(&self, token: &AuthToken) -> Result<()> {
        // Signing out twice is not an error.
        self.tokens.write().remove(token);
        Ok(())
    }

    async fn resolve(&self, token: &AuthToken) -> Option<AccountId> {
        self.tokens.read().get(token).cloned()
    }
}
