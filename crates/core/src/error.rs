//! Unified error types for the session lifecycle service.
//!
//! Error codes:
//! - AUTH_001-003: Authentication errors
//! - SESS_001-002: Session management errors
//! - REG_001: Registry errors
//! - VALID_001: Validation errors

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Authentication error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorCode {
    /// AUTH_001: Identity or secret rejected at sign-in
    InvalidCredentials,
    /// AUTH_002: Password re-verification failed before a termination
    ReauthenticationFailed,
    /// AUTH_003: Missing, unknown, or signed-out auth token
    Unauthenticated,
}

impl AuthErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "AUTH_001",
            Self::ReauthenticationFailed => "AUTH_002",
            Self::Unauthenticated => "AUTH_003",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        401
    }
}

/// Session management error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionErrorCode {
    /// SESS_001: Caller may not manage the targeted session
    PermissionDenied,
    /// SESS_002: Session record does not exist
    NotFound,
}

impl SessionErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "SESS_001",
            Self::NotFound => "SESS_002",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::PermissionDenied => 403,
            Self::NotFound => 404,
        }
    }
}

/// Registry error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryErrorCode {
    /// REG_001: Registry unavailable or write rejected
    Unavailable,
}

impl RegistryErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unavailable => "REG_001",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        503
    }
}

/// Unified error type for the session lifecycle service.
#[derive(Debug, Error)]
pub enum Error {
    /// Authentication error with code.
    #[error("[{code}] {message}")]
    Auth {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    /// Session management error with code.
    #[error("[{code}] {message}")]
    Session {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    /// Registry error with code.
    #[error("[{code}] {message}")]
    Registry {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an authentication error.
    pub fn auth(code: AuthErrorCode, msg: impl Into<String>) -> Self {
        Self::Auth {
            code: code.code(),
            message: msg.into(),
            http_status: code.http_status(),
        }
    }

    /// Create a session management error.
    pub fn session(code: SessionErrorCode, msg: impl Into<String>) -> Self {
        Self::Session {
            code: code.code(),
            message: msg.into(),
            http_status: code.http_status(),
        }
    }

    /// Create a registry error.
    pub fn registry(code: RegistryErrorCode, msg: impl Into<String>) -> Self {
        Self::Registry {
            code: code.code(),
            message: msg.into(),
            http_status: code.http_status(),
        }
    }

    /// Reauthentication failed; the user should re-enter their password.
    pub fn reauthentication_failed() -> Self {
        Self::auth(
            AuthErrorCode::ReauthenticationFailed,
            "Reauthentication failed, check your password",
        )
    }

    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::auth(AuthErrorCode::Unauthenticated, msg)
    }

    /// The caller may not manage the targeted session.
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::session(SessionErrorCode::PermissionDenied, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::session(SessionErrorCode::NotFound, msg)
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::registry(RegistryErrorCode::Unavailable, msg)
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Auth { http_status, .. } => *http_status,
            Self::Session { http_status, .. } => *http_status,
            Self::Registry { http_status, .. } => *http_status,
            Self::Validation(_) => 400,
            Self::Serialization(_) => 400,
            Self::Internal(_) => 500,
        }
    }

    /// Get the error code if this is a coded error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::Auth { code, .. } => Some(code),
            Self::Session { code, .. } => Some(code),
            Self::Registry { code, .. } => Some(code),
            Self::Validation(_) | Self::Serialization(_) => Some("VALID_001"),
            Self::Internal(_) => None,
        }
    }

    /// Whether this is the distinct permission-denied condition.
    pub fn is_permission_denied(&self) -> bool {
        self.error_code() == Some(SessionErrorCode::PermissionDenied.code())
    }

    /// Whether this is a failed password re-verification.
    pub fn is_reauthentication_failure(&self) -> bool {
        self.error_code() == Some(AuthErrorCode::ReauthenticationFailed.code())
    }
}
