//! Core types, errors, and auth contracts for the session lifecycle service.

pub mod auth;
pub mod environment;
pub mod error;
pub mod session;

pub use auth::*;
pub use environment::*;
pub use error::{AuthErrorCode, Error, RegistryErrorCode, Result, SessionErrorCode};
pub use session::*;
