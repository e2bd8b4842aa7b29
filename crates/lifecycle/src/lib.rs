//! Session lifecycle: sign-in registration, heartbeat, reauthenticated
//! termination, and remote sign-out.

mod actor;
pub mod auth;
mod client;
pub mod config;
mod heartbeat;
mod listener;
mod manager;

pub use actor::TerminationReport;
pub use auth::{hash_password, LocalAccount, LocalAuthProvider};
pub use client::{ClientSession, ClientState};
pub use config::LifecycleConfig;
pub use heartbeat::HeartbeatScope;
pub use manager::{SessionLifecycleManager, TerminationOutcome};
