//! HTTP API layer for the session lifecycle service.

pub mod extractors;
pub mod response;
pub mod routes;
pub mod state;

pub use routes::router;
pub use state::{AppState, ClientDirectory, Sweep, DEFAULT_CLIENT_IDLE_TTL};
