//! Telemetry for the session lifecycle service.
//!
//! Metrics stay in-process and are logged as periodic snapshots; health is
//! aggregated from the registry and geolocation components.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
