//! Shared helpers for the session lifecycle integration tests.

pub mod fixtures;
