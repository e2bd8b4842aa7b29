//! Lookup errors.
//!
//! None of these reach the caller of the collector or the evaluator; they
//! are logged and replaced with "Unknown" or fail-open defaults.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("lookup disabled")]
    Disabled,

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(String),
}
