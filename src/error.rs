//! Errors raised while talking to the upstream tracker.

use thiserror::Error;

/// Any failure of a page or changelog request. Always fatal for the
/// aggregate being computed.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The request never produced a response (connect, timeout, body read).
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status code.
    #[error("Jira returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// The body did not match the expected shape.
    #[error("unexpected response body from {url}: {source}")]
    Deserialization {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl UpstreamError {
    /// HTTP status reported by upstream, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
