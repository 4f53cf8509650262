pub mod client;
pub mod compact;
pub mod fetcher;
pub mod payload;
#[cfg(test)]
pub mod testing;

pub use client::ApiFootballHttp;
pub use compact::to_live_compact;
pub use fetcher::LiveFetcher;
pub use payload::SubEvent;

use thiserror::Error;

/// Failures on the provider fetch path.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The static credential is not configured; fails the call, not the process.
    #[error("missing {0} (set it in the environment)")]
    ConfigurationMissing(&'static str),

    /// Transport failure or timeout.
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    /// Provider answered with a non-success status.
    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Body was not valid JSON.
    #[error("malformed upstream payload: {0}")]
    Malformed(String),
}

impl UpstreamError {
    /// Worth retrying on the next cycle; configuration problems are not.
    pub fn is_transient(&self) -> bool {
        !matches!(self, UpstreamError::ConfigurationMissing(_))
    }

    /// HTTP status reported by the provider, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            UpstreamError::Malformed(e.to_string())
        } else {
            UpstreamError::Unavailable(e.to_string())
        }
    }
}
