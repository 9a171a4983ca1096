use thiserror::Error;

/// Top-level error type for the `claimsd-api` crate.
///
/// Covers every failure mode of the transport adapter: HTTP transport,
/// endpoint selection, payload decoding, and the push-event stream.
/// `claimsd-client` maps these into its own status vocabulary.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error (bad endpoint override, bad path).
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Service responses ───────────────────────────────────────────
    /// Non-success status from the claims service.
    #[error("API request failed with status {status}: {body}")]
    Api { status: u16, body: String },

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("API response parse error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => *status >= 500,
            Self::InvalidUrl(_) | Self::Deserialization { .. } => false,
        }
    }
}
