//! CLI error types with miette diagnostics.

use miette::Diagnostic;
use thiserror::Error;

use claimsd_client::{ClientError, StatusCode};

/// Exit codes: 0 success, 1 general failure, 8 timeout.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("Timed out waiting for claims from the local service")]
    #[diagnostic(
        code(claimsd::timeout),
        help(
            "Check that the claims service is running.\n\
             Override the endpoint with CLAIMSD_ENDPOINT or --endpoint,\n\
             or raise --timeout."
        )
    )]
    Timeout,

    #[error("Invalid endpoint URL: {url}")]
    #[diagnostic(code(claimsd::invalid_endpoint))]
    InvalidEndpoint { url: String },

    #[error("{0}")]
    #[diagnostic(code(claimsd::client))]
    Client(ClientError),

    #[error("Failed to render output")]
    #[diagnostic(code(claimsd::output))]
    Output(#[from] serde_json::Error),
}

impl From<ClientError> for CliError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Timeout => Self::Timeout,
            other => Self::Client(other),
        }
    }
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Timeout => exit_code::TIMEOUT,
            Self::InvalidEndpoint { .. } => exit_code::USAGE,
            Self::Client(_) | Self::Output(_) => exit_code::GENERAL,
        }
    }

    /// Stable numeric code for script consumption, where one applies.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::Timeout => Some(StatusCode::Timeout),
            Self::Client(err) => Some(StatusCode::from(err)),
            Self::InvalidEndpoint { .. } | Self::Output(_) => None,
        }
    }
}
