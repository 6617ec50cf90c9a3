//! Admin API error taxonomy.

use thiserror::Error;

/// Errors returned by [`AdminClient`](crate::admin::AdminClient) calls.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Connection, DNS or protocol failure talking to the admin endpoint.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The caller's deadline passed before the exchange completed.
    #[error("admin API call exceeded its deadline")]
    Timeout,

    /// The caller cancelled the call.
    #[error("admin API call cancelled")]
    Cancelled,

    /// A request or response body could not be (de)serialized.
    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Non-2xx response that is not one of the documented not-found cases.
    #[error("caddy API returned status {status}: {body}")]
    Backend { status: u16, body: String },

    /// The route, or the server's route array, does not exist.
    #[error("route not found")]
    NotFound,
}

impl AdminError {
    /// True for failures of the exchange itself rather than of the backend.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout | Self::Cancelled)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Result type for admin API operations.
pub type AdminResult<T> = Result<T, AdminError>;
