//! Controller error definitions.

use thiserror::Error;

use crate::admin::error::AdminError;

/// Errors surfaced by the reconciliation entry points.
///
/// Each variant carries the static label of the failed operation; none of
/// them is retried by the controller itself.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("cannot create new Caddy client: invalid endpoint '{endpoint}': {reason}")]
    NewClient { endpoint: String, reason: String },

    #[error("cannot get proxy route: {0}")]
    GetRoute(#[source] AdminError),

    #[error("cannot create proxy route: {0}")]
    CreateRoute(#[source] AdminError),

    #[error("cannot update proxy route: {0}")]
    UpdateRoute(#[source] AdminError),

    #[error("cannot delete proxy route: {0}")]
    DeleteRoute(#[source] AdminError),
}

impl ControllerError {
    /// The underlying admin API failure, if any.
    pub fn admin_error(&self) -> Option<&AdminError> {
        match self {
            Self::NewClient { .. } => None,
            Self::GetRoute(e) | Self::CreateRoute(e) | Self::UpdateRoute(e) | Self::DeleteRoute(e) => {
                Some(e)
            }
        }
    }
}

pub type ControllerResult<T> = Result<T, ControllerError>;
