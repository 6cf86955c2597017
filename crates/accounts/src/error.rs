use thiserror::Error;

use crate::api::ApiError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] portal_store::Error),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("invalid composite account id: {reason}")]
    InvalidAccountId { reason: String },

    #[error("no account selection is stored for brand {brand}")]
    NoSelection { brand: String },

    #[error("no account list is awaiting a selection")]
    NotAwaitingSelection,

    #[error("account {account} was not offered for selection")]
    UnknownAccount { account: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

impl Error {
    #[must_use]
    pub fn invalid_account_id(reason: impl Into<String>) -> Self {
        Self::InvalidAccountId {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
