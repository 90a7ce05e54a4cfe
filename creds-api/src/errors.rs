use crate::store::StoreError;
use http::StatusCode;
use thiserror::Error;

/// Errors returned by the credential operations. Each one renders to a fixed
/// `{"error": ..., "detail": ...}` body; see [`ApiError::code`].
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("missing required upsert fields")]
    MissingUpsertFields,

    #[error("missing account name")]
    MissingAccountName,

    #[error("credential not found")]
    NotFound,

    #[error("no route matched for request")]
    RouteNotFound,

    #[error("store update failed: {0}")]
    StoreUpdate(StoreError),

    #[error("store read failed: {0}")]
    StoreRead(StoreError),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingUpsertFields | ApiError::MissingAccountName => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound | ApiError::RouteNotFound => StatusCode::NOT_FOUND,
            ApiError::StoreUpdate(_) | ApiError::StoreRead(_) | ApiError::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The `error` field of the response body. Clients match on these values.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MissingUpsertFields => {
                "required: username (non-empty), service (non-empty), password"
            }
            ApiError::MissingAccountName => "username query param required",
            ApiError::NotFound => "not found",
            ApiError::RouteNotFound => "route not found",
            ApiError::StoreUpdate(_) => "ddb_update_failed",
            ApiError::StoreRead(_) => "ddb_get_failed",
            ApiError::Unexpected(_) => "unexpected",
        }
    }

    /// Diagnostic text for server-side failures, passed through opaquely.
    pub fn detail(&self) -> Option<String> {
        match self {
            ApiError::StoreUpdate(e) | ApiError::StoreRead(e) => Some(e.to_string()),
            ApiError::Unexpected(detail) => Some(detail.clone()),
            _ => None,
        }
    }
}
