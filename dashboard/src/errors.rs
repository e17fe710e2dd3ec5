use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Upstream request not authorized")]
    Unauthorized,

    #[error("Upstream resource not found")]
    NotFound,

    #[error("Upstream request failed with status code {0}")]
    RequestFailed(StatusCode),

    #[error("Failed to decode upstream response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid upstream url: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Status code written back to the browser when this error ends a request.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
