pub mod admin;
pub mod events;
pub mod home;
pub mod sensors;
pub mod things;

use crate::errors::Error;
use crate::middleware::cached;
use axum::http::header::LOCATION;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use std::time::Duration;
use tracing::error;

pub type HandlerResult = Result<Response, AppError>;

/// Error ending a request. Only a short plain-text message reaches the browser.
#[derive(Debug)]
pub struct AppError(Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("Request failed: {}", self.0);

        let status = self.0.status_code();
        let message = match &self.0 {
            Error::Validation(reason) => reason.clone(),
            Error::Unauthorized => "not authorized".to_string(),
            _ => "could not compose view model".to_string(),
        };

        (status, message).into_response()
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

pub(crate) fn html(body: String, max_age: Duration) -> Response {
    cached(Html(body), max_age)
}

/// `302 Found`, which axum's `Redirect` has no constructor for.
pub(crate) fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}
