//! Types for reporting errors that happened during a request.
//!
//! Every request-scoped failure is logged on the server and answered with an
//! empty `500 Internal Server Error`. Nothing about the cause reaches the client.

use axum::{
    body::Body,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use tower_http::catch_panic::ResponseForPanic;

/// An error from our API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The store could not be queried.
    #[error("error querying db: {0}")]
    Store(#[from] sqlx::Error),
    /// The response could not be serialized.
    #[error("error marshalling: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Other miscellaneous errors.
    #[error("{0}")]
    Other(String),
}

/// The result of calling API-related functions.
pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!("internal error: {}", self);
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

/// A handler for converting panics into proper responses for the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PanicHandler;

impl ResponseForPanic for PanicHandler {
    type ResponseBody = Body;

    fn response_for_panic(
        &mut self,
        _: Box<dyn std::any::Any + Send + 'static>,
    ) -> http::Response<Self::ResponseBody> {
        ApiError::Other("handler panicked".to_string()).into_response()
    }
}
