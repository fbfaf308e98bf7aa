use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::str;
use thiserror::Error as ThisError;
use tracing::error;

use crate::pipeline::ValidationError;
use crate::store::StoreError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("transport error; {0}")]
    Transport(#[from] axum::Error),
    #[error("protocol error; invalid UTF-8 string")]
    InvalidUtf8(#[from] str::Utf8Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self {
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error!(%status, "Request failed: {}", self);

        (status, self.to_string()).into_response()
    }
}
