use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, info};

use livecomment_types::api::ErrorResponse;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed path, query or body.
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Authorization(String),

    #[error("this comment was detected as spam")]
    SpamDetected { word: String },

    /// The caller went away or timed out before commit.
    #[error("request cancelled")]
    Cancelled,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Error {
        Error::Validation(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Authorization(_) => StatusCode::BAD_REQUEST,
            Error::SpamDetected { .. } => StatusCode::BAD_REQUEST,
            Error::Cancelled => StatusCode::REQUEST_TIMEOUT,
            Error::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let message = match &self {
            Error::Store(err) => {
                error!(?err, "internal server error");
                String::from("internal server error")
            }
            other => {
                info!("returning error to client: {other}");
                other.to_string()
            }
        };
        (self.status_code(), Json(ErrorResponse { error: message })).into_response()
    }
}
