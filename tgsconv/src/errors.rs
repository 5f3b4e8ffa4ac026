use crate::api::models::ErrorResponse;
use crate::decode::DecodeError;
use crate::render::RenderFailure;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// The request carried no sticker file
    #[error("No TGS file provided")]
    MissingUpload,

    /// The multipart body could not be read
    #[error("{message}")]
    BadRequest { message: String },

    /// The upload exceeds `max_upload_size`
    #[error("{message}")]
    PayloadTooLarge { message: String },

    /// Upload is neither gzip-compressed JSON nor plain JSON
    #[error(transparent)]
    MalformedInput(#[from] DecodeError),

    /// Every render attempt failed
    #[error(transparent)]
    RenderFailure(#[from] RenderFailure),

    /// The rendered artifact could not be read back
    #[error("Failed to read rendered image: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::MissingUpload | Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::MalformedInput(_) | Error::RenderFailure(_) | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::RenderFailure(failure) => {
                tracing::error!(cause = %failure.last_error, "Conversion error: {}", self);
            }
            Error::MalformedInput(_) | Error::Io(_) => {
                tracing::error!("Conversion error: {}", self);
            }
            Error::MissingUpload | Error::BadRequest { .. } | Error::PayloadTooLarge { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let body = ErrorResponse { error: self.to_string() };
        (self.status_code(), Json(body)).into_response()
    }
}

/// Type alias for handler results
pub type Result<T> = std::result::Result<T, Error>;
