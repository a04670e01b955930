use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::services::storage::StorageError;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("cannot read uploaded file: {0}")]
    UnreadableSource(String),

    #[error("no sizes configured for {entity}.{kind}")]
    NoSizesConfigured { entity: String, kind: String },

    #[error("upload failed, no usable image variant produced")]
    NoVariantsGenerated,

    #[error("unsupported model type: {0}")]
    UnsupportedModelType(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("file record not found")]
    RecordNotFound,

    #[error("stored names are {found}, expected {expected}")]
    NamesShapeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("invalid names payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Per-size failure inside the transcode loop. Never surfaced to callers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranscodeError {
    #[error("source could not be decoded: {0}")]
    UnsupportedSource(String),

    #[error("source has zero width or height")]
    DegenerateSource,

    #[error("encoder produced no output: {0}")]
    EncodeFailure(String),

    #[error("invalid target dimensions {width:?}x{height:?}")]
    InvalidDimensions {
        width: Option<u32>,
        height: Option<u32>,
    },
}

impl IntoResponse for MediaError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            MediaError::UnreadableSource(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "cannot read uploaded file".to_string(),
            ),
            MediaError::NoSizesConfigured { .. } | MediaError::NoVariantsGenerated => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "upload failed, no usable image variant produced".to_string(),
            ),
            MediaError::UnsupportedModelType(_) | MediaError::InvalidRequest(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            MediaError::RecordNotFound => (StatusCode::NOT_FOUND, self.to_string()),
            MediaError::NamesShapeMismatch { .. } => (StatusCode::CONFLICT, self.to_string()),
            MediaError::Configuration(_)
            | MediaError::Storage(_)
            | MediaError::Database(_)
            | MediaError::Serialization(_) => {
                tracing::error!(error = %self, "media request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
