// src/errors.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mongodb::error::{ErrorKind, WriteFailure};
use serde_json::json;
use thiserror::Error;

const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("MongoDB error: {0}")]
    MongoDB(#[from] mongodb::error::Error),

    #[error("BSON serialization error: {0}")]
    BsonSerialization(#[from] bson::ser::Error),

    #[error("Invalid ObjectId: {0}")]
    InvalidObjectId(String),

    // Network failure or 5xx from the feed; retried on the next scheduled pass.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    // The feed answered with a shape we cannot read; the unit of work is skipped.
    #[error("Upstream malformed: {0}")]
    UpstreamMalformed(String),

    // Unique primaryId violated during upsert; resolved by re-fetch-and-merge.
    #[error("Identity conflict on primary id {primary_id}")]
    IdentityConflict { primary_id: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::MongoDB(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string()),
            AppError::BsonSerialization(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Serialization error".to_string()),
            AppError::InvalidObjectId(_) => (StatusCode::BAD_REQUEST, "Invalid ID format".to_string()),
            AppError::UpstreamUnavailable(_) => (StatusCode::BAD_GATEWAY, "Upstream unavailable".to_string()),
            AppError::UpstreamMalformed(_) => (StatusCode::BAD_GATEWAY, "Upstream response malformed".to_string()),
            AppError::IdentityConflict { .. } => (StatusCode::CONFLICT, "Identity conflict".to_string()),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "Not found".to_string()),
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "Validation failed".to_string()),
            AppError::ConfigurationError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Configuration error".to_string()),
        };

        let body = Json(json!({
            "error": error_message,
            "message": self.to_string(),
            "success": false,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::UpstreamMalformed(format!("JSON parsing error: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AppError::UpstreamMalformed(format!("HTTP body could not be decoded: {}", err))
        } else {
            AppError::UpstreamUnavailable(format!("HTTP request failed: {}", err))
        }
    }
}

impl From<bson::oid::Error> for AppError {
    fn from(err: bson::oid::Error) -> Self {
        AppError::InvalidObjectId(err.to_string())
    }
}

// Helper conversion functions
impl AppError {
    pub fn upstream_unavailable(msg: impl Into<String>) -> Self {
        AppError::UpstreamUnavailable(msg.into())
    }

    pub fn upstream_malformed(msg: impl Into<String>) -> Self {
        AppError::UpstreamMalformed(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn invalid_data(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        AppError::ConfigurationError(msg.into())
    }

    /// Maps a store write failure, turning unique-index violations on
    /// `primaryId` into [`AppError::IdentityConflict`].
    pub fn from_write(err: mongodb::error::Error, primary_id: Option<&str>) -> Self {
        match (is_duplicate_key(&err), primary_id) {
            (true, Some(id)) => AppError::IdentityConflict {
                primary_id: id.to_string(),
            },
            _ => AppError::MongoDB(err),
        }
    }
}

pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == DUPLICATE_KEY_CODE,
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
