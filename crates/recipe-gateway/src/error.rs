//! Error types for the gateway and their HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use recipe_core::ImageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("{0}")]
    Validation(String),

    #[error("Rate limit exceeded. Please wait before making another request.")]
    RateLimited,

    #[error("No valid images")]
    NoValidImages,

    #[error("Upstream API error: {status} - {body}")]
    Upstream { status: u16, body: String },

    #[error("No response from upstream API")]
    UpstreamEmptyResponse,

    #[error("Malformed upstream response: {0}")]
    UpstreamMalformed(String),

    #[error("Upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Client disconnected")]
    ClientDisconnected,
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_) | GatewayError::NoValidImages => StatusCode::BAD_REQUEST,
            GatewayError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Upstream { .. }
            | GatewayError::UpstreamEmptyResponse
            | GatewayError::UpstreamMalformed(_)
            | GatewayError::Transport(_)
            | GatewayError::ClientDisconnected => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the caller can fix the request themselves
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl From<ImageError> for GatewayError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::NoValidImages => GatewayError::NoValidImages,
            other => GatewayError::Validation(other.to_string()),
        }
    }
}

/// API Error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    /// Map a gateway error for an endpoint; server-side failures get the
    /// endpoint's summary as `error` and the cause as `details`
    pub fn from_gateway(summary: &str, err: &GatewayError) -> Self {
        if err.is_client_error() {
            Self::new(err.status_code(), err.to_string())
        } else {
            Self {
                status: err.status_code(),
                message: summary.to_string(),
                details: Some(err.to_string()),
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = if self.status == StatusCode::TOO_MANY_REQUESTS {
            serde_json::json!({
                "error": self.message
            })
        } else {
            match self.details {
                Some(details) => serde_json::json!({
                    "success": false,
                    "error": self.message,
                    "details": details
                }),
                None => serde_json::json!({
                    "success": false,
                    "error": self.message
                }),
            }
        };

        (self.status, Json(body)).into_response()
    }
}
