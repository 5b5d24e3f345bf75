use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;

use crate::GalleryError;

impl GalleryError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::PaymentNotCompleted(_) => StatusCode::PAYMENT_REQUIRED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidTransition(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Gateway(_) => StatusCode::BAD_GATEWAY,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Unauthorized => "unauthorized",
            Self::PaymentNotCompleted(_) => "payment_not_completed",
            Self::NotFound(_) => "not_found",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::Conflict(_) => "conflict",
            Self::Gateway(_) => "payment_provider_unavailable",
            Self::Storage(_) => "internal_error",
        }
    }

    /// Client-facing text; dependency failures never leak their details.
    fn public_message(&self) -> String {
        match self {
            Self::Gateway(_) => "The payment provider is unavailable, please try again later".to_string(),
            Self::Storage(_) => "Something went wrong, please try again later".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for GalleryError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(application_error = %self, "Responding with error");
        } else {
            tracing::info!(application_error = %self, status = status.as_u16(), "Request rejected");
        }
        (status, Json(json!({"error": self.kind(), "message": self.public_message()}))).into_response()
    }
}
