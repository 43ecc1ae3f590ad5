//! HTTP error mapping.

use axum::Json;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use crate::error::CldError;

/// A core error rendered as `{"error": "..."}` with a matching status.
#[derive(Debug)]
pub struct ApiError(pub CldError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            CldError::LayoutNotFound { .. } => StatusCode::NOT_FOUND,
            e if e.is_validation() => StatusCode::BAD_REQUEST,
            CldError::Extraction(_) | CldError::ImportSource { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CldError> for ApiError {
    fn from(e: CldError) -> Self {
        Self(e)
    }
}

/// Extractor rejections map to `InvalidPayload`.
macro_rules! invalid_payload_from {
    ($($rejection:ty),+) => {
        $(impl From<$rejection> for ApiError {
            fn from(rejection: $rejection) -> Self {
                Self(CldError::InvalidPayload(rejection.body_text()))
            }
        })+
    };
}

invalid_payload_from!(JsonRejection, FormRejection, MultipartRejection);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
