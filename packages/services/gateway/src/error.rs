//! Gateway 에러 타입

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Gateway 에러
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("bad request: {message}")]
    BadRequest { message: String },

    #[error("forbidden: {message}")]
    Forbidden { message: String },

    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("core error: {0}")]
    Core(#[from] gk_core::Error),
}

/// 에러 응답 JSON
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            GatewayError::BadRequest { message } => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", message.clone(), None)
            }
            GatewayError::Forbidden { message } => {
                (StatusCode::FORBIDDEN, "FORBIDDEN", message.clone(), None)
            }
            GatewayError::NotFound { message } => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", message.clone(), None)
            }
            GatewayError::Core(e) => {
                // 필드별 검증 메시지는 details로 내려준다
                let details = match e {
                    gk_core::Error::Validation { errors } => {
                        serde_json::to_value(errors).ok()
                    }
                    _ => None,
                };
                let status = StatusCode::from_u16(e.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, e.code(), e.to_string(), details)
            }
        };

        if status.is_server_error() {
            tracing::error!("request failed: {:?}", self);
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
                request_id: crate::middleware::current_request_id(),
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
