use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EdgeError {
    #[error("Origin server error: {0}")]
    OriginError(String),

    #[error("Origin server unreachable: {0}")]
    OriginUnreachable(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl EdgeError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            EdgeError::OriginError(_) => StatusCode::BAD_GATEWAY,
            EdgeError::OriginUnreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
            EdgeError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            EdgeError::ConfigError(_) | EdgeError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for EdgeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            EdgeError::OriginError(msg)
            | EdgeError::OriginUnreachable(msg)
            | EdgeError::InvalidRequest(msg)
            | EdgeError::ConfigError(msg)
            | EdgeError::Internal(msg) => msg,
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<reqwest::Error> for EdgeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            EdgeError::OriginUnreachable(err.to_string())
        } else if err.is_timeout() {
            EdgeError::OriginUnreachable(format!("Origin timeout: {}", err))
        } else {
            EdgeError::OriginError(err.to_string())
        }
    }
}

pub type EdgeResult<T> = Result<T, EdgeError>;
