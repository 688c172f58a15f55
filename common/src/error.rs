use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::schemas::ErrorBody;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    /// The node has declared itself failed and refuses data-returning calls.
    #[error("node is in failed state")]
    NodeFailed,
    /// A lifecycle operation was requested outside its precondition state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Transport-level failure reaching a node.
    #[error("node unreachable: {0}")]
    Unreachable(String),
    #[error("upstream status {0}")]
    UpstreamStatus(reqwest::StatusCode),
    #[error("unknown node: {0}")]
    UnknownNode(String),
    #[error(transparent)]
    Any(#[from] anyhow::Error),
}

impl ApiError {
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        ApiError::InvalidState(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NodeFailed => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InvalidState(_) => StatusCode::BAD_REQUEST,
            ApiError::UnknownNode(_) => StatusCode::NOT_FOUND,
            ApiError::Unreachable(_) => StatusCode::BAD_GATEWAY,
            ApiError::UpstreamStatus(_) => StatusCode::BAD_GATEWAY,
            ApiError::Any(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            detail: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
