//! Crate-wide error taxonomy.
//!
//! Mirrors the kinds in the design doc's error handling section: validation
//! failures never mutate a book, unknown-symbol is only ever raised by the
//! quote path, overloaded/transport are absorbed at the bus and gateway
//! boundaries respectively, and internal marks an invariant violation that
//! must halt the offending per-symbol matching task rather than be papered
//! over.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),

    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("subscriber {subscriber} on channel {channel} fell behind")]
    Overloaded { channel: String, subscriber: u64 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("internal invariant violation: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::UnknownSymbol(_) => StatusCode::NOT_FOUND,
            EngineError::Overloaded { .. } => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Transport(_) => StatusCode::BAD_GATEWAY,
            EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        match &self {
            EngineError::Validation(msg) => {
                tracing::debug!(error = %msg, "rejected submission");
            }
            EngineError::Overloaded { channel, subscriber } => {
                tracing::warn!(channel, subscriber, "subscriber overloaded");
            }
            EngineError::Transport(msg) => {
                tracing::warn!(error = %msg, "transport error absorbed at gateway");
            }
            EngineError::Internal(msg) => {
                tracing::error!(error = %msg, "invariant violation");
            }
            EngineError::UnknownSymbol(_) => {}
        }
        let status = self.status();
        let body = ErrorBody {
            success: false,
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
