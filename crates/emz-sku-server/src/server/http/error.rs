use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

pub type Result<T> = core::result::Result<T, ApiError>;

/// Error returned by HTTP handlers. Serialized as `{ "error", "code" }`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Sku(#[from] emz_sku::Error),

    #[error("no counter exists for prefix `{prefix}`")]
    CounterNotFound { prefix: String },
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    code: &'a str,
}

/// Stable machine-readable code for an error kind.
pub fn error_code(err: &emz_sku::Error) -> &'static str {
    match err {
        emz_sku::Error::Validation { .. } => "validation",
        emz_sku::Error::StorageUnavailable { .. } => "storage_unavailable",
        emz_sku::Error::AllocationTimedOut { .. } => "allocation_timed_out",
        emz_sku::Error::InvariantViolation { .. } => "invariant_violation",
        emz_sku::Error::ItemNotFound { .. } => "not_found",
        _ => "internal",
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::CounterNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Sku(err) => match err {
                emz_sku::Error::Validation { .. } => StatusCode::BAD_REQUEST,
                emz_sku::Error::ItemNotFound { .. } => StatusCode::NOT_FOUND,
                emz_sku::Error::StorageUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                emz_sku::Error::AllocationTimedOut { .. } => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::CounterNotFound { .. } => "not_found",
            Self::Sku(err) => error_code(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "request failed");
        }
        let body = ErrorBody {
            error: self.to_string(),
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}
