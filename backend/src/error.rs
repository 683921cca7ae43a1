use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lottery_shared::{ErrorKind, LotteryError};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Lottery(#[from] LotteryError),

    #[error("Invalid request: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Unknown or expired session")]
    UnknownSession,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Lottery(e) => match e.kind() {
                ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::AlreadyConsumed
                | ErrorKind::AlreadyExists
                | ErrorKind::ConcurrentRedemptionConflict
                | ErrorKind::SpinInProgress
                | ErrorKind::InvalidSessionState => StatusCode::CONFLICT,
                ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                ErrorKind::CapacityExhausted => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::PersistenceError => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::UnknownSession => StatusCode::NOT_FOUND,
        }
    }

    fn kind(&self) -> ErrorKind {
        match self {
            Self::Lottery(e) => e.kind(),
            Self::Validation(_) => ErrorKind::InvalidInput,
            Self::UnknownSession => ErrorKind::InvalidSessionState,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {}", self);
        }

        (status, Json(json!({ "error": self.to_string(), "kind": self.kind() }))).into_response()
    }
}
