use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("order not found")]
    NotFound,

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("ledger unavailable")]
    LedgerClosed,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Storage { .. } | AppError::Encode { .. } | AppError::LedgerClosed => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, self.to_string()).into_response()
    }
}
