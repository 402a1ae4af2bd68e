//! HTTP-facing error type.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::season::{RolloverError, SeasonError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Season(#[from] SeasonError),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Season(e) if e.is_validation() => StatusCode::BAD_REQUEST,
            AppError::Season(e) if e.is_unauthorized() => StatusCode::FORBIDDEN,
            AppError::Season(SeasonError::NoEligibleSubmissions) => StatusCode::OK,
            AppError::Season(SeasonError::Rollover(RolloverError::SeasonStillActive { .. })) => {
                StatusCode::CONFLICT
            }
            AppError::Season(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "bad_request",
            AppError::Season(e) => e.kind(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            AppError::Season(SeasonError::NoEligibleSubmissions) => json!({
                "ok": false,
                "message": self.to_string(),
            }),
            AppError::Season(SeasonError::Persistence(e)) => {
                tracing::error!("Persistence failure: {}", e);
                json!({
                    "ok": false,
                    "error": "Internal server error",
                    "kind": self.kind(),
                })
            }
            _ => json!({
                "ok": false,
                "error": self.to_string(),
                "kind": self.kind(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;

    #[test]
    fn statuses_follow_error_kind() {
        let cases = vec![
            (AppError::from(SeasonError::AllCategoriesFilled), StatusCode::BAD_REQUEST),
            (AppError::from(SeasonError::InvalidRating { rating: 9 }), StatusCode::BAD_REQUEST),
            (
                AppError::from(SeasonError::Unauthorized { action: "x" }),
                StatusCode::FORBIDDEN,
            ),
            (AppError::from(SeasonError::from(RolloverError::Unauthorized)), StatusCode::FORBIDDEN),
            (AppError::from(SeasonError::NoEligibleSubmissions), StatusCode::OK),
            (
                AppError::from(SeasonError::from(StoreError::Corrupt("bad".to_string()))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (AppError::BadRequest("x".to_string()), StatusCode::BAD_REQUEST),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
