use crate::models::ApiError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use sea_orm::DbErr;
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Stable failure kinds of a draw. These strings end up in logs and in the
/// `failure_kind` column of the draw history, so they must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawFailureKind {
    InsufficientFunds,
    NoEligibleItems,
    MisconfiguredPool,
    InternalError,
}

impl DrawFailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DrawFailureKind::InsufficientFunds => "insufficient_funds",
            DrawFailureKind::NoEligibleItems => "no_eligible_items",
            DrawFailureKind::MisconfiguredPool => "misconfigured_pool",
            DrawFailureKind::InternalError => "internal_error",
        }
    }

    /// Error code used in the JSON error envelope
    pub fn code(&self) -> &'static str {
        match self {
            DrawFailureKind::InsufficientFunds => "INSUFFICIENT_FUNDS",
            DrawFailureKind::NoEligibleItems => "NO_ELIGIBLE_ITEMS",
            DrawFailureKind::MisconfiguredPool => "MISCONFIGURED_POOL",
            DrawFailureKind::InternalError => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            DrawFailureKind::InsufficientFunds => StatusCode::PAYMENT_REQUIRED,
            DrawFailureKind::NoEligibleItems => StatusCode::NOT_FOUND,
            DrawFailureKind::MisconfiguredPool | DrawFailureKind::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl std::fmt::Display for DrawFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to the debited currency when a draw failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundState {
    /// Nothing was debited (pure rejection).
    NotDebited,
    /// The debit was credited back.
    Refunded,
    /// The debit could not be credited back; needs manual reconciliation.
    RefundFailed,
}

impl RefundState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundState::NotDebited => "rejected",
            RefundState::Refunded => "refunded",
            RefundState::RefundFailed => "refund_failed",
        }
    }
}

#[derive(Error, Debug)]
#[error("{kind}: {detail}")]
pub struct DrawError {
    pub kind: DrawFailureKind,
    pub detail: String,
    pub refund: RefundState,
}

impl DrawError {
    pub fn rejected(kind: DrawFailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            refund: RefundState::NotDebited,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("External API error: {0}")]
    ExternalApiError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Draw failed: {0}")]
    DrawFailed(#[from] DrawError),

    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ExternalApiError(_) => StatusCode::BAD_GATEWAY,
            AppError::DrawFailed(e) => e.kind.status_code(),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        let (error_code, message) = match self {
            AppError::ValidationError(msg) => {
                log::warn!("Validation error: {msg}");
                ("VALIDATION_ERROR", msg.clone())
            }
            AppError::NotFound(msg) => ("NOT_FOUND", msg.clone()),
            AppError::ExternalApiError(msg) => {
                log::error!("External API error: {msg}");
                ("EXTERNAL_API_ERROR", msg.clone())
            }
            AppError::DatabaseError(err) => {
                log::error!("Database error: {err}");
                ("DATABASE_ERROR", "Database error".to_string())
            }
            AppError::DrawFailed(err) => {
                // 余额不足是正常业务拒绝, 其它均为已扣款后的失败
                if err.kind == DrawFailureKind::InsufficientFunds {
                    log::info!("Draw rejected: kind={} {}", err.kind, err.detail);
                } else {
                    log::error!(
                        "Draw failed: kind={} refund={} {}",
                        err.kind,
                        err.refund.as_str(),
                        err.detail
                    );
                }
                return HttpResponse::build(status_code).json(json!({
                    "success": false,
                    "status": err.refund.as_str(),
                    "error": ApiError {
                        code: err.kind.code().to_string(),
                        message: err.detail.clone(),
                    }
                }));
            }
            _ => {
                log::error!("Internal error: {self}");
                ("INTERNAL_ERROR", "Internal server error".to_string())
            }
        };

        HttpResponse::build(status_code).json(json!({
            "success": false,
            "error": ApiError {
                code: error_code.to_string(),
                message,
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_failure_status_classes() {
        let cases = [
            (DrawFailureKind::InsufficientFunds, StatusCode::PAYMENT_REQUIRED),
            (DrawFailureKind::NoEligibleItems, StatusCode::NOT_FOUND),
            (DrawFailureKind::MisconfiguredPool, StatusCode::INTERNAL_SERVER_ERROR),
            (DrawFailureKind::InternalError, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (kind, status) in cases {
            let err = AppError::from(DrawError::rejected(kind, "x"));
            assert_eq!(err.status_code(), status);
            assert_eq!(err.error_response().status(), status);
        }
    }

    #[test]
    fn test_validation_is_client_error() {
        let err = AppError::ValidationError("cost must be positive".into());
        assert_eq!(err.error_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_kind_strings_are_stable() {
        assert_eq!(DrawFailureKind::InsufficientFunds.as_str(), "insufficient_funds");
        assert_eq!(DrawFailureKind::MisconfiguredPool.to_string(), "misconfigured_pool");
        assert_eq!(RefundState::Refunded.as_str(), "refunded");
    }
}
