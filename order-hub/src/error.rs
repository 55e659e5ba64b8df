//! Order core error taxonomy
//!
//! `OrderError` is what every intent handler returns. It converts into the
//! client-facing [`AppError`] (stable [`ErrorCode`] + message) exactly once,
//! at the dispatcher boundary, where storage failures are also logged.

use shared::error::{AppError, ErrorCode};
use shared::models::OrderStatus;
use thiserror::Error;

use crate::db::StorageError;
use crate::pricing::PricingError;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error("Invalid table: {0}")]
    InvalidTable(String),

    #[error("Missing customer info: {}", .0.join(", "))]
    MissingCustomerInfo(Vec<&'static str>),

    #[error("Order has no items")]
    OrderEmpty,

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Restaurant not found: {0}")]
    RestaurantNotFound(String),

    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order {order_id} is already {status}")]
    OrderAlreadyFinal {
        order_id: String,
        status: OrderStatus,
    },

    #[error("Audience not found: {0}")]
    AudienceNotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Raised by an auth layer in front of the hub; mapped through untouched
    #[error("Not authenticated")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl OrderError {
    pub fn code(&self) -> ErrorCode {
        match self {
            OrderError::Pricing(PricingError::ItemNotFound(_)) => ErrorCode::ItemNotFound,
            OrderError::Pricing(PricingError::ItemUnavailable(_)) => ErrorCode::ItemUnavailable,
            OrderError::Pricing(PricingError::InvalidQuantity { .. }) => ErrorCode::InvalidQuantity,
            OrderError::Pricing(PricingError::Storage(e)) | OrderError::Storage(e) => {
                storage_code(e)
            }
            OrderError::InvalidTable(_) => ErrorCode::InvalidTable,
            OrderError::MissingCustomerInfo(_) => ErrorCode::MissingCustomerInfo,
            OrderError::OrderEmpty => ErrorCode::OrderEmpty,
            OrderError::OrderNotFound(_) => ErrorCode::OrderNotFound,
            OrderError::RestaurantNotFound(_) => ErrorCode::TenantNotFound,
            OrderError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            OrderError::OrderAlreadyFinal { .. } => ErrorCode::OrderAlreadyFinal,
            OrderError::AudienceNotFound(_) => ErrorCode::AudienceNotFound,
            OrderError::Unauthorized => ErrorCode::NotAuthenticated,
            OrderError::Forbidden(_) => ErrorCode::PermissionDenied,
            OrderError::InvalidRequest(_) => ErrorCode::InvalidRequest,
        }
    }

    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            OrderError::Storage(_) | OrderError::Pricing(PricingError::Storage(_))
        )
    }
}

fn storage_code(e: &StorageError) -> ErrorCode {
    match e {
        StorageError::Conflict { .. } => ErrorCode::StorageConflict,
        StorageError::NotFound { .. } => ErrorCode::NotFound,
        StorageError::Database(_) | StorageError::Corrupt(_) => ErrorCode::DatabaseError,
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        let code = err.code();
        if err.is_storage() {
            tracing::error!(error = %err, error_code = ?code, "Storage error occurred");
            // 技术细节只进日志
            return AppError::new(code);
        }
        tracing::debug!(error = %err, error_code = ?code, "Intent rejected");

        let app = AppError::with_message(code, err.to_string());
        match err {
            OrderError::MissingCustomerInfo(fields) => app.with_detail("missing", fields),
            OrderError::InvalidTransition { from, to } => app
                .with_detail("from", from.as_str())
                .with_detail("to", to.as_str()),
            OrderError::OrderAlreadyFinal { status, .. } => {
                app.with_detail("status", status.as_str())
            }
            _ => app,
        }
    }
}

pub type OrderResult<T> = Result<T, OrderError>;
