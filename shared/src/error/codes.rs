//! Unified error codes for the ordering platform
//!
//! Error codes are stable across server releases; clients branch on the
//! numeric value, never on the message. Codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 3xxx: Tenant / audience errors
//! - 4xxx: Order errors
//! - 6xxx: Catalog item errors
//! - 7xxx: Table errors
//! - 8xxx: Notification errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request (malformed intent, unknown event name)
    InvalidRequest = 5,
    /// Required field missing
    RequiredField = 7,

    // ==================== 1xxx: Auth ====================
    /// User is not authenticated
    NotAuthenticated = 1001,
    /// Token has expired
    TokenExpired = 1003,
    /// Token is invalid
    TokenInvalid = 1004,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,

    // ==================== 3xxx: Tenant ====================
    /// Tenant (restaurant) not found
    TenantNotFound = 3002,
    /// Audience resource does not exist or belongs to another tenant
    AudienceNotFound = 3022,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order has no lines
    OrderEmpty = 4007,
    /// Delivery order without customer contact
    MissingCustomerInfo = 4008,
    /// Requested status is not a valid successor of the current status
    InvalidTransition = 4009,
    /// Order is COMPLETED or CANCELLED
    OrderAlreadyFinal = 4010,

    // ==================== 6xxx: Catalog ====================
    /// Catalog item not found for this tenant
    ItemNotFound = 6001,
    /// Catalog item exists but is not available
    ItemUnavailable = 6002,
    /// Line quantity below 1
    InvalidQuantity = 6003,

    // ==================== 7xxx: Table ====================
    /// Table session missing, inactive, or owned by another tenant
    InvalidTable = 7001,

    // ==================== 8xxx: Notification ====================
    /// Notification not found
    NotificationNotFound = 8001,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Storage failure (retryable)
    DatabaseError = 9002,
    /// Storage detected a concurrent write (retryable)
    StorageConflict = 9003,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Whether the client may resubmit the same intent
    #[inline]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::DatabaseError | ErrorCode::StorageConflict)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::RequiredField => "Required field is missing",

            // Auth
            ErrorCode::NotAuthenticated => "User is not authenticated",
            ErrorCode::TokenExpired => "Authentication token has expired",
            ErrorCode::TokenInvalid => "Authentication token is invalid",

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",

            // Tenant
            ErrorCode::TenantNotFound => "Restaurant not found",
            ErrorCode::AudienceNotFound => "Audience not found",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderEmpty => "Order has no items",
            ErrorCode::MissingCustomerInfo => "Delivery orders require customer contact details",
            ErrorCode::InvalidTransition => "Invalid order status transition",
            ErrorCode::OrderAlreadyFinal => "Order is already completed or cancelled",

            // Catalog
            ErrorCode::ItemNotFound => "Menu item not found",
            ErrorCode::ItemUnavailable => "Menu item is not available",
            ErrorCode::InvalidQuantity => "Quantity must be at least 1",

            // Table
            ErrorCode::InvalidTable => "Table not found or inactive",

            // Notification
            ErrorCode::NotificationNotFound => "Notification not found",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Storage error, please retry",
            ErrorCode::StorageConflict => "Concurrent update detected, please retry",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            7 => Ok(ErrorCode::RequiredField),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1003 => Ok(ErrorCode::TokenExpired),
            1004 => Ok(ErrorCode::TokenInvalid),

            // Permission
            2001 => Ok(ErrorCode::PermissionDenied),

            // Tenant
            3002 => Ok(ErrorCode::TenantNotFound),
            3022 => Ok(ErrorCode::AudienceNotFound),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4007 => Ok(ErrorCode::OrderEmpty),
            4008 => Ok(ErrorCode::MissingCustomerInfo),
            4009 => Ok(ErrorCode::InvalidTransition),
            4010 => Ok(ErrorCode::OrderAlreadyFinal),

            // Catalog
            6001 => Ok(ErrorCode::ItemNotFound),
            6002 => Ok(ErrorCode::ItemUnavailable),
            6003 => Ok(ErrorCode::InvalidQuantity),

            // Table
            7001 => Ok(ErrorCode::InvalidTable),

            // Notification
            8001 => Ok(ErrorCode::NotificationNotFound),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::StorageConflict),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
