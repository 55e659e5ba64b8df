//! Unified error system for the ordering platform
//!
//! This module provides the error vocabulary shared by the server and clients:
//! - [`ErrorCode`]: Standardized error codes for all error types
//! - [`AppError`]: Rich error type with codes, messages, and details
//!
//! # Error Code Ranges
//!
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 3xxx: Tenant / audience errors
//! - 4xxx: Order errors
//! - 6xxx: Catalog errors
//! - 7xxx: Table errors
//! - 8xxx: Notification errors
//! - 9xxx: System errors
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorCode};
//!
//! let err = AppError::new(ErrorCode::InvalidTable);
//! let err = AppError::with_message(ErrorCode::ItemNotFound, "Menu item 42 not found")
//!     .with_detail("item_id", "42");
//!
//! assert_eq!(err.code.code(), 6001);
//! assert!(!err.is_retryable());
//! ```

mod codes;
mod types;

pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::AppError;
