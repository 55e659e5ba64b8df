//! Data models
//!
//! Shared between the order hub and its clients (via WebSocket / HTTP).
//! All IDs are opaque strings; money is `rust_decimal::Decimal`
//! serialized as JSON numbers.

pub mod catalog;
pub mod notification;
pub mod order;
pub mod table;

// Re-exports
pub use catalog::*;
pub use notification::*;
pub use order::*;
pub use table::*;
