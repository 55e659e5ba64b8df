//! Shared types for the ordering platform
//!
//! Common types used by the order hub and its clients: error codes,
//! domain models, and the real-time message envelope.

pub mod error;
pub mod message;
pub mod models;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use message::{AudienceKey, ClientIntent, ServerEvent};
