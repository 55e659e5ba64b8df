//! Table Session Model (桌台二维码)

use serde::{Deserialize, Serialize};

/// Table session reached through a QR code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSession {
    /// QR code id
    pub id: String,
    pub restaurant_id: String,
    pub table_number: String,
    pub is_active: bool,
}
