//! Order Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ExtraSelection;

/// How the order reaches the customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    /// 堂食 - bound to a table session
    DineIn,
    /// 外送 - bound to customer contact details
    Delivery,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DineIn => "DINE_IN",
            Self::Delivery => "DELIVERY",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "DINE_IN" => Some(Self::DineIn),
            "DELIVERY" => Some(Self::Delivery),
            _ => None,
        }
    }
}

/// Order status
///
/// ```text
/// PENDING → PREPARING → READY → COMPLETED
///    └──────────┴─────────┴───→ CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Preparing,
    Ready,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// COMPLETED and CANCELLED accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// The single forward successor, `None` for terminal states
    pub fn successor(&self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Preparing),
            Self::Preparing => Some(Self::Ready),
            Self::Ready => Some(Self::Completed),
            Self::Completed | Self::Cancelled => None,
        }
    }

    /// Whether `next` is reachable from `self` in one step
    pub fn can_transition_to(&self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == Self::Cancelled || self.successor() == Some(next)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Preparing => "PREPARING",
            Self::Ready => "READY",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(Self::Pending),
            "PREPARING" => Some(Self::Preparing),
            "READY" => Some(Self::Ready),
            "COMPLETED" => Some(Self::Completed),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Customer contact (required for delivery orders)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub name: String,
    pub phone: String,
    pub address: String,
}

/// Order line with server-resolved prices
///
/// `unit_price` is the catalog price after the item discount;
/// `line_total = (unit_price + extras_price) × quantity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub id: String,
    pub order_id: String,
    pub item_id: String,
    pub item_name: String,
    pub quantity: i32,
    /// Catalog price before discount
    #[serde(with = "rust_decimal::serde::float")]
    pub base_price: Decimal,
    /// Price after discount
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    /// Sum of the resolved extras, per unit
    #[serde(with = "rust_decimal::serde::float")]
    pub extras_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub line_total: Decimal,
    /// Customer notes plus the rendered extras summary
    pub notes: Option<String>,
    pub selected_extras: Vec<ExtraSelection>,
}

/// Order entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub restaurant_id: String,
    pub order_type: OrderType,
    /// QR code id of the table session (DINE_IN only)
    pub table_session_id: Option<String>,
    pub table_number: Option<String>,
    pub status: OrderStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    pub currency: String,
    pub customer: Option<CustomerInfo>,
    pub notes: Option<String>,
    pub lines: Vec<OrderLine>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Order {
    /// Sum of line totals (the persisted `total_price` must equal this)
    pub fn lines_total(&self) -> Decimal {
        self.lines.iter().map(|l| l.line_total).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_chain_only() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Preparing));
        assert!(OrderStatus::Preparing.can_transition_to(OrderStatus::Ready));
        assert!(OrderStatus::Ready.can_transition_to(OrderStatus::Completed));

        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Ready));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Completed));
        assert!(!OrderStatus::Ready.can_transition_to(OrderStatus::Preparing));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn cancel_from_any_non_terminal() {
        for s in [
            OrderStatus::Pending,
            OrderStatus::Preparing,
            OrderStatus::Ready,
        ] {
            assert!(s.can_transition_to(OrderStatus::Cancelled), "{s}");
        }
        assert!(!OrderStatus::Completed.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn status_wire_format() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Preparing).unwrap(),
            "\"PREPARING\""
        );
        assert_eq!(
            serde_json::from_str::<OrderType>("\"DINE_IN\"").unwrap(),
            OrderType::DineIn
        );
        for s in [
            OrderStatus::Pending,
            OrderStatus::Preparing,
            OrderStatus::Ready,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(OrderStatus::parse("SERVED"), None);
    }
}
