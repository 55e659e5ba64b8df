//! Notification Model

use serde::{Deserialize, Serialize};

/// 通知类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    /// 呼叫服务员
    WaiterRequest,
    /// 新订单
    NewOrder,
    /// 订阅即将到期
    SubscriptionExpiring,
    /// 订阅已到期
    SubscriptionExpired,
    /// 系统通知
    System,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WaiterRequest => "WAITER_REQUEST",
            Self::NewOrder => "NEW_ORDER",
            Self::SubscriptionExpiring => "SUBSCRIPTION_EXPIRING",
            Self::SubscriptionExpired => "SUBSCRIPTION_EXPIRED",
            Self::System => "SYSTEM",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "WAITER_REQUEST" => Some(Self::WaiterRequest),
            "NEW_ORDER" => Some(Self::NewOrder),
            "SUBSCRIPTION_EXPIRING" => Some(Self::SubscriptionExpiring),
            "SUBSCRIPTION_EXPIRED" => Some(Self::SubscriptionExpired),
            "SYSTEM" => Some(Self::System),
            _ => None,
        }
    }
}

/// Who a notification is addressed to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum NotificationTarget {
    Restaurant(String),
    Admin(String),
}

/// Persisted notification row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub target: NotificationTarget,
    pub notification_type: NotificationType,
    pub title: String,
    pub body: String,
    pub is_read: bool,
    pub created_at: i64,
}
