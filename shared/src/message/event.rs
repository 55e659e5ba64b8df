//! 服务端事件 (Server → Client)

use serde::{Deserialize, Serialize};

use crate::error::{AppError, ErrorCode};
use crate::models::{Notification, Order, OrderStatus, OrderType};

/// 服务端事件
///
/// 直接回复（`joined_*`, `order_created`, `order_update_success`,
/// `waiter_request_sent`, `*_unread_count`, `error`）只发给发起连接；
/// 其余事件通过房间广播。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    JoinedRestaurant {
        restaurant_id: String,
    },
    JoinedTable {
        qr_code_id: String,
        table_number: String,
    },
    JoinedAdmin {
        admin_id: String,
    },
    JoinedOrder {
        order_id: String,
    },
    /// 下单者的直接确认
    OrderCreated {
        order: Box<Order>,
    },
    /// 广播给 `restaurant:<id>`
    NewOrder {
        order: Box<Order>,
        message: String,
    },
    OrderUpdateSuccess {
        order_id: String,
        status: OrderStatus,
    },
    /// 广播给 `restaurant:<id>`
    OrderUpdated {
        order: Box<Order>,
    },
    /// 广播给顾客侧（桌台 / 外送）
    OrderStatusUpdate {
        order_id: String,
        status: OrderStatus,
        order: Box<Order>,
    },
    WaiterRequestSent,
    WaiterRequest {
        notification: Notification,
        table_number: Option<String>,
        order_type: OrderType,
        message: String,
    },
    /// 非订单来源的通知（如订阅到期）
    Notification {
        notification: Notification,
    },
    RestaurantUnreadCount {
        unread_count: i64,
    },
    AdminUnreadCount {
        unread_count: i64,
    },
    Error {
        code: ErrorCode,
        message: String,
        retryable: bool,
    },
}

impl ServerEvent {
    /// 事件名
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinedRestaurant { .. } => "joined_restaurant",
            Self::JoinedTable { .. } => "joined_table",
            Self::JoinedAdmin { .. } => "joined_admin",
            Self::JoinedOrder { .. } => "joined_order",
            Self::OrderCreated { .. } => "order_created",
            Self::NewOrder { .. } => "new_order",
            Self::OrderUpdateSuccess { .. } => "order_update_success",
            Self::OrderUpdated { .. } => "order_updated",
            Self::OrderStatusUpdate { .. } => "order_status_update",
            Self::WaiterRequestSent => "waiter_request_sent",
            Self::WaiterRequest { .. } => "waiter_request",
            Self::Notification { .. } => "notification",
            Self::RestaurantUnreadCount { .. } => "restaurant_unread_count",
            Self::AdminUnreadCount { .. } => "admin_unread_count",
            Self::Error { .. } => "error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

impl From<&AppError> for ServerEvent {
    fn from(err: &AppError) -> Self {
        Self::Error {
            code: err.code,
            message: err.message.clone(),
            retryable: err.is_retryable(),
        }
    }
}

impl From<AppError> for ServerEvent {
    fn from(err: AppError) -> Self {
        Self::from(&err)
    }
}
