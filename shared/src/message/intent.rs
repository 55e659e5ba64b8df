//! 客户端意图 (Client → Server)

use serde::{Deserialize, Serialize};

use crate::models::{ExtraSelection, OrderStatus, OrderType};

/// 一行点单输入
///
/// 客户端传来的价格只用于显示，服务端定价时从不读取。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemInput {
    pub item_id: String,
    pub quantity: i32,
    #[serde(default)]
    pub selected_extras: Vec<ExtraSelection>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Display-only price echoed by the client
    #[serde(default, rename = "price")]
    pub client_price: Option<f64>,
}

/// `create_order` 载荷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub restaurant_id: String,
    pub order_type: OrderType,
    #[serde(default)]
    pub table_number: Option<String>,
    pub items: Vec<OrderItemInput>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub customer_address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// 客户端意图
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ClientIntent {
    JoinRestaurant {
        restaurant_id: String,
    },
    LeaveRestaurant {
        restaurant_id: String,
    },
    JoinTable {
        qr_code_id: String,
    },
    LeaveTable {
        qr_code_id: String,
    },
    JoinAdmin {
        admin_id: String,
    },
    LeaveAdmin {
        admin_id: String,
    },
    /// 外送顾客订阅单个订单
    JoinOrder {
        order_id: String,
        customer_phone: String,
    },
    CreateOrder(CreateOrderRequest),
    UpdateOrderStatus {
        order_id: String,
        status: OrderStatus,
        restaurant_id: String,
    },
    RequestWaiter {
        restaurant_id: String,
        #[serde(default)]
        table_number: Option<String>,
        order_type: OrderType,
    },
    GetRestaurantUnreadCount {
        restaurant_id: String,
    },
    GetAdminUnreadCount {
        admin_id: String,
    },
}

impl ClientIntent {
    /// 事件名（用于日志）
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinRestaurant { .. } => "join_restaurant",
            Self::LeaveRestaurant { .. } => "leave_restaurant",
            Self::JoinTable { .. } => "join_table",
            Self::LeaveTable { .. } => "leave_table",
            Self::JoinAdmin { .. } => "join_admin",
            Self::LeaveAdmin { .. } => "leave_admin",
            Self::JoinOrder { .. } => "join_order",
            Self::CreateOrder(_) => "create_order",
            Self::UpdateOrderStatus { .. } => "update_order_status",
            Self::RequestWaiter { .. } => "request_waiter",
            Self::GetRestaurantUnreadCount { .. } => "get_restaurant_unread_count",
            Self::GetAdminUnreadCount { .. } => "get_admin_unread_count",
        }
    }
}
