//! 实时消息类型定义
//!
//! 这些类型在 order-hub 和客户端（员工看板、桌台点餐页、外送跟踪页、
//! 平台管理后台）之间共享，JSON 信封格式：
//!
//! ```json
//! { "event": "create_order", "data": { "restaurantId": "r1", ... } }
//! ```
//!
//! - [`ClientIntent`] - 客户端 → 服务端
//! - [`ServerEvent`] - 服务端 → 客户端（直接回复或房间广播）
//! - [`AudienceKey`] - 房间键 (`restaurant:<id>`, `table:<qrCodeId>`, ...)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod event;
pub mod intent;

pub use event::ServerEvent;
pub use intent::{ClientIntent, CreateOrderRequest, OrderItemInput};

/// 房间键 - 一组订阅者的逻辑地址
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AudienceKey {
    /// 餐厅员工看板 (+ 外送跟踪连接)
    Restaurant(String),
    /// 单个桌台的顾客会话
    Table(String),
    /// 平台管理员
    Admin(String),
    /// 单个外送订单的顾客
    Order(String),
}

impl AudienceKey {
    pub fn restaurant(id: impl Into<String>) -> Self {
        Self::Restaurant(id.into())
    }

    pub fn table(qr_code_id: impl Into<String>) -> Self {
        Self::Table(qr_code_id.into())
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self::Admin(id.into())
    }

    pub fn order(id: impl Into<String>) -> Self {
        Self::Order(id.into())
    }

    /// 房间前缀
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Restaurant(_) => "restaurant",
            Self::Table(_) => "table",
            Self::Admin(_) => "admin",
            Self::Order(_) => "order",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Restaurant(id) | Self::Table(id) | Self::Admin(id) | Self::Order(id) => id,
        }
    }
}

impl fmt::Display for AudienceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

/// 无法解析的房间键
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid audience key: {0}")]
pub struct InvalidAudienceKey(pub String);

impl FromStr for AudienceKey {
    type Err = InvalidAudienceKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .filter(|(_, id)| !id.is_empty())
            .ok_or_else(|| InvalidAudienceKey(s.to_string()))?;
        match kind {
            "restaurant" => Ok(Self::restaurant(id)),
            "table" => Ok(Self::table(id)),
            "admin" => Ok(Self::admin(id)),
            "order" => Ok(Self::order(id)),
            _ => Err(InvalidAudienceKey(s.to_string())),
        }
    }
}

impl Serialize for AudienceKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AudienceKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
