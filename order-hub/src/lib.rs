//! order-hub — 实时点餐中心
//!
//! 顾客扫码点餐、员工推进订单状态、管理员接收系统通知，全部走同一条
//! WebSocket 通道：
//!
//! - [`pricing`]: 服务端定价（从不信任客户端价格）
//! - [`orders`]: 建单 + 状态机
//! - [`live`]: 房间注册表与广播
//! - [`dispatch`]: 意图 → 校验 → 委托 → 提交后广播
//! - [`notifications`]: 通知落库与未读计数推送

pub mod api;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod live;
pub mod logger;
pub mod notifications;
pub mod orders;
pub mod pricing;
pub mod state;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use state::AppState;
