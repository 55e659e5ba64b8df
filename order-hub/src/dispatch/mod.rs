//! Order Event Dispatcher
//!
//! 每个客户端意图：校验 → 委托 → 提交后广播。
//!
//! 处理分两步：
//! 1. [`OrderEventDispatcher::handle`] 执行业务并返回 [`Outcome`]
//!    （直接回复 + 待广播列表 + 需要刷新的未读计数），不做任何分发；
//! 2. [`OrderEventDispatcher::dispatch`] 在 `handle` 成功返回（即已提交）之后
//!    才发送回复和广播。失败只回复给发起连接一个 `error` 事件。
//!
//! # 路由规则
//!
//! | 意图 | 直接回复 | 广播 |
//! |------|---------|------|
//! | create_order | order_created | new_order → restaurant |
//! | update_order_status | order_update_success | order_updated → restaurant; order_status_update → table / order (+ restaurant for delivery) |
//! | request_waiter | waiter_request_sent | waiter_request → restaurant, then restaurant_unread_count |
//! | get_*_unread_count | *_unread_count | - |

use dashmap::DashMap;
use shared::error::AppError;
use shared::message::{AudienceKey, ClientIntent, CreateOrderRequest, ServerEvent};
use shared::models::{NotificationTarget, NotificationType, Order, OrderStatus, OrderType};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::db::OrderStore;
use crate::error::{OrderError, OrderResult};
use crate::live::{ConnectionId, Outbound, SessionRegistry};
use crate::notifications::{NotificationCounter, NotificationService};
use crate::orders::OrderManager;

/// 每个订单一把异步锁，空闲时移除
#[derive(Clone, Default)]
struct OrderLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

struct OrderLockGuard {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    order_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl OrderLocks {
    async fn lock(&self, order_id: &str) -> OrderLockGuard {
        let mutex = self.locks.entry(order_id.to_string()).or_default().clone();
        OrderLockGuard {
            locks: self.locks.clone(),
            order_id: order_id.to_string(),
            guard: Some(mutex.lock_owned().await),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.len()
    }
}

impl Drop for OrderLockGuard {
    fn drop(&mut self) {
        self.guard.take();
        // 只剩 map 自己持有时才移除
        self.locks
            .remove_if(&self.order_id, |_, m| Arc::strong_count(m) == 1);
    }
}

/// Broadcast routing switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingConfig {
    /// 外送订单的 `order_status_update` 也发给整个餐厅房间
    pub delivery_status_to_restaurant: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            delivery_status_to_restaurant: true,
        }
    }
}

/// Result of one handled intent, emitted only after the handler returned
#[derive(Debug, Default, PartialEq)]
pub struct Outcome {
    pub reply: Option<ServerEvent>,
    pub broadcasts: Vec<(AudienceKey, ServerEvent)>,
    /// Audiences whose unread count must be re-pushed
    pub counts_changed: Vec<AudienceKey>,
}

impl Outcome {
    fn reply(event: ServerEvent) -> Self {
        Self {
            reply: Some(event),
            ..Default::default()
        }
    }

    fn silent() -> Self {
        Self::default()
    }
}

#[derive(Clone)]
pub struct OrderEventDispatcher {
    store: Arc<dyn OrderStore>,
    orders: OrderManager,
    registry: SessionRegistry,
    notifications: NotificationService,
    routing: RoutingConfig,
    order_locks: OrderLocks,
}

impl OrderEventDispatcher {
    pub fn new(
        store: Arc<dyn OrderStore>,
        orders: OrderManager,
        registry: SessionRegistry,
        notifications: NotificationService,
        routing: RoutingConfig,
    ) -> Self {
        Self {
            store,
            orders,
            registry,
            notifications,
            routing,
            order_locks: OrderLocks::default(),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    fn counter(&self) -> &NotificationCounter {
        self.notifications.counter()
    }

    /// Handle one intent from `conn` and deliver its results
    ///
    /// Never fails: errors become a direct `error` reply to `conn` only.
    /// Status updates of one order are serialized from commit through
    /// broadcast, so every audience sees them in commit order.
    pub async fn dispatch(&self, conn: ConnectionId, intent: ClientIntent) {
        let name = intent.name();
        tracing::debug!(conn_id = %conn, intent = name, "Intent received");

        let order_guard = match &intent {
            ClientIntent::UpdateOrderStatus { order_id, .. } => {
                Some(self.order_locks.lock(order_id).await)
            }
            _ => None,
        };

        let outcome = match self.handle(conn, intent).await {
            Ok(outcome) => outcome,
            Err(err) => {
                if !err.is_storage() {
                    tracing::warn!(conn_id = %conn, intent = name, error = %err, "Intent rejected");
                }
                Outcome::reply(ServerEvent::from(&AppError::from(err)))
            }
        };
        let pending_reply = self.emit(conn, outcome).await;
        drop(order_guard);

        // 发起方队列已满：广播已发出，这里再等待回复入队
        if let Some(reply) = pending_reply {
            self.registry.send_outbound(conn, reply).await;
        }
    }

    /// Direct `error` reply (also used by the transport for malformed frames)
    pub async fn reject(&self, conn: ConnectionId, err: AppError) {
        self.registry.send_to(conn, ServerEvent::from(&err)).await;
    }

    /// Reply (if it fits), broadcasts, then unread-count pushes
    ///
    /// Nothing here waits on a client queue. A reply that does not fit is
    /// handed back and sent after the broadcasts.
    async fn emit(&self, conn: ConnectionId, outcome: Outcome) -> Option<Outbound> {
        let Outcome {
            reply,
            broadcasts,
            counts_changed,
        } = outcome;

        let pending = reply.and_then(|reply| self.registry.try_send_to(conn, reply).err());
        for (key, event) in broadcasts {
            self.registry.broadcast(&key, event);
        }
        for key in counts_changed {
            if let Err(e) = self.counter().mark_changed(&key).await {
                tracing::warn!(audience = %key, error = %e, "Failed to push unread count");
            }
        }
        pending
    }

    /// Run the business part of an intent; nothing is sent from here
    pub async fn handle(&self, conn: ConnectionId, intent: ClientIntent) -> OrderResult<Outcome> {
        match intent {
            ClientIntent::JoinRestaurant { restaurant_id } => {
                let key = AudienceKey::restaurant(restaurant_id.as_str());
                if !self.store.restaurant_exists(&restaurant_id).await? {
                    return Err(OrderError::AudienceNotFound(key.to_string()));
                }
                self.join(conn, key)?;
                Ok(Outcome::reply(ServerEvent::JoinedRestaurant { restaurant_id }))
            }
            ClientIntent::LeaveRestaurant { restaurant_id } => {
                self.registry
                    .leave(conn, &AudienceKey::restaurant(restaurant_id));
                Ok(Outcome::silent())
            }
            ClientIntent::JoinTable { qr_code_id } => {
                let key = AudienceKey::table(qr_code_id.as_str());
                let session = self
                    .store
                    .find_table_session(&qr_code_id)
                    .await?
                    .filter(|t| t.is_active)
                    .ok_or_else(|| OrderError::AudienceNotFound(key.to_string()))?;
                self.join(conn, key)?;
                Ok(Outcome::reply(ServerEvent::JoinedTable {
                    qr_code_id,
                    table_number: session.table_number,
                }))
            }
            ClientIntent::LeaveTable { qr_code_id } => {
                self.registry.leave(conn, &AudienceKey::table(qr_code_id));
                Ok(Outcome::silent())
            }
            ClientIntent::JoinAdmin { admin_id } => {
                let key = AudienceKey::admin(admin_id.as_str());
                if !self.store.admin_exists(&admin_id).await? {
                    return Err(OrderError::AudienceNotFound(key.to_string()));
                }
                self.join(conn, key)?;
                Ok(Outcome::reply(ServerEvent::JoinedAdmin { admin_id }))
            }
            ClientIntent::LeaveAdmin { admin_id } => {
                self.registry.leave(conn, &AudienceKey::admin(admin_id));
                Ok(Outcome::silent())
            }
            ClientIntent::JoinOrder {
                order_id,
                customer_phone,
            } => self.join_order(conn, order_id, &customer_phone).await,
            ClientIntent::CreateOrder(req) => self.create_order(&req).await,
            ClientIntent::UpdateOrderStatus {
                order_id,
                status,
                restaurant_id,
            } => self.update_status(&restaurant_id, &order_id, status).await,
            ClientIntent::RequestWaiter {
                restaurant_id,
                table_number,
                order_type,
            } => {
                self.request_waiter(restaurant_id, table_number, order_type)
                    .await
            }
            ClientIntent::GetRestaurantUnreadCount { restaurant_id } => {
                let unread_count = self
                    .counter()
                    .unread_count_for_restaurant(&restaurant_id)
                    .await?;
                Ok(Outcome::reply(ServerEvent::RestaurantUnreadCount {
                    unread_count,
                }))
            }
            ClientIntent::GetAdminUnreadCount { admin_id } => {
                let unread_count = self.counter().unread_count_for_admin(&admin_id).await?;
                Ok(Outcome::reply(ServerEvent::AdminUnreadCount { unread_count }))
            }
        }
    }

    fn join(&self, conn: ConnectionId, key: AudienceKey) -> OrderResult<()> {
        if !self.registry.join(conn, key.clone()) {
            tracing::warn!(conn_id = %conn, audience = %key, "Join from unregistered connection");
            return Err(OrderError::InvalidRequest(format!(
                "connection {conn} is not registered"
            )));
        }
        tracing::debug!(conn_id = %conn, audience = %key, "Joined audience");
        Ok(())
    }

    /// Delivery customers follow one order, proven by the order's contact phone
    async fn join_order(
        &self,
        conn: ConnectionId,
        order_id: String,
        customer_phone: &str,
    ) -> OrderResult<Outcome> {
        let key = AudienceKey::order(order_id.as_str());
        let phone = normalize_phone(customer_phone);
        let order = self
            .store
            .find_order(&order_id)
            .await?
            .filter(|o| o.order_type == OrderType::Delivery)
            .filter(|o| {
                !phone.is_empty()
                    && o.customer
                        .as_ref()
                        .is_some_and(|c| normalize_phone(&c.phone) == phone)
            })
            .ok_or_else(|| OrderError::AudienceNotFound(key.to_string()))?;

        self.join(conn, key)?;
        Ok(Outcome::reply(ServerEvent::JoinedOrder { order_id: order.id }))
    }

    async fn create_order(&self, req: &CreateOrderRequest) -> OrderResult<Outcome> {
        let order = self.orders.create_order(req).await?;
        tracing::info!(
            order_id = %order.id,
            restaurant_id = %order.restaurant_id,
            lines = order.lines.len(),
            total = %order.total_price,
            "Order created"
        );

        let restaurant = AudienceKey::restaurant(order.restaurant_id.as_str());
        let message = new_order_message(&order);
        let order = Box::new(order);
        Ok(Outcome {
            reply: Some(ServerEvent::OrderCreated {
                order: order.clone(),
            }),
            broadcasts: vec![(restaurant, ServerEvent::NewOrder { order, message })],
            counts_changed: vec![],
        })
    }

    async fn update_status(
        &self,
        restaurant_id: &str,
        order_id: &str,
        next: OrderStatus,
    ) -> OrderResult<Outcome> {
        let order = self.orders.transition(restaurant_id, order_id, next).await?;
        tracing::info!(
            order_id = %order.id,
            restaurant_id = %order.restaurant_id,
            status = %order.status,
            "Order status updated"
        );

        Ok(Outcome {
            reply: Some(ServerEvent::OrderUpdateSuccess {
                order_id: order.id.clone(),
                status: order.status,
            }),
            broadcasts: status_broadcasts(&order, self.routing),
            counts_changed: vec![],
        })
    }

    async fn request_waiter(
        &self,
        restaurant_id: String,
        table_number: Option<String>,
        order_type: OrderType,
    ) -> OrderResult<Outcome> {
        if !self.store.restaurant_exists(&restaurant_id).await? {
            return Err(OrderError::RestaurantNotFound(restaurant_id));
        }

        let table_number = match order_type {
            OrderType::DineIn => {
                let number = table_number
                    .as_deref()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| OrderError::InvalidTable("missing table number".into()))?;
                let session = self
                    .store
                    .find_table_session_by_number(&restaurant_id, number)
                    .await?
                    .filter(|t| t.is_active)
                    .ok_or_else(|| OrderError::InvalidTable(number.to_string()))?;
                Some(session.table_number)
            }
            OrderType::Delivery => None,
        };

        let message = match &table_number {
            Some(number) => format!("Table {number} is requesting a waiter"),
            None => "A delivery customer is requesting assistance".to_string(),
        };
        let notification = self
            .notifications
            .create(
                NotificationTarget::Restaurant(restaurant_id.clone()),
                NotificationType::WaiterRequest,
                "Waiter request",
                &message,
            )
            .await?;
        tracing::info!(
            restaurant_id = %restaurant_id,
            table_number = table_number.as_deref().unwrap_or("-"),
            "Waiter requested"
        );

        let restaurant = AudienceKey::restaurant(restaurant_id);
        Ok(Outcome {
            reply: Some(ServerEvent::WaiterRequestSent),
            broadcasts: vec![(
                restaurant.clone(),
                ServerEvent::WaiterRequest {
                    notification,
                    table_number,
                    order_type,
                    message,
                },
            )],
            counts_changed: vec![restaurant],
        })
    }
}

/// Audiences told about a committed status change
///
/// - `order_updated` → `restaurant:<id>` (staff dashboards)
/// - `order_status_update` → `table:<qr>` when the order has a table
/// - delivery: `order_status_update` → `order:<id>`, and → `restaurant:<id>`
///   unless switched off
pub fn status_broadcasts(order: &Order, routing: RoutingConfig) -> Vec<(AudienceKey, ServerEvent)> {
    let restaurant = AudienceKey::restaurant(order.restaurant_id.as_str());
    let status_update = ServerEvent::OrderStatusUpdate {
        order_id: order.id.clone(),
        status: order.status,
        order: Box::new(order.clone()),
    };

    let mut out = vec![(
        restaurant.clone(),
        ServerEvent::OrderUpdated {
            order: Box::new(order.clone()),
        },
    )];
    if let Some(qr) = &order.table_session_id {
        out.push((AudienceKey::table(qr.as_str()), status_update.clone()));
    }
    if order.order_type == OrderType::Delivery {
        if routing.delivery_status_to_restaurant {
            out.push((restaurant, status_update.clone()));
        }
        out.push((AudienceKey::order(order.id.as_str()), status_update));
    }
    out
}

fn new_order_message(order: &Order) -> String {
    match (&order.order_type, &order.table_number, &order.customer) {
        (OrderType::DineIn, Some(number), _) => format!("New order from table {number}"),
        (OrderType::Delivery, _, Some(customer)) => {
            format!("New delivery order from {}", customer.name)
        }
        _ => "New order".to_string(),
    }
}

/// Digits and a leading `+` only
fn normalize_phone(phone: &str) -> String {
    phone
        .trim()
        .chars()
        .enumerate()
        .filter(|(i, c)| c.is_ascii_digit() || (*i == 0 && *c == '+'))
        .map(|(_, c)| c)
        .collect()
}

#[cfg(test)]
mod tests;
