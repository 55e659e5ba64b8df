//! Order Transaction Manager
//!
//! 校验 → 定价 → 一次性持久化（订单 + 明细在同一事务中）。
//! 状态流转只允许前进一步或取消：
//!
//! ```text
//! PENDING → PREPARING → READY → COMPLETED
//!    └──────────┴─────────┴───→ CANCELLED
//! ```
//!
//! The manager never broadcasts; the dispatcher does, after the write returns.

use shared::message::CreateOrderRequest;
use shared::models::{CustomerInfo, Order, OrderStatus, OrderType, TableSession};
use shared::util::now_millis;
use std::sync::Arc;
use uuid::Uuid;

use crate::audit_log;
use crate::db::OrderStore;
use crate::error::{OrderError, OrderResult};
use crate::pricing::{PriceResolver, order_total};

/// Where a new order is bound, validated before any pricing happens
#[derive(Debug, Clone, PartialEq)]
enum Binding {
    Table(TableSession),
    Customer(CustomerInfo),
}

#[derive(Clone)]
pub struct OrderManager {
    store: Arc<dyn OrderStore>,
    resolver: PriceResolver,
    default_currency: String,
}

impl OrderManager {
    pub fn new(store: Arc<dyn OrderStore>, default_currency: impl Into<String>) -> Self {
        Self {
            resolver: PriceResolver::new(store.clone()),
            store,
            default_currency: default_currency.into(),
        }
    }

    /// Validate, price and persist a new order
    pub async fn create_order(&self, req: &CreateOrderRequest) -> OrderResult<Order> {
        if req.items.is_empty() {
            return Err(OrderError::OrderEmpty);
        }

        let binding = match req.order_type {
            OrderType::DineIn => Binding::Table(self.resolve_table(req).await?),
            OrderType::Delivery => Binding::Customer(customer_info(req)?),
        };

        let lines = self.resolver.resolve(&req.restaurant_id, &req.items).await?;

        let currency = lines
            .first()
            .map(|l| l.currency.clone())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| self.default_currency.clone());
        let total_price = order_total(&lines);

        let order_id = Uuid::new_v4().to_string();
        let now = now_millis();
        let (table_session_id, table_number, customer) = match binding {
            Binding::Table(t) => (Some(t.id), Some(t.table_number), None),
            Binding::Customer(c) => (None, None, Some(c)),
        };

        let order = Order {
            lines: lines
                .into_iter()
                .map(|l| l.into_order_line(Uuid::new_v4().to_string(), order_id.clone()))
                .collect(),
            id: order_id,
            restaurant_id: req.restaurant_id.clone(),
            order_type: req.order_type,
            table_session_id,
            table_number,
            status: OrderStatus::Pending,
            total_price,
            currency,
            customer,
            notes: req
                .notes
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            created_at: now,
            updated_at: now,
        };

        let order = self.store.insert_order(order).await?;
        audit_log!(
            "order.create",
            order_id = %order.id,
            restaurant_id = %order.restaurant_id,
            order_type = order.order_type.as_str(),
            total = %order.total_price
        );
        Ok(order)
    }

    /// Move an order one step along the state machine (or cancel it)
    pub async fn transition(
        &self,
        restaurant_id: &str,
        order_id: &str,
        next: OrderStatus,
    ) -> OrderResult<Order> {
        let current = self
            .store
            .find_order(order_id)
            .await?
            .filter(|o| o.restaurant_id == restaurant_id)
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))?;

        check_transition(&current, next)?;

        let updated = self
            .store
            .update_order_status(order_id, current.status, next, now_millis())
            .await?;
        audit_log!(
            "order.status",
            order_id = %order_id,
            restaurant_id = %restaurant_id,
            from = current.status.as_str(),
            to = next.as_str()
        );
        Ok(updated)
    }

    /// DINE_IN: the table number must name an active session of this restaurant
    async fn resolve_table(&self, req: &CreateOrderRequest) -> OrderResult<TableSession> {
        let number = req
            .table_number
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| OrderError::InvalidTable("missing table number".into()))?;

        self.store
            .find_table_session_by_number(&req.restaurant_id, number)
            .await?
            .filter(|t| t.is_active && t.restaurant_id == req.restaurant_id)
            .ok_or_else(|| OrderError::InvalidTable(number.to_string()))
    }
}

/// Reject terminal sources, skips and backward moves
pub fn check_transition(order: &Order, next: OrderStatus) -> OrderResult<()> {
    if order.status.is_terminal() {
        return Err(OrderError::OrderAlreadyFinal {
            order_id: order.id.clone(),
            status: order.status,
        });
    }
    if !order.status.can_transition_to(next) {
        return Err(OrderError::InvalidTransition {
            from: order.status,
            to: next,
        });
    }
    Ok(())
}

/// DELIVERY: name, phone and address must all be non-blank
fn customer_info(req: &CreateOrderRequest) -> OrderResult<CustomerInfo> {
    fn field(value: &Option<String>) -> Option<String> {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    let name = field(&req.customer_name);
    let phone = field(&req.customer_phone);
    let address = field(&req.customer_address);

    match (name, phone, address) {
        (Some(name), Some(phone), Some(address)) => Ok(CustomerInfo {
            name,
            phone,
            address,
        }),
        (name, phone, address) => {
            let missing = [("name", name), ("phone", phone), ("address", address)]
                .into_iter()
                .filter(|(_, v)| v.is_none())
                .map(|(k, _)| k)
                .collect();
            Err(OrderError::MissingCustomerInfo(missing))
        }
    }
}
