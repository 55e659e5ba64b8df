//! In-memory store
//!
//! All tables live behind one `RwLock`, so every write is trivially atomic.
//! Used by the test suites and by development runs without `DATABASE_URL`.

use async_trait::async_trait;
use parking_lot::RwLock;
use shared::models::{
    CatalogItem, Notification, NotificationTarget, Order, OrderStatus, TableSession,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use super::{OrderStore, StorageError, StorageResult};

#[derive(Default)]
struct Tables {
    restaurants: HashSet<String>,
    admins: HashSet<String>,
    /// (restaurant_id, item_id) → item；不同餐厅可复用同一 item_id
    catalog: HashMap<(String, String), CatalogItem>,
    /// qr_code_id → session
    tables: HashMap<String, TableSession>,
    orders: HashMap<String, Order>,
    notifications: Vec<Notification>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_next_write: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Seeding ==========

    pub fn add_restaurant(&self, restaurant_id: impl Into<String>) {
        self.tables.write().restaurants.insert(restaurant_id.into());
    }

    pub fn add_admin(&self, admin_id: impl Into<String>) {
        self.tables.write().admins.insert(admin_id.into());
    }

    pub fn add_catalog_item(&self, item: CatalogItem) {
        let mut tables = self.tables.write();
        tables.restaurants.insert(item.restaurant_id.clone());
        tables
            .catalog
            .insert((item.restaurant_id.clone(), item.id.clone()), item);
    }

    pub fn add_table_session(&self, session: TableSession) {
        let mut tables = self.tables.write();
        tables.restaurants.insert(session.restaurant_id.clone());
        tables.tables.insert(session.id.clone(), session);
    }

    /// Make the next write (order insert, status update, notification insert) fail
    pub fn fail_next_write(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }

    // ========== Inspection ==========

    pub fn order_count(&self) -> usize {
        self.tables.read().orders.len()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.tables.read().notifications.clone()
    }

    pub fn mark_all_read(&self, target: &NotificationTarget) {
        let mut tables = self.tables.write();
        for n in tables.notifications.iter_mut().filter(|n| &n.target == target) {
            n.is_read = true;
        }
    }

    fn check_injected_failure(&self) -> StorageResult<()> {
        if self.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(StorageError::Database("injected write failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn find_catalog_items(
        &self,
        restaurant_id: &str,
        item_ids: &[String],
    ) -> StorageResult<Vec<CatalogItem>> {
        let tables = self.tables.read();
        Ok(item_ids
            .iter()
            .filter_map(|id| tables.catalog.get(&(restaurant_id.to_string(), id.clone())))
            .cloned()
            .collect())
    }

    async fn find_table_session(&self, qr_code_id: &str) -> StorageResult<Option<TableSession>> {
        Ok(self.tables.read().tables.get(qr_code_id).cloned())
    }

    async fn find_table_session_by_number(
        &self,
        restaurant_id: &str,
        table_number: &str,
    ) -> StorageResult<Option<TableSession>> {
        let tables = self.tables.read();
        Ok(tables
            .tables
            .values()
            .find(|t| t.restaurant_id == restaurant_id && t.table_number == table_number && t.is_active)
            .cloned())
    }

    async fn restaurant_exists(&self, restaurant_id: &str) -> StorageResult<bool> {
        Ok(self.tables.read().restaurants.contains(restaurant_id))
    }

    async fn admin_exists(&self, admin_id: &str) -> StorageResult<bool> {
        Ok(self.tables.read().admins.contains(admin_id))
    }

    async fn find_order(&self, order_id: &str) -> StorageResult<Option<Order>> {
        Ok(self.tables.read().orders.get(order_id).cloned())
    }

    async fn insert_order(&self, order: Order) -> StorageResult<Order> {
        self.check_injected_failure()?;
        let mut tables = self.tables.write();
        if tables.orders.contains_key(&order.id) {
            return Err(StorageError::Conflict {
                entity: "order",
                id: order.id,
            });
        }
        tables.orders.insert(order.id.clone(), order.clone());
        Ok(order)
    }

    async fn update_order_status(
        &self,
        order_id: &str,
        expected: OrderStatus,
        next: OrderStatus,
        updated_at: i64,
    ) -> StorageResult<Order> {
        self.check_injected_failure()?;
        let mut tables = self.tables.write();
        let order = tables
            .orders
            .get_mut(order_id)
            .ok_or_else(|| StorageError::NotFound {
                entity: "order",
                id: order_id.to_string(),
            })?;
        if order.status != expected {
            return Err(StorageError::Conflict {
                entity: "order",
                id: order_id.to_string(),
            });
        }
        order.status = next;
        order.updated_at = updated_at;
        Ok(order.clone())
    }

    async fn insert_notification(&self, notification: Notification) -> StorageResult<Notification> {
        self.check_injected_failure()?;
        self.tables.write().notifications.push(notification.clone());
        Ok(notification)
    }

    async fn count_unread_notifications(&self, target: &NotificationTarget) -> StorageResult<i64> {
        let tables = self.tables.read();
        let count = tables
            .notifications
            .iter()
            .filter(|n| &n.target == target && !n.is_read)
            .count();
        Ok(count as i64)
    }
}
