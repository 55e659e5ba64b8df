//! Storage layer
//!
//! [`OrderStore`] is the only way the order core touches persistent data.
//! Reads are tenant-keyed; the two writes that matter for correctness
//! ([`OrderStore::insert_order`] and [`OrderStore::update_order_status`])
//! are atomic in every implementation.
//!
//! - [`MemoryStore`] - in-process maps (tests, development)
//! - [`PgStore`] - PostgreSQL via sqlx

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use shared::models::{
    CatalogItem, Notification, NotificationTarget, Order, OrderStatus, TableSession,
};
use thiserror::Error;

/// Storage errors
///
/// Everything except [`StorageError::NotFound`] is worth a retry by the caller.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Write conflict on {entity} {id}")]
    Conflict { entity: &'static str, id: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl StorageError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::NotFound { .. })
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StorageError::NotFound {
                entity: "row",
                id: String::new(),
            },
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StorageError::Corrupt(e.to_string())
            }
            other => StorageError::Database(other.to_string()),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Data-access interface consumed by the order core
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Catalog items of `restaurant_id` among `item_ids` (missing ids are simply absent)
    async fn find_catalog_items(
        &self,
        restaurant_id: &str,
        item_ids: &[String],
    ) -> StorageResult<Vec<CatalogItem>>;

    /// Table session by QR code id
    async fn find_table_session(&self, qr_code_id: &str) -> StorageResult<Option<TableSession>>;

    /// Active table session of a restaurant by its human table number
    async fn find_table_session_by_number(
        &self,
        restaurant_id: &str,
        table_number: &str,
    ) -> StorageResult<Option<TableSession>>;

    async fn restaurant_exists(&self, restaurant_id: &str) -> StorageResult<bool>;

    async fn admin_exists(&self, admin_id: &str) -> StorageResult<bool>;

    /// Order with its lines
    async fn find_order(&self, order_id: &str) -> StorageResult<Option<Order>>;

    /// Persist order + lines in one transaction, returning the stored order
    async fn insert_order(&self, order: Order) -> StorageResult<Order>;

    /// Compare-and-set status change
    ///
    /// Fails with [`StorageError::Conflict`] when the stored status is no
    /// longer `expected`, and [`StorageError::NotFound`] when the order is gone.
    async fn update_order_status(
        &self,
        order_id: &str,
        expected: OrderStatus,
        next: OrderStatus,
        updated_at: i64,
    ) -> StorageResult<Order>;

    async fn insert_notification(&self, notification: Notification) -> StorageResult<Notification>;

    async fn count_unread_notifications(&self, target: &NotificationTarget) -> StorageResult<i64>;
}
