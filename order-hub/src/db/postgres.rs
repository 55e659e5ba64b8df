//! PostgreSQL store

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::models::{
    CatalogItem, CustomerInfo, ExtraSelection, ExtrasGroup, Notification, NotificationTarget,
    Order, OrderLine, OrderStatus, OrderType, TableSession,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use super::{OrderStore, StorageError, StorageResult};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and apply migrations
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StorageError::Database(format!("Failed to apply migrations: {e}")))?;
        tracing::info!("Database migrations applied");

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ========== Rows ==========

#[derive(sqlx::FromRow)]
struct CatalogItemRow {
    id: String,
    restaurant_id: String,
    name: String,
    price: Decimal,
    currency: String,
    discount_percent: Decimal,
    extras: Json<Vec<ExtrasGroup>>,
    is_available: bool,
}

impl From<CatalogItemRow> for CatalogItem {
    fn from(r: CatalogItemRow) -> Self {
        Self {
            id: r.id,
            restaurant_id: r.restaurant_id,
            name: r.name,
            price: r.price,
            currency: r.currency,
            discount_percent: r.discount_percent,
            extras: r.extras.0,
            is_available: r.is_available,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TableSessionRow {
    id: String,
    restaurant_id: String,
    table_number: String,
    is_active: bool,
}

impl From<TableSessionRow> for TableSession {
    fn from(r: TableSessionRow) -> Self {
        Self {
            id: r.id,
            restaurant_id: r.restaurant_id,
            table_number: r.table_number,
            is_active: r.is_active,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: String,
    restaurant_id: String,
    order_type: String,
    table_session_id: Option<String>,
    table_number: Option<String>,
    status: String,
    total_price: Decimal,
    currency: String,
    customer_name: Option<String>,
    customer_phone: Option<String>,
    customer_address: Option<String>,
    notes: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl OrderRow {
    fn into_order(self, lines: Vec<OrderLine>) -> StorageResult<Order> {
        let order_type = OrderType::parse(&self.order_type)
            .ok_or_else(|| StorageError::Corrupt(format!("order_type {}", self.order_type)))?;
        let status = OrderStatus::parse(&self.status)
            .ok_or_else(|| StorageError::Corrupt(format!("status {}", self.status)))?;
        let customer = match (self.customer_name, self.customer_phone, self.customer_address) {
            (Some(name), Some(phone), Some(address)) => Some(CustomerInfo {
                name,
                phone,
                address,
            }),
            _ => None,
        };
        Ok(Order {
            id: self.id,
            restaurant_id: self.restaurant_id,
            order_type,
            table_session_id: self.table_session_id,
            table_number: self.table_number,
            status,
            total_price: self.total_price,
            currency: self.currency,
            customer,
            notes: self.notes,
            lines,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderLineRow {
    id: String,
    order_id: String,
    item_id: String,
    item_name: String,
    quantity: i32,
    base_price: Decimal,
    unit_price: Decimal,
    extras_price: Decimal,
    line_total: Decimal,
    notes: Option<String>,
    selected_extras: Json<Vec<ExtraSelection>>,
}

impl From<OrderLineRow> for OrderLine {
    fn from(r: OrderLineRow) -> Self {
        Self {
            id: r.id,
            order_id: r.order_id,
            item_id: r.item_id,
            item_name: r.item_name,
            quantity: r.quantity,
            base_price: r.base_price,
            unit_price: r.unit_price,
            extras_price: r.extras_price,
            line_total: r.line_total,
            notes: r.notes,
            selected_extras: r.selected_extras.0,
        }
    }
}

fn target_columns(target: &NotificationTarget) -> (&'static str, &str) {
    match target {
        NotificationTarget::Restaurant(id) => ("restaurant", id),
        NotificationTarget::Admin(id) => ("admin", id),
    }
}

async fn load_order(conn: &mut PgConnection, order_id: &str) -> StorageResult<Option<Order>> {
    let row: Option<OrderRow> = sqlx::query_as(
        "SELECT id, restaurant_id, order_type, table_session_id, table_number, status,
            total_price, currency, customer_name, customer_phone, customer_address, notes,
            created_at, updated_at
         FROM orders WHERE id = $1",
    )
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let lines: Vec<OrderLineRow> = sqlx::query_as(
        "SELECT id, order_id, item_id, item_name, quantity, base_price, unit_price,
            extras_price, line_total, notes, selected_extras
         FROM order_lines WHERE order_id = $1 ORDER BY position",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    row.into_order(lines.into_iter().map(Into::into).collect())
        .map(Some)
}

#[async_trait]
impl OrderStore for PgStore {
    async fn find_catalog_items(
        &self,
        restaurant_id: &str,
        item_ids: &[String],
    ) -> StorageResult<Vec<CatalogItem>> {
        let rows: Vec<CatalogItemRow> = sqlx::query_as(
            "SELECT id, restaurant_id, name, price, currency, discount_percent, extras, is_available
             FROM catalog_items WHERE restaurant_id = $1 AND id = ANY($2)",
        )
        .bind(restaurant_id)
        .bind(item_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_table_session(&self, qr_code_id: &str) -> StorageResult<Option<TableSession>> {
        let row: Option<TableSessionRow> = sqlx::query_as(
            "SELECT id, restaurant_id, table_number, is_active FROM table_sessions WHERE id = $1",
        )
        .bind(qr_code_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn find_table_session_by_number(
        &self,
        restaurant_id: &str,
        table_number: &str,
    ) -> StorageResult<Option<TableSession>> {
        let row: Option<TableSessionRow> = sqlx::query_as(
            "SELECT id, restaurant_id, table_number, is_active FROM table_sessions
             WHERE restaurant_id = $1 AND table_number = $2 AND is_active
             LIMIT 1",
        )
        .bind(restaurant_id)
        .bind(table_number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn restaurant_exists(&self, restaurant_id: &str) -> StorageResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM restaurants WHERE id = $1)")
                .bind(restaurant_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn admin_exists(&self, admin_id: &str) -> StorageResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM admins WHERE id = $1)")
            .bind(admin_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn find_order(&self, order_id: &str) -> StorageResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        load_order(&mut *conn, order_id).await
    }

    async fn insert_order(&self, order: Order) -> StorageResult<Order> {
        let mut tx = self.pool.begin().await?;

        let customer = order.customer.as_ref();
        sqlx::query(
            "INSERT INTO orders (id, restaurant_id, order_type, table_session_id, table_number,
                status, total_price, currency, customer_name, customer_phone, customer_address,
                notes, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(&order.id)
        .bind(&order.restaurant_id)
        .bind(order.order_type.as_str())
        .bind(&order.table_session_id)
        .bind(&order.table_number)
        .bind(order.status.as_str())
        .bind(order.total_price)
        .bind(&order.currency)
        .bind(customer.map(|c| c.name.as_str()))
        .bind(customer.map(|c| c.phone.as_str()))
        .bind(customer.map(|c| c.address.as_str()))
        .bind(&order.notes)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for (position, line) in order.lines.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_lines (id, order_id, position, item_id, item_name, quantity,
                    base_price, unit_price, extras_price, line_total, notes, selected_extras)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            )
            .bind(&line.id)
            .bind(&order.id)
            .bind(position as i32)
            .bind(&line.item_id)
            .bind(&line.item_name)
            .bind(line.quantity)
            .bind(line.base_price)
            .bind(line.unit_price)
            .bind(line.extras_price)
            .bind(line.line_total)
            .bind(&line.notes)
            .bind(Json(&line.selected_extras))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(order)
    }

    async fn update_order_status(
        &self,
        order_id: &str,
        expected: OrderStatus,
        next: OrderStatus,
        updated_at: i64,
    ) -> StorageResult<Order> {
        let mut tx = self.pool.begin().await?;

        let result =
            sqlx::query("UPDATE orders SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4")
                .bind(next.as_str())
                .bind(updated_at)
                .bind(order_id)
                .bind(expected.as_str())
                .execute(&mut *tx)
                .await?;

        let order = load_order(&mut *tx, order_id).await?;
        match (result.rows_affected(), order) {
            (_, None) => Err(StorageError::NotFound {
                entity: "order",
                id: order_id.to_string(),
            }),
            (0, Some(_)) => Err(StorageError::Conflict {
                entity: "order",
                id: order_id.to_string(),
            }),
            (_, Some(order)) => {
                tx.commit().await?;
                Ok(order)
            }
        }
    }

    async fn insert_notification(&self, notification: Notification) -> StorageResult<Notification> {
        let (kind, target_id) = target_columns(&notification.target);
        sqlx::query(
            "INSERT INTO notifications (id, target_kind, target_id, notification_type, title, body,
                is_read, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&notification.id)
        .bind(kind)
        .bind(target_id)
        .bind(notification.notification_type.as_str())
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(notification.is_read)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;
        Ok(notification)
    }

    async fn count_unread_notifications(&self, target: &NotificationTarget) -> StorageResult<i64> {
        let (kind, target_id) = target_columns(target);
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications
             WHERE target_kind = $1 AND target_id = $2 AND NOT is_read",
        )
        .bind(kind)
        .bind(target_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
