//! Notification Counter + Notifier
//!
//! - [`NotificationCounter`] answers unread-count queries and, via
//!   [`NotificationCounter::mark_changed`], pushes the fresh total to an audience
//!   right after a notification was written. Callers never track deltas.
//! - [`Notifier`] is the injected interface through which anything outside
//!   the order core (e.g. the subscription-expiry job) emits a notification.

use async_trait::async_trait;
use shared::message::{AudienceKey, ServerEvent};
use shared::models::{Notification, NotificationTarget, NotificationType};
use shared::util::now_millis;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{OrderStore, StorageResult};
use crate::error::OrderResult;
use crate::live::SessionRegistry;

#[derive(Clone)]
pub struct NotificationCounter {
    store: Arc<dyn OrderStore>,
    registry: SessionRegistry,
}

impl NotificationCounter {
    pub fn new(store: Arc<dyn OrderStore>, registry: SessionRegistry) -> Self {
        Self { store, registry }
    }

    pub async fn unread_count_for_restaurant(&self, restaurant_id: &str) -> StorageResult<i64> {
        self.store
            .count_unread_notifications(&NotificationTarget::Restaurant(restaurant_id.to_string()))
            .await
    }

    pub async fn unread_count_for_admin(&self, admin_id: &str) -> StorageResult<i64> {
        self.store
            .count_unread_notifications(&NotificationTarget::Admin(admin_id.to_string()))
            .await
    }

    /// Recompute the unread total of `key` and broadcast it there
    ///
    /// Only restaurant and admin audiences have counters; other keys are a no-op.
    pub async fn mark_changed(&self, key: &AudienceKey) -> StorageResult<Option<i64>> {
        let (count, event) = match key {
            AudienceKey::Restaurant(id) => {
                let unread_count = self.unread_count_for_restaurant(id).await?;
                (
                    unread_count,
                    ServerEvent::RestaurantUnreadCount { unread_count },
                )
            }
            AudienceKey::Admin(id) => {
                let unread_count = self.unread_count_for_admin(id).await?;
                (unread_count, ServerEvent::AdminUnreadCount { unread_count })
            }
            AudienceKey::Table(_) | AudienceKey::Order(_) => return Ok(None),
        };
        self.registry.broadcast(key, event);
        Ok(Some(count))
    }
}

/// Notification emission for collaborators outside the order core
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_restaurant(
        &self,
        restaurant_id: &str,
        notification_type: NotificationType,
        title: &str,
        body: &str,
    ) -> OrderResult<Notification>;

    async fn notify_admin(
        &self,
        admin_id: &str,
        notification_type: NotificationType,
        title: &str,
        body: &str,
    ) -> OrderResult<Notification>;
}

/// Persist → broadcast `notification` → push unread count
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn OrderStore>,
    registry: SessionRegistry,
    counter: NotificationCounter,
}

impl NotificationService {
    pub fn new(store: Arc<dyn OrderStore>, registry: SessionRegistry) -> Self {
        Self {
            counter: NotificationCounter::new(store.clone(), registry.clone()),
            store,
            registry,
        }
    }

    pub fn counter(&self) -> &NotificationCounter {
        &self.counter
    }

    /// Persist only; the caller decides what to broadcast
    pub async fn create(
        &self,
        target: NotificationTarget,
        notification_type: NotificationType,
        title: &str,
        body: &str,
    ) -> StorageResult<Notification> {
        self.store
            .insert_notification(Notification {
                id: Uuid::new_v4().to_string(),
                target,
                notification_type,
                title: title.to_string(),
                body: body.to_string(),
                is_read: false,
                created_at: now_millis(),
            })
            .await
    }

    async fn publish(
        &self,
        target: NotificationTarget,
        notification_type: NotificationType,
        title: &str,
        body: &str,
    ) -> OrderResult<Notification> {
        let key = match &target {
            NotificationTarget::Restaurant(id) => AudienceKey::restaurant(id.as_str()),
            NotificationTarget::Admin(id) => AudienceKey::admin(id.as_str()),
        };
        let notification = self
            .create(target, notification_type, title, body)
            .await?;

        self.registry.broadcast(
            &key,
            ServerEvent::Notification {
                notification: notification.clone(),
            },
        );
        // 通知已落库，计数推送失败只记日志
        if let Err(e) = self.counter.mark_changed(&key).await {
            tracing::warn!(audience = %key, error = %e, "Failed to push unread count");
        }
        Ok(notification)
    }
}

#[async_trait]
impl Notifier for NotificationService {
    async fn notify_restaurant(
        &self,
        restaurant_id: &str,
        notification_type: NotificationType,
        title: &str,
        body: &str,
    ) -> OrderResult<Notification> {
        self.publish(
            NotificationTarget::Restaurant(restaurant_id.to_string()),
            notification_type,
            title,
            body,
        )
        .await
    }

    async fn notify_admin(
        &self,
        admin_id: &str,
        notification_type: NotificationType,
        title: &str,
        body: &str,
    ) -> OrderResult<Notification> {
        self.publish(
            NotificationTarget::Admin(admin_id.to_string()),
            notification_type,
            title,
            body,
        )
        .await
    }
}
