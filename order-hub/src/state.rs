//! Application state for order-hub

use std::sync::Arc;

use crate::config::Config;
use crate::db::{MemoryStore, OrderStore, PgStore};
use crate::dispatch::{OrderEventDispatcher, RoutingConfig};
use crate::live::SessionRegistry;
use crate::notifications::{NotificationService, Notifier};
use crate::orders::OrderManager;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
///
/// Everything here is constructed once per process and cloned into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Order / catalog / notification persistence
    pub store: Arc<dyn OrderStore>,
    /// Room membership + outbound queues
    pub registry: SessionRegistry,
    /// Client intent handling
    pub dispatcher: OrderEventDispatcher,
    /// Notification emission for jobs outside the order flow
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    /// Create a new AppState, connecting to PostgreSQL when configured
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let store: Arc<dyn OrderStore> = match &config.database_url {
            Some(url) => {
                let store = PgStore::connect(url).await?;
                tracing::info!("PostgreSQL store ready");
                Arc::new(store)
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory store (data is not persisted)");
                Arc::new(MemoryStore::new())
            }
        };
        Ok(Self::with_store(config.clone(), store))
    }

    /// Wire all services around an existing store
    pub fn with_store(config: Config, store: Arc<dyn OrderStore>) -> Self {
        let registry = SessionRegistry::new();
        let notifications = NotificationService::new(store.clone(), registry.clone());
        let dispatcher = OrderEventDispatcher::new(
            store.clone(),
            OrderManager::new(store.clone(), config.default_currency.clone()),
            registry.clone(),
            notifications.clone(),
            RoutingConfig {
                delivery_status_to_restaurant: config.delivery_status_to_restaurant,
            },
        );

        Self {
            config: Arc::new(config),
            store,
            registry,
            dispatcher,
            notifier: Arc::new(notifications),
        }
    }
}
