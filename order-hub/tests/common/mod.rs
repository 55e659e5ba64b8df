//! 集成测试公共夹具：内存存储 + 完整 AppState + 模拟 WS 客户端

#![allow(dead_code)]

use order_hub::db::MemoryStore;
use order_hub::error::OrderError;
use order_hub::live::{ConnectionId, Outbound};
use order_hub::{AppState, Config};
use rust_decimal::Decimal;
use serde_json::Value;
use shared::message::ClientIntent;
use shared::models::{CatalogItem, ExtraOption, ExtrasGroup, TableSession};
use std::sync::Arc;
use tokio::sync::mpsc;

pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// Trattoria "t1": margherita 9.50 (−20%), toppings, lemonade; tables 4 and 5
/// Sushi bar "s1": nigiri 6.00; table 1
pub fn seeded_store() -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    store.add_catalog_item(CatalogItem {
        id: "margherita".into(),
        restaurant_id: "t1".into(),
        name: "Margherita".into(),
        price: dec("9.50"),
        currency: "EUR".into(),
        discount_percent: dec("20"),
        extras: vec![ExtrasGroup {
            id: "toppings".into(),
            name: "Toppings".into(),
            options: vec![
                ExtraOption {
                    id: "burrata".into(),
                    name: "Burrata".into(),
                    price: dec("3.00"),
                },
                ExtraOption {
                    id: "basil".into(),
                    name: "Basil".into(),
                    price: dec("0.50"),
                },
            ],
        }],
        is_available: true,
    });
    store.add_catalog_item(CatalogItem {
        id: "lemonade".into(),
        restaurant_id: "t1".into(),
        name: "Lemonade".into(),
        price: dec("3.20"),
        currency: "EUR".into(),
        discount_percent: Decimal::ZERO,
        extras: vec![],
        is_available: true,
    });
    store.add_catalog_item(CatalogItem {
        id: "nigiri".into(),
        restaurant_id: "s1".into(),
        name: "Nigiri".into(),
        price: dec("6.00"),
        currency: "EUR".into(),
        discount_percent: Decimal::ZERO,
        extras: vec![],
        is_available: true,
    });
    for (qr, restaurant, number) in [("t1-q4", "t1", "4"), ("t1-q5", "t1", "5"), ("s1-q1", "s1", "1")] {
        store.add_table_session(TableSession {
            id: qr.into(),
            restaurant_id: restaurant.into(),
            table_number: number.into(),
            is_active: true,
        });
    }
    store.add_admin("root");
    Arc::new(store)
}

pub struct TestHub {
    pub store: Arc<MemoryStore>,
    pub state: AppState,
}

impl TestHub {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let store = seeded_store();
        let state = AppState::with_store(config, store.clone());
        Self { store, state }
    }

    pub fn connect(&self) -> TestClient {
        let (tx, rx) = mpsc::channel(256);
        TestClient {
            conn: self.state.registry.connect(tx),
            rx,
            state: self.state.clone(),
        }
    }
}

/// 绕过 socket 的客户端：发送 JSON 文本帧，读取序列化后的出站事件
pub struct TestClient {
    pub conn: ConnectionId,
    rx: mpsc::Receiver<Outbound>,
    state: AppState,
}

impl TestClient {
    /// Send one frame the way the WS reader does
    pub async fn send(&self, frame: Value) {
        match serde_json::from_value::<ClientIntent>(frame) {
            Ok(intent) => self.state.dispatcher.dispatch(self.conn, intent).await,
            Err(e) => {
                let err = OrderError::InvalidRequest(format!("Malformed message: {e}"));
                self.state.dispatcher.reject(self.conn, err.into()).await
            }
        }
    }

    /// Drain everything queued so far, as wire JSON
    pub fn recv_all(&mut self) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            out.push(serde_json::to_value(&*event).unwrap());
        }
        out
    }

    pub fn event_names(&mut self) -> Vec<String> {
        self.recv_all()
            .into_iter()
            .map(|v| v["event"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    /// Exactly one queued event
    pub fn recv_one(&mut self) -> Value {
        let mut all = self.recv_all();
        assert_eq!(all.len(), 1, "expected one event, got {all:#?}");
        all.remove(0)
    }

    pub fn disconnect(&self) {
        self.state.registry.disconnect(self.conn);
    }
}
