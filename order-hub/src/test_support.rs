//! Fixtures for unit tests

use rust_decimal::Decimal;
use shared::message::{CreateOrderRequest, OrderItemInput};
use shared::models::{
    CatalogItem, ExtraOption, ExtraSelection, ExtrasGroup, OrderType, TableSession,
};
use std::sync::Arc;

use crate::db::MemoryStore;

pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn catalog_item(id: &str, restaurant: &str, price: &str, discount: &str) -> CatalogItem {
    CatalogItem {
        id: id.into(),
        restaurant_id: restaurant.into(),
        name: id.to_uppercase(),
        price: dec(price),
        currency: "EUR".into(),
        discount_percent: dec(discount),
        extras: vec![ExtrasGroup {
            id: "size".into(),
            name: "Size".into(),
            options: vec![ExtraOption {
                id: "large".into(),
                name: "Large".into(),
                price: dec("2.00"),
            }],
        }],
        is_available: true,
    }
}

fn table(qr: &str, restaurant: &str, number: &str, active: bool) -> TableSession {
    TableSession {
        id: qr.into(),
        restaurant_id: restaurant.into(),
        table_number: number.into(),
        is_active: active,
    }
}

/// r1: pizza (10.00, −10%), cola (2.50), soup (unavailable); tables 1, 2, 9 (inactive)
/// r2: sushi (12.00); table 1
/// admin a1
pub fn seeded_store() -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    store.add_catalog_item(catalog_item("pizza", "r1", "10.00", "10"));
    store.add_catalog_item(catalog_item("cola", "r1", "2.50", "0"));
    store.add_catalog_item(CatalogItem {
        is_available: false,
        ..catalog_item("soup", "r1", "6.00", "0")
    });
    store.add_catalog_item(catalog_item("sushi", "r2", "12.00", "0"));
    store.add_table_session(table("qr-1", "r1", "1", true));
    store.add_table_session(table("qr-2", "r1", "2", true));
    store.add_table_session(table("qr-9", "r1", "9", false));
    store.add_table_session(table("qr-r2-1", "r2", "1", true));
    store.add_admin("a1");
    Arc::new(store)
}

pub fn item(id: &str, quantity: i32) -> OrderItemInput {
    OrderItemInput {
        item_id: id.into(),
        quantity,
        selected_extras: vec![],
        notes: None,
        client_price: None,
    }
}

pub fn large(mut input: OrderItemInput) -> OrderItemInput {
    input.selected_extras.push(ExtraSelection {
        group_id: "size".into(),
        option_id: "large".into(),
    });
    input
}

pub fn dine_in(restaurant: &str, table_number: &str, items: Vec<OrderItemInput>) -> CreateOrderRequest {
    CreateOrderRequest {
        restaurant_id: restaurant.into(),
        order_type: OrderType::DineIn,
        table_number: Some(table_number.into()),
        items,
        customer_name: None,
        customer_phone: None,
        customer_address: None,
        notes: None,
    }
}

pub fn delivery(restaurant: &str, phone: Option<&str>, items: Vec<OrderItemInput>) -> CreateOrderRequest {
    CreateOrderRequest {
        restaurant_id: restaurant.into(),
        order_type: OrderType::Delivery,
        table_number: None,
        items,
        customer_name: Some("Ana".into()),
        customer_phone: phone.map(str::to_string),
        customer_address: Some("Calle Mayor 1".into()),
        notes: None,
    }
}
