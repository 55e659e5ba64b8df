//! Catalog Price Resolver
//!
//! 服务端定价：重新读取菜单中的价格、折扣和附加选项，从不信任客户端价格。
//! 只读，可安全重试。

pub mod line_calculator;

use rust_decimal::Decimal;
use shared::message::OrderItemInput;
use shared::models::{CatalogItem, ExtraSelection, OrderLine};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::db::{OrderStore, StorageError};

pub use line_calculator::{LineBreakdown, calculate_line};

/// Pricing errors (the first failing line aborts the whole order)
#[derive(Debug, Error)]
pub enum PricingError {
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Item unavailable: {0}")]
    ItemUnavailable(String),

    #[error("Invalid quantity {quantity} for item {item_id}")]
    InvalidQuantity { item_id: String, quantity: i32 },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A requested line priced against the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLine {
    pub item_id: String,
    pub item_name: String,
    /// Item currency as stored (may be empty)
    pub currency: String,
    pub quantity: i32,
    pub base_price: Decimal,
    pub unit_price: Decimal,
    pub extras_price: Decimal,
    pub line_total: Decimal,
    pub notes: Option<String>,
    pub selected_extras: Vec<ExtraSelection>,
}

impl ResolvedLine {
    fn new(item: &CatalogItem, input: &OrderItemInput) -> Self {
        let LineBreakdown {
            base_price,
            unit_price,
            extras_price,
            line_total,
            notes,
        } = calculate_line(item, input);
        Self {
            item_id: item.id.clone(),
            item_name: item.name.clone(),
            currency: item.currency.clone(),
            quantity: input.quantity,
            base_price,
            unit_price,
            extras_price,
            line_total,
            notes,
            selected_extras: input.selected_extras.clone(),
        }
    }

    pub fn into_order_line(self, id: String, order_id: String) -> OrderLine {
        OrderLine {
            id,
            order_id,
            item_id: self.item_id,
            item_name: self.item_name,
            quantity: self.quantity,
            base_price: self.base_price,
            unit_price: self.unit_price,
            extras_price: self.extras_price,
            line_total: self.line_total,
            notes: self.notes,
            selected_extras: self.selected_extras,
        }
    }
}

/// Sum of line totals
pub fn order_total(lines: &[ResolvedLine]) -> Decimal {
    lines.iter().map(|l| l.line_total).sum()
}

#[derive(Clone)]
pub struct PriceResolver {
    store: Arc<dyn OrderStore>,
}

impl PriceResolver {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// Price every requested line of `restaurant_id`
    ///
    /// All-or-nothing: the first failing line (in request order) is returned.
    pub async fn resolve(
        &self,
        restaurant_id: &str,
        requested: &[OrderItemInput],
    ) -> Result<Vec<ResolvedLine>, PricingError> {
        let mut ids: Vec<String> = requested.iter().map(|l| l.item_id.clone()).collect();
        ids.sort();
        ids.dedup();

        let catalog: HashMap<String, CatalogItem> = self
            .store
            .find_catalog_items(restaurant_id, &ids)
            .await?
            .into_iter()
            .map(|item| (item.id.clone(), item))
            .collect();

        requested
            .iter()
            .map(|input| {
                let item = catalog
                    .get(&input.item_id)
                    .ok_or_else(|| PricingError::ItemNotFound(input.item_id.clone()))?;
                if !item.is_available {
                    return Err(PricingError::ItemUnavailable(item.id.clone()));
                }
                if input.quantity < 1 {
                    return Err(PricingError::InvalidQuantity {
                        item_id: input.item_id.clone(),
                        quantity: input.quantity,
                    });
                }
                Ok(ResolvedLine::new(item, input))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use shared::models::{ExtraOption, ExtrasGroup};

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn item(id: &str, restaurant: &str, price: &str, discount: &str, available: bool) -> CatalogItem {
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
            is_available: available,
        }
    }

    fn line(item_id: &str, quantity: i32) -> OrderItemInput {
        OrderItemInput {
            item_id: item_id.into(),
            quantity,
            selected_extras: vec![],
            notes: None,
            client_price: Some(999.0),
        }
    }

    fn resolver() -> PriceResolver {
        let store = MemoryStore::new();
        store.add_catalog_item(item("pizza", "r1", "10.00", "10", true));
        store.add_catalog_item(item("cola", "r1", "2.50", "0", true));
        store.add_catalog_item(item("soup", "r1", "6.00", "0", false));
        store.add_catalog_item(item("sushi", "r2", "12.00", "0", true));
        PriceResolver::new(Arc::new(store))
    }

    #[tokio::test]
    async fn total_matches_formula() {
        let mut pizza = line("pizza", 3);
        pizza.selected_extras.push(ExtraSelection {
            group_id: "size".into(),
            option_id: "large".into(),
        });
        let lines = resolver()
            .resolve("r1", &[pizza, line("cola", 2)])
            .await
            .unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].line_total, dec("33.00"));
        assert_eq!(lines[1].line_total, dec("5.00"));
        assert_eq!(order_total(&lines), dec("38.00"));
    }

    #[tokio::test]
    async fn other_tenant_item_is_not_found() {
        let err = resolver()
            .resolve("r1", &[line("pizza", 1), line("sushi", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, PricingError::ItemNotFound(id) if id == "sushi"));
    }

    #[tokio::test]
    async fn shared_item_id_priced_per_restaurant() {
        let store = MemoryStore::new();
        store.add_catalog_item(item("pizza", "r1", "10.00", "0", true));
        store.add_catalog_item(item("pizza", "r2", "14.50", "0", true));
        let resolver = PriceResolver::new(Arc::new(store));

        let r1 = resolver.resolve("r1", &[line("pizza", 2)]).await.unwrap();
        assert_eq!(order_total(&r1), dec("20.00"));
        let r2 = resolver.resolve("r2", &[line("pizza", 2)]).await.unwrap();
        assert_eq!(order_total(&r2), dec("29.00"));
    }

    #[tokio::test]
    async fn unavailable_item_rejected() {
        let err = resolver().resolve("r1", &[line("soup", 1)]).await.unwrap_err();
        assert!(matches!(err, PricingError::ItemUnavailable(id) if id == "soup"));
    }

    #[tokio::test]
    async fn first_failing_line_wins() {
        let err = resolver()
            .resolve("r1", &[line("pizza", 1), line("cola", 0), line("ghost", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, PricingError::InvalidQuantity { quantity: 0, .. }));
    }
}
