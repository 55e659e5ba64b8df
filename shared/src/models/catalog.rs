//! Catalog Item Model (read-only for the order core)

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A priced option inside an extras group (e.g. "Large", "+ cheese")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraOption {
    pub id: String,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

/// Named group of extras (e.g. "Size", "Toppings")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtrasGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub options: Vec<ExtraOption>,
}

/// Client selection of one extra option
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraSelection {
    pub group_id: String,
    pub option_id: String,
}

/// Menu item as stored in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: String,
    pub restaurant_id: String,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub currency: String,
    /// 0–100
    #[serde(with = "rust_decimal::serde::float")]
    pub discount_percent: Decimal,
    #[serde(default)]
    pub extras: Vec<ExtrasGroup>,
    pub is_available: bool,
}

impl CatalogItem {
    /// Look up an option by group and option id
    pub fn find_extra(&self, selection: &ExtraSelection) -> Option<(&ExtrasGroup, &ExtraOption)> {
        self.extras
            .iter()
            .find(|g| g.id == selection.group_id)
            .and_then(|g| {
                g.options
                    .iter()
                    .find(|o| o.id == selection.option_id)
                    .map(|o| (g, o))
            })
    }
}
