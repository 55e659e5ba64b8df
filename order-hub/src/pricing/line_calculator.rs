//! Line Price Calculator
//!
//! Pure price math for one order line, no I/O:
//!
//! ```text
//! unit_price   = round(price × (1 − discount/100))     discount clamped to 0–100
//! extras_price = Σ resolved option prices              unknown selections add 0
//! line_total   = (unit_price + extras_price) × quantity
//! ```
//!
//! Money is rounded to 2 decimal places, half away from zero.

use rust_decimal::prelude::*;
use shared::message::OrderItemInput;
use shared::models::{CatalogItem, ExtraSelection};
use std::collections::HashSet;

const DECIMAL_PLACES: u32 = 2;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Round a monetary value to 2 decimal places
#[inline]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

#[inline]
pub fn clamp_discount(percent: Decimal) -> Decimal {
    percent.clamp(Decimal::ZERO, HUNDRED)
}

/// Catalog price after the item discount
pub fn discounted_unit_price(price: Decimal, discount_percent: Decimal) -> Decimal {
    let discount = clamp_discount(discount_percent);
    if discount.is_zero() {
        return round_money(price);
    }
    round_money(price * (HUNDRED - discount) / HUNDRED)
}

/// One selected extra after lookup in the item's extras taxonomy
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedExtra {
    Known {
        group_name: String,
        option_name: String,
        price: Decimal,
    },
    /// Not in the taxonomy: zero price, kept for the kitchen
    Unknown(ExtraSelection),
}

impl ResolvedExtra {
    pub fn price(&self) -> Decimal {
        match self {
            Self::Known { price, .. } => *price,
            Self::Unknown(_) => Decimal::ZERO,
        }
    }
}

/// Look up selections, dropping exact duplicates
pub fn resolve_extras(item: &CatalogItem, selections: &[ExtraSelection]) -> Vec<ResolvedExtra> {
    let mut seen = HashSet::new();
    selections
        .iter()
        .filter(|s| seen.insert(*s))
        .map(|s| match item.find_extra(s) {
            Some((group, option)) => ResolvedExtra::Known {
                group_name: group.name.clone(),
                option_name: option.name.clone(),
                price: option.price,
            },
            None => ResolvedExtra::Unknown(s.clone()),
        })
        .collect()
}

/// `Extras: Size: Large (+2.00); sauce-x`
pub fn extras_summary(extras: &[ResolvedExtra]) -> Option<String> {
    if extras.is_empty() {
        return None;
    }
    let parts: Vec<String> = extras
        .iter()
        .map(|e| match e {
            ResolvedExtra::Known {
                group_name,
                option_name,
                price,
            } => format!("{group_name}: {option_name} (+{:.2})", round_money(*price)),
            ResolvedExtra::Unknown(sel) => sel.option_id.clone(),
        })
        .collect();
    Some(format!("Extras: {}", parts.join("; ")))
}

/// Customer notes first, extras summary on its own line after
pub fn merge_notes(customer_notes: Option<&str>, summary: Option<String>) -> Option<String> {
    let customer_notes = customer_notes.map(str::trim).filter(|n| !n.is_empty());
    match (customer_notes, summary) {
        (Some(notes), Some(summary)) => Some(format!("{notes}\n{summary}")),
        (Some(notes), None) => Some(notes.to_string()),
        (None, summary) => summary,
    }
}

/// Price breakdown of one line
#[derive(Debug, Clone, PartialEq)]
pub struct LineBreakdown {
    pub base_price: Decimal,
    pub unit_price: Decimal,
    pub extras_price: Decimal,
    pub line_total: Decimal,
    pub notes: Option<String>,
}

/// Price one line from catalog truth; `input.client_price` is never read
pub fn calculate_line(item: &CatalogItem, input: &OrderItemInput) -> LineBreakdown {
    let unit_price = discounted_unit_price(item.price, item.discount_percent);
    let extras = resolve_extras(item, &input.selected_extras);
    let extras_price = round_money(extras.iter().map(ResolvedExtra::price).sum());
    let line_total = round_money((unit_price + extras_price) * Decimal::from(input.quantity));

    LineBreakdown {
        base_price: round_money(item.price),
        unit_price,
        extras_price,
        line_total,
        notes: merge_notes(input.notes.as_deref(), extras_summary(&extras)),
    }
}
