//! Unit price resolution: retail versus wholesale tier.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{OrderLineItem, Product};

/// Display name given to a line whose product no longer exists.
pub const REMOVED_PRODUCT_NAME: &str = "product removed";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PriceSchedule {
    pub price: Decimal,
    pub wholesale_price: Option<Decimal>,
    pub wholesale_min_qty: Option<i32>,
}

impl PriceSchedule {
    /// The wholesale tier, when both halves are present and positive.
    pub fn wholesale_tier(&self) -> Option<(Decimal, i32)> {
        let price = self.wholesale_price.filter(|p| *p > Decimal::ZERO)?;
        let min_qty = self.wholesale_min_qty.filter(|q| *q > 0)?;
        Some((price, min_qty))
    }
}

/// Unit price charged for `quantity` units. Negative quantities count as zero.
pub fn resolve_unit_price(schedule: &PriceSchedule, quantity: i32) -> Decimal {
    let quantity = quantity.max(0);
    match schedule.wholesale_tier() {
        Some((wholesale, min_qty)) if quantity >= min_qty => wholesale,
        _ => schedule.price.max(Decimal::ZERO),
    }
}

/// Price one line from the current catalog record. A missing product degrades
/// to a zero-priced line with a sentinel name instead of failing.
pub fn price_line(product_id: Uuid, product: Option<&Product>, quantity: i32) -> OrderLineItem {
    match product {
        Some(product) => OrderLineItem {
            product_id,
            name: product.name.clone(),
            unit_price: resolve_unit_price(&product.schedule(), quantity),
            quantity,
        },
        None => {
            tracing::warn!(%product_id, "product not in catalog, line priced at zero");
            OrderLineItem {
                product_id,
                name: REMOVED_PRODUCT_NAME.to_string(),
                unit_price: Decimal::ZERO,
                quantity,
            }
        }
    }
}

/// Re-price existing lines at their stored quantities.
pub fn reprice_lines(lines: &[OrderLineItem], catalog: &HashMap<Uuid, Product>) -> Vec<OrderLineItem> {
    lines
        .iter()
        .map(|line| price_line(line.product_id, catalog.get(&line.product_id), line.quantity))
        .collect()
}
