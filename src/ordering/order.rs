//! The order record and the only code allowed to change its line items.

use std::{fmt, str::FromStr};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    Processing,
    Done,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::Processing => "processing",
            OrderStatus::Done => "done",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Done | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "new" => Ok(OrderStatus::New),
            "processing" => Ok(OrderStatus::Processing),
            "done" => Ok(OrderStatus::Done),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(AppError::BadRequest(format!(
                "invalid order status `{other}`"
            ))),
        }
    }
}

/// Buyer identity copied onto the order. Empty strings mark legacy records that
/// were stored without it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BuyerSnapshot {
    pub name: String,
    pub phone: String,
    pub street: String,
}

impl BuyerSnapshot {
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty()
            && !self.phone.trim().is_empty()
            && !self.street.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderLineItem {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
}

impl OrderLineItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Field set used by stores to rebuild an order they persisted.
#[derive(Debug, Clone)]
pub struct OrderParts {
    pub id: Uuid,
    pub user_id: Uuid,
    pub buyer: BuyerSnapshot,
    pub items: Vec<OrderLineItem>,
    pub status: OrderStatus,
    pub contact: String,
    pub version: i64,
    pub frozen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A customer order.
///
/// Line items, total and status are private: the total is recomputed by every
/// mutator, and once the order has left `new` the only line-item write still
/// accepted is an administrative removal.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub buyer: BuyerSnapshot,
    items: Vec<OrderLineItem>,
    total: Decimal,
    status: OrderStatus,
    pub contact: String,
    pub frozen_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// A draft that has never been stored (`version == 0`).
    pub fn new_draft(user_id: Uuid, buyer: BuyerSnapshot, now: DateTime<Utc>) -> Self {
        let contact = buyer.phone.clone();
        Self {
            id: Uuid::new_v4(),
            user_id,
            buyer,
            items: Vec::new(),
            total: Decimal::ZERO,
            status: OrderStatus::New,
            contact,
            frozen_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn restore(parts: OrderParts) -> Self {
        let mut order = Self {
            id: parts.id,
            user_id: parts.user_id,
            buyer: parts.buyer,
            items: parts.items,
            total: Decimal::ZERO,
            status: parts.status,
            contact: parts.contact,
            frozen_at: parts.frozen_at,
            version: parts.version,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        };
        order.recompute_total();
        order
    }

    pub fn items(&self) -> &[OrderLineItem] {
        &self.items
    }

    pub fn total(&self) -> Decimal {
        self.total
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn is_new(&self) -> bool {
        self.status == OrderStatus::New
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn line(&self, product_id: Uuid) -> Option<&OrderLineItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    /// Quantity the line for `product_id` would hold after adding `quantity`.
    pub fn merged_quantity(&self, product_id: Uuid, quantity: i32) -> AppResult<i32> {
        match self.line(product_id) {
            Some(item) => item.quantity.checked_add(quantity).ok_or_else(|| {
                AppError::BadRequest(format!("quantity for product {product_id} is too large"))
            }),
            None => Ok(quantity),
        }
    }

    /// Replace the line for the same product in place, or append it.
    pub(crate) fn upsert_line(&mut self, line: OrderLineItem) -> AppResult<()> {
        self.ensure_mutable_lines()?;
        match self
            .items
            .iter_mut()
            .find(|item| item.product_id == line.product_id)
        {
            Some(existing) => *existing = line,
            None => self.items.push(line),
        }
        self.recompute_total();
        Ok(())
    }

    /// Swap every line for a freshly priced one while the order is still a draft.
    pub(crate) fn reprice_lines(&mut self, lines: Vec<OrderLineItem>) -> AppResult<()> {
        self.ensure_mutable_lines()?;
        self.items = lines;
        self.recompute_total();
        Ok(())
    }

    /// Store the final line set and move to `processing`.
    pub(crate) fn freeze(&mut self, lines: Vec<OrderLineItem>, now: DateTime<Utc>) -> AppResult<()> {
        self.reprice_lines(lines)?;
        self.status = OrderStatus::Processing;
        self.frozen_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Pure status write. Leaving `new` locks the lines as currently stored.
    pub(crate) fn set_status(&mut self, status: OrderStatus, now: DateTime<Utc>) {
        if status != OrderStatus::New {
            self.frozen_at.get_or_insert(now);
        }
        self.status = status;
        self.updated_at = now;
    }

    /// Administrative removal, allowed at any status. Prices are not touched.
    pub(crate) fn remove_line(&mut self, product_id: Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.product_id != product_id);
        let removed = self.items.len() != before;
        if removed {
            self.recompute_total();
            self.updated_at = Utc::now();
        }
        removed
    }

    pub(crate) fn set_buyer(&mut self, buyer: BuyerSnapshot) {
        if self.contact.trim().is_empty() {
            self.contact = buyer.phone.clone();
        }
        self.buyer = buyer;
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// Called by stores once a save went through.
    pub(crate) fn mark_saved(&mut self) {
        self.version += 1;
    }

    fn ensure_mutable_lines(&self) -> AppResult<()> {
        if self.is_new() {
            Ok(())
        } else {
            Err(AppError::Internal(anyhow!(
                "line items of order {} are frozen (status {})",
                self.id,
                self.status
            )))
        }
    }

    fn recompute_total(&mut self) {
        self.total = self.items.iter().map(OrderLineItem::line_total).sum();
    }
}
