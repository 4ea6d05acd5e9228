//! Status transitions and the single moment line items are frozen.
//!
//! While an order is `new` its lines may be re-derived from the live catalog
//! on read. Entering `processing` re-prices them one last time and stores the
//! result; from then on nothing re-prices the order again.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{BuyerSnapshot, Order, OrderLineItem, OrderStatus},
    ordering::{OrderingContext, pricing::reprice_lines},
};

pub struct SnapshotFreezer<'a> {
    ctx: OrderingContext<'a>,
}

impl<'a> SnapshotFreezer<'a> {
    pub fn new(ctx: OrderingContext<'a>) -> Self {
        Self { ctx }
    }

    pub async fn apply_status_transition(&self, order_id: Uuid, next: OrderStatus) -> AppResult<Order> {
        let (_guard, mut order) = self.ctx.load_for_update(order_id).await?;
        let current = order.status();
        let now = Utc::now();

        if current.is_terminal() {
            return Err(AppError::BadRequest(format!(
                "order is already {current}; no further changes are accepted"
            )));
        }
        if current == OrderStatus::Processing && next == OrderStatus::New {
            return Err(AppError::BadRequest(
                "an order that left `new` cannot be reopened".into(),
            ));
        }

        let backfilled = self.backfill_buyer(&mut order).await?;

        match (current, next) {
            (OrderStatus::New, OrderStatus::Processing) => {
                let lines = self.final_lines(&order).await?;
                let total: Decimal = lines.iter().map(OrderLineItem::line_total).sum();
                let minimum = self.ctx.rules.min_order_total;
                if total < minimum {
                    return Err(AppError::BadRequest(format!(
                        "cannot finalize: order total {total} is below the minimum order total {minimum}"
                    )));
                }
                order.freeze(lines, now)?;
            }
            (_, OrderStatus::Done | OrderStatus::Cancelled) => order.set_status(next, now),
            _ if current == next => {
                if !backfilled {
                    return Ok(order);
                }
                order.touch(now);
            }
            _ => {
                return Err(AppError::BadRequest(format!(
                    "cannot move order from {current} to {next}"
                )));
            }
        }

        let saved = self.ctx.orders.save(&order).await?;
        tracing::info!(
            %order_id,
            from = %current,
            to = %saved.status(),
            total = %saved.total(),
            "order status changed"
        );
        Ok(saved)
    }

    /// Fill missing buyer identity from the current account. This never touches
    /// line items. Returns whether anything changed.
    pub async fn backfill_buyer(&self, order: &mut Order) -> AppResult<bool> {
        if order.buyer.is_complete() {
            return Ok(false);
        }
        match self.ctx.identity.get_user(order.user_id).await? {
            Some(buyer) => {
                tracing::debug!(order_id = %order.id, "backfilled buyer identity");
                order.set_buyer(buyer);
                Ok(true)
            }
            None => {
                tracing::warn!(order_id = %order.id, user_id = %order.user_id, "buyer missing, identity not backfilled");
                Ok(false)
            }
        }
    }

    /// Orders as they should be shown: drafts re-derived from the current
    /// catalog and account (not persisted), everything else exactly as stored.
    pub async fn live_views(&self, orders: Vec<Order>) -> AppResult<Vec<Order>> {
        let drafts: Vec<&Order> = orders.iter().filter(|o| o.is_new()).collect();
        if drafts.is_empty() {
            return Ok(orders);
        }

        let product_ids: Vec<Uuid> = drafts
            .iter()
            .flat_map(|o| o.items().iter().map(|item| item.product_id))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let catalog = self.ctx.catalog.get_products(&product_ids).await?;

        let mut buyers: HashMap<Uuid, Option<BuyerSnapshot>> = HashMap::new();
        for user_id in drafts.iter().map(|o| o.user_id) {
            if !buyers.contains_key(&user_id) {
                let buyer = self.ctx.identity.get_user(user_id).await?;
                buyers.insert(user_id, buyer);
            }
        }

        orders
            .into_iter()
            .map(|mut order| -> AppResult<Order> {
                if order.is_new() {
                    let lines = reprice_lines(order.items(), &catalog);
                    order.reprice_lines(lines)?;
                    if let Some(Some(buyer)) = buyers.get(&order.user_id) {
                        order.set_buyer(buyer.clone());
                    }
                }
                Ok(order)
            })
            .collect()
    }

    pub async fn live_view(&self, order: Order) -> AppResult<Order> {
        self.live_views(vec![order])
            .await?
            .pop()
            .ok_or(AppError::NotFound)
    }

    async fn final_lines(&self, order: &Order) -> AppResult<Vec<OrderLineItem>> {
        let ids: Vec<Uuid> = order.items().iter().map(|item| item.product_id).collect();
        let catalog = self.ctx.catalog.get_products(&ids).await?;
        Ok(reprice_lines(order.items(), &catalog))
    }
}
