//! Merging customer submissions into the standing draft order.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Order, OrderStatus, Product},
    ordering::{OrderingContext, pricing::price_line},
    store::OrderFilter,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RequestedItem {
    pub product_id: Uuid,
    pub quantity: i64,
}

/// Outcome of removing a single line item.
#[derive(Debug, Clone)]
pub enum RemovedLine {
    Updated(Order),
    /// The last line went away and the order with it.
    OrderDeleted,
}

pub struct OrderAggregator<'a> {
    ctx: OrderingContext<'a>,
}

impl<'a> OrderAggregator<'a> {
    pub fn new(ctx: OrderingContext<'a>) -> Self {
        Self { ctx }
    }

    /// Price `requested` against the current catalog and merge it into the
    /// user's draft, creating the draft when there is none.
    pub async fn submit_items(&self, user_id: Uuid, requested: &[RequestedItem]) -> AppResult<Order> {
        let wanted = consolidate(requested)?;
        let ids: Vec<Uuid> = wanted.iter().map(|(id, _)| *id).collect();
        let catalog = self.ctx.catalog.get_products(&ids).await?;
        check_min_order(&wanted, &catalog)?;

        let buyer = self
            .ctx
            .identity
            .get_user(user_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let _guard = self.ctx.locks.acquire(user_id).await?;
        let now = Utc::now();

        let order = match self.ctx.orders.find_draft_order(user_id).await? {
            Some(mut draft) => {
                draft.set_buyer(buyer);
                merge_into(&mut draft, &wanted, &catalog)?;
                draft.touch(now);
                tracing::debug!(order_id = %draft.id, %user_id, "merged into draft");
                draft
            }
            None => {
                let mut order = Order::new_draft(user_id, buyer, now);
                merge_into(&mut order, &wanted, &catalog)?;
                let minimum = self.ctx.rules.min_order_total;
                if order.total() < minimum {
                    return Err(AppError::BadRequest(format!(
                        "minimum order total is {minimum}, this order totals {}",
                        order.total()
                    )));
                }
                order
            }
        };

        let saved = self.ctx.orders.save(&order).await?;
        tracing::info!(
            order_id = %saved.id,
            %user_id,
            total = %saved.total(),
            lines = saved.items().len(),
            "order submitted"
        );
        Ok(saved)
    }

    /// Administrative removal of one line. The total is recomputed from the
    /// stored prices; an order left without lines is deleted.
    pub async fn remove_line_item(&self, order_id: Uuid, product_id: Uuid) -> AppResult<RemovedLine> {
        let (_guard, mut order) = self.ctx.load_for_update(order_id).await?;
        if !order.remove_line(product_id) {
            return Err(AppError::NotFound);
        }

        if order.is_empty() {
            self.ctx.orders.delete_order(order.id).await?;
            tracing::info!(%order_id, %product_id, "last line removed, order deleted");
            return Ok(RemovedLine::OrderDeleted);
        }

        let saved = self.ctx.orders.save(&order).await?;
        tracing::info!(%order_id, %product_id, total = %saved.total(), "line removed");
        Ok(RemovedLine::Updated(saved))
    }

    /// Drop a deleted product from every live (`new`) order. Orders that have
    /// left `new` keep their copied line. Returns how many orders changed.
    pub async fn detach_product(&self, product_id: Uuid) -> AppResult<u64> {
        let drafts = self
            .ctx
            .orders
            .list_orders(&OrderFilter {
                status: Some(OrderStatus::New),
                product_id: Some(product_id),
                ..OrderFilter::default()
            })
            .await?;

        let mut touched = 0;
        for draft in drafts.items {
            let (_guard, mut order) = match self.ctx.load_for_update(draft.id).await {
                Ok(loaded) => loaded,
                Err(AppError::NotFound) => continue,
                Err(err) => return Err(err),
            };
            if !order.is_new() || !order.remove_line(product_id) {
                continue;
            }

            if order.is_empty() {
                self.ctx.orders.delete_order(order.id).await?;
            } else {
                self.ctx.orders.save(&order).await?;
            }
            touched += 1;
        }

        tracing::info!(%product_id, orders = touched, "product detached from drafts");
        Ok(touched)
    }
}

/// Validate quantities and fold repeated products into one entry, keeping the
/// order in which products first appear.
fn consolidate(requested: &[RequestedItem]) -> AppResult<Vec<(Uuid, i32)>> {
    if requested.is_empty() {
        return Err(AppError::BadRequest(
            "empty order: at least one product is required".into(),
        ));
    }

    let mut wanted: Vec<(Uuid, i32)> = Vec::with_capacity(requested.len());
    for item in requested {
        let quantity = i32::try_from(item.quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| {
                AppError::BadRequest(format!(
                    "quantity for product {} must be a positive integer, got {}",
                    item.product_id, item.quantity
                ))
            })?;

        match wanted.iter_mut().find(|(id, _)| *id == item.product_id) {
            Some((_, existing)) => {
                *existing = existing.checked_add(quantity).ok_or_else(|| {
                    AppError::BadRequest(format!(
                        "quantity for product {} is too large",
                        item.product_id
                    ))
                })?;
            }
            None => wanted.push((item.product_id, quantity)),
        }
    }
    Ok(wanted)
}

fn check_min_order(wanted: &[(Uuid, i32)], catalog: &HashMap<Uuid, Product>) -> AppResult<()> {
    for (id, quantity) in wanted {
        let Some(product) = catalog.get(id) else {
            continue;
        };
        if *quantity < product.min_order() {
            return Err(AppError::BadRequest(format!(
                "product `{}` ({}) requires a minimum order quantity of {}, got {}",
                product.name,
                id,
                product.min_order(),
                quantity
            )));
        }
    }
    Ok(())
}

/// Accumulate quantities and price each touched line at its merged quantity.
/// Every sum is checked before the first line changes.
fn merge_into(
    order: &mut Order,
    wanted: &[(Uuid, i32)],
    catalog: &HashMap<Uuid, Product>,
) -> AppResult<()> {
    let merged = wanted
        .iter()
        .map(|(id, quantity)| Ok((*id, order.merged_quantity(*id, *quantity)?)))
        .collect::<AppResult<Vec<_>>>()?;
    for (id, quantity) in merged {
        order.upsert_line(price_line(id, catalog.get(&id), quantity))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_repeated_products() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let wanted = consolidate(&[
            RequestedItem { product_id: a, quantity: 3 },
            RequestedItem { product_id: b, quantity: 1 },
            RequestedItem { product_id: a, quantity: 2 },
        ])
        .unwrap();
        assert_eq!(wanted, vec![(a, 5), (b, 1)]);
    }

    #[test]
    fn rejects_non_positive_and_oversized_quantities() {
        let id = Uuid::new_v4();
        for quantity in [0, -1, i64::from(i32::MAX) + 1] {
            let err = consolidate(&[RequestedItem { product_id: id, quantity }]).unwrap_err();
            assert!(matches!(err, AppError::BadRequest(msg) if msg.contains(&id.to_string())));
        }
    }

    #[test]
    fn rejects_empty_submission() {
        let err = consolidate(&[]).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg.contains("empty order")));
    }
}
