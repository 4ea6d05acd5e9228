//! Order pricing, draft aggregation and snapshot freezing.
//!
//! Everything here talks to persistence only through the [`Catalog`],
//! [`Identity`] and [`OrderStore`] traits, so the rules run unchanged against
//! PostgreSQL or the in-memory store.

use rust_decimal::Decimal;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::Order,
    store::{Catalog, Identity, OrderStore},
};

pub mod aggregator;
pub mod freezer;
pub mod locks;
pub mod order;
pub mod pricing;

pub use aggregator::{OrderAggregator, RequestedItem, RemovedLine};
pub use freezer::SnapshotFreezer;
pub use locks::DraftLocks;

/// Business thresholds; configured, never hard-coded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderingRules {
    /// Smallest total accepted when a new order is created or finalized.
    pub min_order_total: Decimal,
}

impl Default for OrderingRules {
    fn default() -> Self {
        Self {
            min_order_total: Decimal::from(2000),
        }
    }
}

#[derive(Clone, Copy)]
pub struct OrderingContext<'a> {
    pub catalog: &'a dyn Catalog,
    pub identity: &'a dyn Identity,
    pub orders: &'a dyn OrderStore,
    pub rules: &'a OrderingRules,
    pub locks: &'a DraftLocks,
}

impl<'a> OrderingContext<'a> {
    pub fn aggregator(self) -> OrderAggregator<'a> {
        OrderAggregator::new(self)
    }

    pub fn freezer(self) -> SnapshotFreezer<'a> {
        SnapshotFreezer::new(self)
    }

    /// Load an order for mutation. Drafts are re-read under their owner's
    /// draft lock so a concurrent submission cannot interleave.
    pub(crate) async fn load_for_update(
        self,
        order_id: Uuid,
    ) -> AppResult<(Option<OwnedMutexGuard<()>>, Order)> {
        let order = self
            .orders
            .find_order(order_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if !order.is_new() {
            return Ok((None, order));
        }

        let guard = self.locks.acquire(order.user_id).await?;
        let order = self
            .orders
            .find_order(order_id)
            .await?
            .ok_or(AppError::NotFound)?;
        Ok((Some(guard), order))
    }
}
