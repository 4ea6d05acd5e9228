//! In-memory collaborators for tests and local experiments.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::anyhow;
use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{BuyerSnapshot, Order, Product},
    routes::params::SortOrder,
    store::{Catalog, Identity, OrderFilter, OrderPage, OrderStore},
};

/// Catalog, identity and order store backed by `RwLock`ed maps.
#[derive(Clone, Default)]
pub struct MemoryStore {
    products: Arc<RwLock<HashMap<Uuid, Product>>>,
    users: Arc<RwLock<HashMap<Uuid, BuyerSnapshot>>>,
    orders: Arc<RwLock<HashMap<Uuid, Order>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_product(&self, product: Product) -> AppResult<()> {
        let mut products = self.products.write().map_err(lock_err)?;
        products.insert(product.id, product);
        Ok(())
    }

    pub fn remove_product(&self, id: Uuid) -> AppResult<bool> {
        let mut products = self.products.write().map_err(lock_err)?;
        Ok(products.remove(&id).is_some())
    }

    pub fn put_user(&self, id: Uuid, buyer: BuyerSnapshot) -> AppResult<()> {
        let mut users = self.users.write().map_err(lock_err)?;
        users.insert(id, buyer);
        Ok(())
    }

    /// Store an order as-is, bypassing the version check. Used to plant
    /// legacy records.
    pub fn put_order(&self, order: Order) -> AppResult<()> {
        let mut orders = self.orders.write().map_err(lock_err)?;
        orders.insert(order.id, order);
        Ok(())
    }
}

fn lock_err<E: std::fmt::Display>(err: E) -> AppError {
    AppError::Internal(anyhow!("memory store lock poisoned: {err}"))
}

#[async_trait]
impl Catalog for MemoryStore {
    async fn get_products(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, Product>> {
        let products = self.products.read().map_err(lock_err)?;
        Ok(ids
            .iter()
            .filter_map(|id| products.get(id).map(|p| (*id, p.clone())))
            .collect())
    }
}

#[async_trait]
impl Identity for MemoryStore {
    async fn get_user(&self, id: Uuid) -> AppResult<Option<BuyerSnapshot>> {
        let users = self.users.read().map_err(lock_err)?;
        Ok(users.get(&id).cloned())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn find_draft_order(&self, user_id: Uuid) -> AppResult<Option<Order>> {
        let orders = self.orders.read().map_err(lock_err)?;
        Ok(orders
            .values()
            .find(|o| o.user_id == user_id && o.is_new())
            .cloned())
    }

    async fn find_order(&self, id: Uuid) -> AppResult<Option<Order>> {
        let orders = self.orders.read().map_err(lock_err)?;
        Ok(orders.get(&id).cloned())
    }

    async fn save(&self, order: &Order) -> AppResult<Order> {
        let mut orders = self.orders.write().map_err(lock_err)?;

        match orders.get(&order.id) {
            Some(stored) if stored.version() != order.version() => {
                return Err(AppError::Conflict(format!(
                    "order {} was modified concurrently",
                    order.id
                )));
            }
            None if order.version() != 0 => return Err(AppError::NotFound),
            _ => {}
        }

        if order.is_new()
            && orders
                .values()
                .any(|o| o.id != order.id && o.user_id == order.user_id && o.is_new())
        {
            return Err(AppError::Conflict(format!(
                "user {} already has a draft order",
                order.user_id
            )));
        }

        let mut saved = order.clone();
        saved.mark_saved();
        orders.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn delete_order(&self, id: Uuid) -> AppResult<bool> {
        let mut orders = self.orders.write().map_err(lock_err)?;
        Ok(orders.remove(&id).is_some())
    }

    async fn list_orders(&self, filter: &OrderFilter) -> AppResult<OrderPage> {
        let orders = self.orders.read().map_err(lock_err)?;
        let mut matching: Vec<Order> = orders
            .values()
            .filter(|o| filter.user_id.is_none_or(|id| o.user_id == id))
            .filter(|o| filter.status.is_none_or(|s| o.status() == s))
            .filter(|o| filter.product_id.is_none_or(|id| o.line(id).is_some()))
            .cloned()
            .collect();

        match filter.sort_order.unwrap_or(SortOrder::Desc) {
            SortOrder::Asc => matching.sort_by_key(|o| o.created_at),
            SortOrder::Desc => matching.sort_by_key(|o| std::cmp::Reverse(o.created_at)),
        }

        let total = matching.len() as u64;
        let limit = filter.limit.unwrap_or(u64::MAX);
        let items = matching
            .into_iter()
            .skip(filter.offset as usize)
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect();

        Ok(OrderPage { items, total })
    }
}
