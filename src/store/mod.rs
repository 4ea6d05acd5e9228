//! Boundaries the ordering core talks to: catalog, identity and order storage.

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{BuyerSnapshot, Order, OrderStatus, Product},
    routes::params::SortOrder,
};

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

#[async_trait]
pub trait Catalog: Send + Sync {
    /// Current records for `ids`. Unknown ids are simply absent from the map.
    async fn get_products(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, Product>>;

    async fn get_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        Ok(self.get_products(&[id]).await?.remove(&id))
    }
}

#[async_trait]
pub trait Identity: Send + Sync {
    async fn get_user(&self, id: Uuid) -> AppResult<Option<BuyerSnapshot>>;
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
    pub product_id: Option<Uuid>,
    pub sort_order: Option<SortOrder>,
    pub limit: Option<u64>,
    pub offset: u64,
}

#[derive(Debug, Clone, Default)]
pub struct OrderPage {
    pub items: Vec<Order>,
    pub total: u64,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// The user's single order in status `new`, if any.
    async fn find_draft_order(&self, user_id: Uuid) -> AppResult<Option<Order>>;

    async fn find_order(&self, id: Uuid) -> AppResult<Option<Order>>;

    /// Insert (version 0) or conditionally update the order and its lines.
    /// A version mismatch yields `AppError::Conflict`.
    async fn save(&self, order: &Order) -> AppResult<Order>;

    /// Returns whether an order was removed.
    async fn delete_order(&self, id: Uuid) -> AppResult<bool>;

    async fn list_orders(&self, filter: &OrderFilter) -> AppResult<OrderPage>;
}
