use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{Order, Product, User};

/// Full export of accounts, catalog and orders as stored.
#[derive(Debug, Serialize, ToSchema)]
pub struct Backup {
    pub generated_at: DateTime<Utc>,
    pub users: Vec<User>,
    pub products: Vec<Product>,
    pub orders: Vec<Order>,
}
