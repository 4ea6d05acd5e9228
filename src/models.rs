use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{products, users};
use crate::ordering::pricing::PriceSchedule;

pub use crate::ordering::order::{BuyerSnapshot, Order, OrderLineItem, OrderStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "customer" => Ok(Role::Customer),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role `{other}`")),
        }
    }
}

/// Account as exposed over the API; never carries password material.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub surname: String,
    pub street: String,
    pub phone: String,
    pub role: Role,
    pub is_approved: bool,
    pub approved_at: Option<DateTime<Utc>>,
    pub reset_requested: bool,
    pub reset_requested_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            surname: model.surname,
            street: model.street,
            phone: model.phone,
            // Unknown roles never gain admin rights.
            role: model.role.parse().unwrap_or(Role::Customer),
            is_approved: model.is_approved,
            approved_at: model.approved_at.map(|dt| dt.with_timezone(&Utc)),
            reset_requested: model.reset_hash.is_some(),
            reset_requested_at: model.reset_requested_at.map(|dt| dt.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub price: Decimal,
    pub wholesale_price: Option<Decimal>,
    pub wholesale_min_qty: Option<i32>,
    pub min_order: i32,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn schedule(&self) -> PriceSchedule {
        PriceSchedule {
            price: self.price,
            wholesale_price: self.wholesale_price,
            wholesale_min_qty: self.wholesale_min_qty,
        }
    }

    /// Smallest quantity a single submission may request.
    pub fn min_order(&self) -> i32 {
        self.min_order.max(1)
    }
}

impl From<products::Model> for Product {
    fn from(model: products::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            category: model.category,
            price: model.price,
            wholesale_price: model.wholesale_price,
            wholesale_min_qty: model.wholesale_min_qty,
            min_order: model.min_order,
            image: model.image,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}
