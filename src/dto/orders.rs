use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Order;
use crate::ordering::RequestedItem;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitOrderRequest {
    pub products: Vec<RequestedItem>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LineRemoval {
    /// The recomputed order, absent when removing the line emptied it.
    pub order: Option<Order>,
    pub order_deleted: bool,
}
