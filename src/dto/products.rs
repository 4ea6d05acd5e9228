use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::dto::lenient;
use crate::models::Product;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    pub category: String,
    #[serde(default, deserialize_with = "lenient::decimal_or_zero")]
    #[schema(value_type = f64)]
    pub price: Decimal,
    #[serde(default, deserialize_with = "lenient::optional_decimal")]
    #[schema(value_type = Option<f64>)]
    pub wholesale_price: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient::optional_count")]
    #[schema(value_type = Option<i32>)]
    pub wholesale_min_qty: Option<i32>,
    #[serde(default, deserialize_with = "lenient::optional_count")]
    #[schema(value_type = Option<i32>)]
    pub min_order: Option<i32>,
    pub image: Option<String>,
}

/// Partial update. For the wholesale fields an explicit `null` (or a value
/// that does not parse) clears the tier.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient::patch_decimal_or_zero")]
    #[schema(value_type = Option<f64>)]
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient::patch_optional_decimal")]
    #[schema(value_type = Option<f64>)]
    pub wholesale_price: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "lenient::patch_optional_count")]
    #[schema(value_type = Option<i32>)]
    pub wholesale_min_qty: Option<Option<i32>>,
    #[serde(default, deserialize_with = "lenient::optional_count")]
    #[schema(value_type = Option<i32>)]
    pub min_order: Option<i32>,
    pub image: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ProductList {
    pub items: Vec<Product>,
}
