use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use uuid::Uuid;

use crate::{
    audit,
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    entity::products::{ActiveModel, Column, Entity as Products},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

/// URL-safe form of a category name: lowercase, every run of
/// non-alphanumeric characters becomes a single `-`, no leading or trailing
/// dashes. Letters outside ASCII are kept.
pub fn category_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.trim().chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// `ILIKE` pattern matching `text` literally anywhere. Postgres treats `\` as
/// the default escape character.
fn contains_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// Stored category names whose slug equals `slug`.
async fn categories_matching(state: &AppState, slug: &str) -> AppResult<Vec<String>> {
    let wanted = category_slug(slug);
    let names: Vec<String> = Products::find()
        .select_only()
        .column(Column::Category)
        .distinct()
        .into_tuple::<String>()
        .all(&state.orm)
        .await?;
    Ok(names
        .into_iter()
        .filter(|name| category_slug(name) == wanted)
        .collect())
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().filter(|s| !s.trim().is_empty()) {
        let pattern = contains_pattern(search.trim());
        condition = condition.add(Expr::col(Column::Name).ilike(pattern));
    }

    if let Some(slug) = query.category.as_ref().filter(|s| !s.trim().is_empty()) {
        let names = categories_matching(state, slug).await?;
        condition = condition.add(Column::Category.is_in(names));
    }

    if let Some(min_price) = query.min_price.and_then(Decimal::from_f64_retain) {
        condition = condition.add(Column::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price.and_then(Decimal::from_f64_retain) {
        condition = condition.add(Column::Price.lte(max_price));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::Name,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn list_by_category(
    state: &AppState,
    slug: &str,
) -> AppResult<ApiResponse<ProductList>> {
    let names = categories_matching(state, slug).await?;
    let items: Vec<Product> = Products::find()
        .filter(Column::Category.is_in(names))
        .order_by_desc(Column::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(Meta::new(1, total, total)),
    ))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(Product::from)
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Product", product, None))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let name = required_text("name", &payload.name)?;
    let category = required_text("category", &payload.category)?;
    validate_price(payload.price)?;
    let min_order = validate_min_order(payload.min_order.unwrap_or(1))?;

    let now = Utc::now();
    let product = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        category: Set(category),
        price: Set(payload.price),
        wholesale_price: Set(payload.wholesale_price),
        wholesale_min_qty: Set(payload.wholesale_min_qty),
        min_order: Set(min_order),
        image: Set(payload.image.filter(|url| !url.trim().is_empty())),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(product_id = %product.id, "product created");
    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(required_text("name", &name)?);
    }
    if let Some(category) = payload.category {
        active.category = Set(required_text("category", &category)?);
    }
    if let Some(price) = payload.price {
        validate_price(price)?;
        active.price = Set(price);
    }
    if let Some(wholesale_price) = payload.wholesale_price {
        active.wholesale_price = Set(wholesale_price);
    }
    if let Some(wholesale_min_qty) = payload.wholesale_min_qty {
        active.wholesale_min_qty = Set(wholesale_min_qty);
    }
    if let Some(min_order) = payload.min_order {
        active.min_order = Set(validate_min_order(min_order)?);
    }
    if let Some(image) = payload.image {
        active.image = Set(Some(image).filter(|url| !url.trim().is_empty()));
    }
    active.updated_at = Set(Utc::now().into());

    let product = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = Products::delete_by_id(id).exec(&state.orm).await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    let detached = state.ordering().aggregator().detach_product(id).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id, "orders_updated": detached }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({ "orders_updated": detached }),
        Some(Meta::empty()),
    ))
}

fn required_text(field: &str, value: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn validate_price(price: Decimal) -> AppResult<()> {
    if price.is_sign_negative() {
        return Err(AppError::BadRequest("price cannot be negative".into()));
    }
    Ok(())
}

fn validate_min_order(min_order: i32) -> AppResult<i32> {
    if min_order < 1 {
        return Err(AppError::BadRequest("min_order must be at least 1".into()));
    }
    Ok(min_order)
}
