use chrono::Utc;
use sea_orm::{EntityTrait, QueryOrder};

use crate::{
    audit,
    dto::backup::Backup,
    entity::{
        products::{Column as ProductCol, Entity as Products},
        users::{Column as UserCol, Entity as Users},
    },
    error::AppResult,
    middleware::auth::{AuthUser, ensure_admin},
    models::{Product, User},
    response::{ApiResponse, Meta},
    routes::params::SortOrder,
    state::AppState,
    store::OrderFilter,
};

/// Orders are exported as stored; drafts are not re-priced.
pub async fn export_backup(state: &AppState, admin: &AuthUser) -> AppResult<ApiResponse<Backup>> {
    ensure_admin(admin)?;

    let users = Users::find()
        .order_by_asc(UserCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(User::from)
        .collect::<Vec<_>>();

    let products = Products::find()
        .order_by_asc(ProductCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect::<Vec<_>>();

    let orders = state
        .ordering()
        .orders
        .list_orders(&OrderFilter {
            sort_order: Some(SortOrder::Asc),
            ..OrderFilter::default()
        })
        .await?
        .items;

    tracing::info!(
        users = users.len(),
        products = products.len(),
        orders = orders.len(),
        "backup exported"
    );
    audit::record(
        &state.orm,
        Some(admin.user_id),
        "backup_export",
        "backup",
        serde_json::json!({
            "users": users.len(),
            "products": products.len(),
            "orders": orders.len(),
        }),
    )
    .await;

    let backup = Backup {
        generated_at: Utc::now(),
        users,
        products,
        orders,
    };
    Ok(ApiResponse::success("Backup", backup, Some(Meta::empty())))
}
