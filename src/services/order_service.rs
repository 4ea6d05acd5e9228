use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{LineRemoval, OrderList, SubmitOrderRequest, UpdateOrderStatusRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, OrderStatus},
    ordering::RemovedLine,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
    store::OrderFilter,
};

pub async fn submit_order(
    state: &AppState,
    user: &AuthUser,
    payload: SubmitOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    let order = state
        .ordering()
        .aggregator()
        .submit_items(user.user_id, &payload.products)
        .await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_submit",
        "orders",
        serde_json::json!({ "order_id": order.id, "lines": payload.products.len() }),
    )
    .await;

    Ok(ApiResponse::success("Order placed", order, Some(Meta::empty())))
}

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    list_with(state, None, query).await
}

pub async fn list_my_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    list_with(state, Some(user.user_id), query).await
}

async fn list_with(
    state: &AppState,
    user_id: Option<Uuid>,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(str::parse::<OrderStatus>)
        .transpose()?;

    let filter = OrderFilter {
        user_id,
        status,
        product_id: None,
        sort_order: Some(query.sort_order.unwrap_or(SortOrder::Desc)),
        limit: Some(limit as u64),
        offset: offset as u64,
    };

    let ctx = state.ordering();
    let found = ctx.orders.list_orders(&filter).await?;
    let items = ctx.freezer().live_views(found.items).await?;

    let meta = Meta::new(page, limit, found.total as i64);
    Ok(ApiResponse::success("Ok", OrderList { items }, Some(meta)))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let ctx = state.ordering();
    let order = ctx.orders.find_order(id).await?.ok_or(AppError::NotFound)?;
    // Other customers' orders are reported as missing.
    if order.user_id != user.user_id && !user.is_admin() {
        return Err(AppError::NotFound);
    }

    let order = ctx.freezer().live_view(order).await?;
    Ok(ApiResponse::success("OK", order, Some(Meta::empty())))
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    let next: OrderStatus = payload.status.parse()?;

    let order = state
        .ordering()
        .freezer()
        .apply_status_transition(id, next)
        .await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": id, "status": next.as_str() }),
    )
    .await;

    Ok(ApiResponse::success("Order updated", order, Some(Meta::empty())))
}

pub async fn delete_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    if !state.ordering().orders.delete_order(id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(order_id = %id, "order deleted");

    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_delete",
        "orders",
        serde_json::json!({ "order_id": id }),
    )
    .await;

    Ok(ApiResponse::message_only("Order deleted"))
}

pub async fn remove_order_item(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    product_id: Uuid,
) -> AppResult<ApiResponse<LineRemoval>> {
    ensure_admin(user)?;
    let outcome = state
        .ordering()
        .aggregator()
        .remove_line_item(id, product_id)
        .await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_item_remove",
        "orders",
        serde_json::json!({ "order_id": id, "product_id": product_id }),
    )
    .await;

    let (message, data) = match outcome {
        RemovedLine::Updated(order) => (
            "Item removed",
            LineRemoval { order: Some(order), order_deleted: false },
        ),
        RemovedLine::OrderDeleted => (
            "Item removed, order was empty and has been deleted",
            LineRemoval { order: None, order_deleted: true },
        ),
    };
    Ok(ApiResponse::success(message, data, Some(Meta::empty())))
}
