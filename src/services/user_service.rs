use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::users::UserList,
    entity::users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Role, User},
    response::{ApiResponse, Meta},
    routes::params::UserListQuery,
    state::AppState,
};

pub async fn list_users(
    state: &AppState,
    user: &AuthUser,
    query: UserListQuery,
) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(approved) = query.approved {
        condition = condition.add(UserCol::IsApproved.eq(approved));
    }
    match query.reset_requested {
        Some(true) => condition = condition.add(UserCol::ResetHash.is_not_null()),
        Some(false) => condition = condition.add(UserCol::ResetHash.is_null()),
        None => {}
    }

    let finder = Users::find()
        .filter(condition)
        .order_by_desc(UserCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(User::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Users", UserList { items }, Some(meta)))
}

pub async fn approve_user(
    state: &AppState,
    admin: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(admin)?;
    let account = Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: UserActive = account.into();
    active.is_approved = Set(true);
    active.approved_at = Set(Some(Utc::now().into()));
    let account = active.update(&state.orm).await?;

    tracing::info!(user_id = %id, "user approved");
    audit::record(
        &state.orm,
        Some(admin.user_id),
        "user_approve",
        "users",
        serde_json::json!({ "user_id": id }),
    )
    .await;

    Ok(ApiResponse::success("User approved", User::from(account), Some(Meta::empty())))
}

/// Remove a customer account. Orders keep the buyer identity copied onto them.
pub async fn delete_user(
    state: &AppState,
    admin: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(admin)?;
    let account = Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    if User::from(account).role == Role::Admin {
        return Err(AppError::Forbidden);
    }

    Users::delete_by_id(id).exec(&state.orm).await?;

    tracing::info!(user_id = %id, "user deleted");
    audit::record(
        &state.orm,
        Some(admin.user_id),
        "user_delete",
        "users",
        serde_json::json!({ "user_id": id }),
    )
    .await;

    Ok(ApiResponse::message_only("User deleted"))
}
