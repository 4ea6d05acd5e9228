use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::backup::Backup,
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::backup_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(export_backup))
}

#[utoipa::path(
    get,
    path = "/api/backup",
    responses(
        (status = 200, description = "Users, products and orders", body = ApiResponse<Backup>),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Backup"
)]
pub async fn export_backup(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Backup>>> {
    let resp = backup_service::export_backup(&state, &user).await?;
    Ok(Json(resp))
}
