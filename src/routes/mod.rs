use axum::Router;

use crate::state::AppState;

pub mod auth;
pub mod backup;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod products;
pub mod users;

// State is attached once at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/products", products::router())
        .nest("/auth", auth::router())
        .nest("/orders", orders::router())
        .nest("/users", users::router())
        .nest("/backup", backup::router())
}
