pub mod auth_service;
pub mod backup_service;
pub mod order_service;
pub mod product_service;
pub mod user_service;
