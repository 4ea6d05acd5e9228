pub mod auth;
pub mod backup;
pub mod lenient;
pub mod orders;
pub mod products;
pub mod users;
