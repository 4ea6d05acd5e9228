use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{ForgotPasswordRequest, LoginRequest, LoginResponse, RegisterRequest},
        backup::Backup,
        orders::{LineRemoval, OrderList, SubmitOrderRequest, UpdateOrderStatusRequest},
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        users::UserList,
    },
    models::{BuyerSnapshot, Order, OrderLineItem, OrderStatus, Product, Role, User},
    ordering::RequestedItem,
    response::{ApiResponse, Meta},
    routes::{auth, backup, health, orders, params, products, users},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::me,
        auth::forgot_password,
        auth::approve_reset,
        auth::reject_reset,
        products::list_products,
        products::list_by_category,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        orders::submit_order,
        orders::list_orders,
        orders::list_my_orders,
        orders::get_order,
        orders::update_order_status,
        orders::delete_order,
        orders::remove_order_item,
        users::list_users,
        users::me,
        users::approve_user,
        users::delete_user,
        backup::export_backup
    ),
    components(
        schemas(
            User,
            Role,
            Product,
            Order,
            OrderStatus,
            OrderLineItem,
            BuyerSnapshot,
            RequestedItem,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            ForgotPasswordRequest,
            CreateProductRequest,
            UpdateProductRequest,
            SubmitOrderRequest,
            UpdateOrderStatusRequest,
            ProductList,
            OrderList,
            LineRemoval,
            UserList,
            Backup,
            params::Pagination,
            params::SortOrder,
            params::ProductSortBy,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<User>,
            ApiResponse<UserList>,
            ApiResponse<Backup>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration, login and password resets"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Orders", description = "Order submission and administration"),
        (name = "Users", description = "Account administration"),
        (name = "Backup", description = "Administrative data export"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
