use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set, Statement};
use uuid::Uuid;
use wholesale_orders_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    dto::{
        orders::{SubmitOrderRequest, UpdateOrderStatusRequest},
        products::UpdateProductRequest,
    },
    entity::{products::ActiveModel as ProductActive, users::ActiveModel as UserActive},
    error::AppError,
    middleware::auth::AuthUser,
    models::{OrderStatus, Role},
    ordering::RequestedItem,
    routes::params::OrderListQuery,
    services::{backup_service, order_service, product_service},
    state::AppState,
};

// Integration flow: customer submits twice into one draft, admin freezes it,
// a later price change leaves the frozen order alone, product deletion only
// touches drafts.
#[tokio::test]
async fn submit_freeze_and_detach_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;

    let customer_id = create_user(&state, Role::Customer, "0501110000").await?;
    let other_id = create_user(&state, Role::Customer, "0502220000").await?;
    let admin_id = create_user(&state, Role::Admin, "0500000000").await?;
    let customer = AuthUser { user_id: customer_id, role: Role::Customer };
    let other = AuthUser { user_id: other_id, role: Role::Customer };
    let admin = AuthUser { user_id: admin_id, role: Role::Admin };

    let groats = create_product(&state, "Buckwheat 1kg", 500, Some((400, 5)), 1).await?;
    let pasta = create_product(&state, "Spaghetti 500g", 1200, None, 1).await?;

    // First submission creates the draft, second merges into it.
    let first = order_service::submit_order(
        &state,
        &customer,
        SubmitOrderRequest {
            products: vec![
                RequestedItem { product_id: groats, quantity: 3 },
                RequestedItem { product_id: pasta, quantity: 1 },
            ],
        },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(first.total(), Decimal::from(2700));

    let merged = order_service::submit_order(
        &state,
        &customer,
        SubmitOrderRequest {
            products: vec![RequestedItem { product_id: groats, quantity: 2 }],
        },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(merged.id, first.id);
    let line = merged.line(groats).expect("groats line");
    assert_eq!(line.quantity, 5);
    assert_eq!(line.unit_price, Decimal::from(400));
    assert_eq!(merged.total(), Decimal::from(3200));

    // Other customers cannot see the order.
    assert!(matches!(
        order_service::get_order(&state, &other, first.id).await,
        Err(AppError::NotFound)
    ));
    assert!(matches!(
        order_service::list_all_orders(&state, &customer, OrderListQuery::default()).await,
        Err(AppError::Forbidden)
    ));

    let frozen = order_service::update_order_status(
        &state,
        &admin,
        first.id,
        UpdateOrderStatusRequest { status: "processing".into() },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(frozen.status(), OrderStatus::Processing);

    product_service::update_product(
        &state,
        &admin,
        groats,
        UpdateProductRequest {
            price: Some(Decimal::from(900)),
            wholesale_price: Some(None),
            ..Default::default()
        },
    )
    .await?;

    let reread = order_service::get_order(&state, &customer, first.id)
        .await?
        .data
        .expect("order");
    assert_eq!(reread.line(groats).expect("groats").unit_price, Decimal::from(400));
    assert_eq!(reread.total(), Decimal::from(3200));

    // A new draft picks up the live price; deleting pasta detaches it from the
    // draft only.
    let draft = order_service::submit_order(
        &state,
        &customer,
        SubmitOrderRequest {
            products: vec![
                RequestedItem { product_id: groats, quantity: 2 },
                RequestedItem { product_id: pasta, quantity: 1 },
            ],
        },
    )
    .await?
    .data
    .expect("order");
    assert_ne!(draft.id, first.id);
    assert_eq!(draft.total(), Decimal::from(3000));

    product_service::delete_product(&state, &admin, pasta).await?;

    let draft = order_service::get_order(&state, &customer, draft.id)
        .await?
        .data
        .expect("order");
    assert!(draft.line(pasta).is_none());
    assert_eq!(draft.total(), Decimal::from(1800));

    let frozen = order_service::get_order(&state, &admin, first.id)
        .await?
        .data
        .expect("order");
    assert!(frozen.line(pasta).is_some());

    let mine = order_service::list_my_orders(&state, &customer, OrderListQuery::default())
        .await?
        .data
        .expect("orders");
    assert_eq!(mine.items.len(), 2);

    let removal = order_service::remove_order_item(&state, &admin, draft.id, groats)
        .await?
        .data
        .expect("removal");
    assert!(removal.order_deleted);
    assert!(matches!(
        order_service::get_order(&state, &admin, draft.id).await,
        Err(AppError::NotFound)
    ));

    // Backup exports everything left: three accounts, groats, the frozen order.
    assert!(matches!(
        backup_service::export_backup(&state, &customer).await,
        Err(AppError::Forbidden)
    ));
    let backup = backup_service::export_backup(&state, &admin)
        .await?
        .data
        .expect("backup");
    assert_eq!(backup.users.len(), 3);
    assert_eq!(backup.products.len(), 1);
    assert_eq!(backup.orders.len(), 1);
    assert_eq!(backup.orders[0].id, first.id);

    Ok(())
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE order_items, orders, audit_logs, products, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    let config = AppConfig {
        database_url: database_url.to_string(),
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "test-secret".into(),
        token_ttl_hours: 1,
        min_order_total: Decimal::from(2000),
        frontend_url: None,
        unapproved_ttl_days: 7,
    };
    Ok(AppState::new(orm, config))
}

async fn create_user(state: &AppState, role: Role, phone: &str) -> anyhow::Result<Uuid> {
    let now = Utc::now();
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        surname: Set(format!("{role} {phone}")),
        street: Set("Test street 1".into()),
        phone: Set(phone.into()),
        password_hash: Set("dummy".into()),
        role: Set(role.as_str().into()),
        is_approved: Set(true),
        approved_at: Set(Some(now.into())),
        reset_hash: Set(None),
        reset_requested_at: Set(None),
        created_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}

async fn create_product(
    state: &AppState,
    name: &str,
    price: i64,
    wholesale: Option<(i64, i32)>,
    min_order: i32,
) -> anyhow::Result<Uuid> {
    let now = Utc::now();
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.into()),
        category: Set("Groceries".into()),
        price: Set(Decimal::from(price)),
        wholesale_price: Set(wholesale.map(|(p, _)| Decimal::from(p))),
        wholesale_min_qty: Set(wholesale.map(|(_, q)| q)),
        min_order: Set(min_order),
        image: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    Ok(product.id)
}
