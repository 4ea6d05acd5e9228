use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;
use wholesale_orders_api::{
    config::AppConfig,
    db::{OrmConn, create_orm_conn, run_migrations},
    entity::{
        products::{self, Column as ProdCol, Entity as Products},
        users::{self, Column as UserCol, Entity as Users},
    },
    models::Role,
    services::auth_service::hash_password,
};

struct SeedProduct {
    name: &'static str,
    category: &'static str,
    price: Decimal,
    wholesale: Option<(Decimal, i32)>,
    min_order: i32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let admin_id = ensure_user(&orm, "Admin", "0000000000", "admin123", Role::Admin).await?;
    let user_id = ensure_user(&orm, "Customer", "0501234567", "user123", Role::Customer).await?;
    seed_products(&orm).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    orm: &OrmConn,
    surname: &str,
    phone: &str,
    password: &str,
    role: Role,
) -> anyhow::Result<Uuid> {
    let now = Utc::now();
    let existing = Users::find()
        .filter(UserCol::Phone.eq(phone))
        .one(orm)
        .await?;

    // Existing accounts keep their password; role and approval are enforced.
    let user_id = match existing {
        Some(model) => {
            let mut active: users::ActiveModel = model.into();
            active.role = Set(role.as_str().to_string());
            active.is_approved = Set(true);
            active.update(orm).await?.id
        }
        None => {
            users::ActiveModel {
                id: Set(Uuid::new_v4()),
                surname: Set(surname.to_string()),
                street: Set("1 Warehouse Street".to_string()),
                phone: Set(phone.to_string()),
                password_hash: Set(hash_password(password)?),
                role: Set(role.as_str().to_string()),
                is_approved: Set(true),
                approved_at: Set(Some(now.into())),
                reset_hash: Set(None),
                reset_requested_at: Set(None),
                created_at: Set(now.into()),
            }
            .insert(orm)
            .await?
            .id
        }
    };

    println!("Ensured user {phone} (role={role})");
    Ok(user_id)
}

async fn seed_products(orm: &OrmConn) -> anyhow::Result<()> {
    let catalog = [
        SeedProduct {
            name: "Buckwheat 1kg",
            category: "Packaged groats",
            price: Decimal::new(6500, 2),
            wholesale: Some((Decimal::new(5800, 2), 20)),
            min_order: 5,
        },
        SeedProduct {
            name: "Spaghetti 500g",
            category: "Pasta",
            price: Decimal::new(4200, 2),
            wholesale: Some((Decimal::new(3700, 2), 24)),
            min_order: 6,
        },
        SeedProduct {
            name: "Sunflower oil 1L",
            category: "Oil",
            price: Decimal::new(8900, 2),
            wholesale: Some((Decimal::new(8100, 2), 15)),
            min_order: 3,
        },
        SeedProduct {
            name: "Black tea 100 bags",
            category: "Tea, coffee, drinks",
            price: Decimal::new(12500, 2),
            wholesale: None,
            min_order: 1,
        },
    ];

    let now = Utc::now();
    for item in catalog {
        let exists = Products::find()
            .filter(ProdCol::Name.eq(item.name))
            .one(orm)
            .await?
            .is_some();
        if exists {
            continue;
        }

        products::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(item.name.to_string()),
            category: Set(item.category.to_string()),
            price: Set(item.price),
            wholesale_price: Set(item.wholesale.map(|(price, _)| price)),
            wholesale_min_qty: Set(item.wholesale.map(|(_, qty)| qty)),
            min_order: Set(item.min_order),
            image: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(orm)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
