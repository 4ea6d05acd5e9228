use chrono::{Duration, Utc};
use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wholesale_orders_api::{
    audit,
    config::AppConfig,
    db::create_orm_conn,
    entity::users::{Column as UserCol, Entity as Users},
    models::Role,
};

/// Removes customer accounts that were never approved within the grace period.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wholesale_orders_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let orm = create_orm_conn(&config.database_url).await?;

    let cutoff = Utc::now() - Duration::days(config.unapproved_ttl_days);
    let result = Users::delete_many()
        .filter(
            Condition::all()
                .add(UserCol::IsApproved.eq(false))
                .add(UserCol::Role.eq(Role::Customer.as_str()))
                .add(UserCol::CreatedAt.lt(cutoff)),
        )
        .exec(&orm)
        .await?;

    tracing::info!(
        deleted = result.rows_affected,
        ttl_days = config.unapproved_ttl_days,
        "unapproved accounts removed"
    );
    audit::record(
        &orm,
        None,
        "users_cleanup",
        "users",
        serde_json::json!({ "deleted": result.rows_affected, "cutoff": cutoff }),
    )
    .await;

    Ok(())
}
