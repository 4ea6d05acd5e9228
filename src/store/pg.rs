//! PostgreSQL collaborators built on the sea-orm entities.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::{Expr, Query},
};
use uuid::Uuid;

use crate::{
    entity::{
        order_items::{self, ActiveModel as OrderItemActive, Column as ItemCol, Entity as OrderItems},
        orders::{self, ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        products::{Column as ProdCol, Entity as Products},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    models::{BuyerSnapshot, Order, OrderLineItem, OrderStatus, Product},
    ordering::order::OrderParts,
    routes::params::SortOrder,
    store::{Catalog, Identity, OrderFilter, OrderPage, OrderStore},
};

#[derive(Debug, Clone)]
pub struct PgStore {
    orm: DatabaseConnection,
}

impl PgStore {
    pub fn new(orm: DatabaseConnection) -> Self {
        Self { orm }
    }

    async fn load_items(&self, order_ids: &[Uuid]) -> AppResult<HashMap<Uuid, Vec<OrderLineItem>>> {
        let mut grouped: HashMap<Uuid, Vec<OrderLineItem>> = HashMap::new();
        if order_ids.is_empty() {
            return Ok(grouped);
        }

        let rows = OrderItems::find()
            .filter(ItemCol::OrderId.is_in(order_ids.iter().copied()))
            .order_by_asc(ItemCol::OrderId)
            .order_by_asc(ItemCol::Position)
            .all(&self.orm)
            .await?;

        for row in rows {
            grouped.entry(row.order_id).or_default().push(OrderLineItem {
                product_id: row.product_id,
                name: row.name,
                unit_price: row.unit_price,
                quantity: row.quantity,
            });
        }
        Ok(grouped)
    }

    async fn hydrate(&self, models: Vec<orders::Model>) -> AppResult<Vec<Order>> {
        let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
        let mut items = self.load_items(&ids).await?;
        models
            .into_iter()
            .map(|model| {
                let lines = items.remove(&model.id).unwrap_or_default();
                order_from_entity(model, lines)
            })
            .collect()
    }
}

#[async_trait]
impl Catalog for PgStore {
    async fn get_products(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, Product>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let products = Products::find()
            .filter(ProdCol::Id.is_in(ids.iter().copied()))
            .all(&self.orm)
            .await?
            .into_iter()
            .map(|model| (model.id, Product::from(model)))
            .collect();
        Ok(products)
    }
}

#[async_trait]
impl Identity for PgStore {
    async fn get_user(&self, id: Uuid) -> AppResult<Option<BuyerSnapshot>> {
        let user = Users::find_by_id(id).one(&self.orm).await?;
        Ok(user.map(|u| BuyerSnapshot {
            name: u.surname,
            phone: u.phone,
            street: u.street,
        }))
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn find_draft_order(&self, user_id: Uuid) -> AppResult<Option<Order>> {
        let model = Orders::find()
            .filter(
                Condition::all()
                    .add(OrderCol::UserId.eq(user_id))
                    .add(OrderCol::Status.eq(OrderStatus::New.as_str())),
            )
            .one(&self.orm)
            .await?;
        match model {
            Some(model) => Ok(self.hydrate(vec![model]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn find_order(&self, id: Uuid) -> AppResult<Option<Order>> {
        match Orders::find_by_id(id).one(&self.orm).await? {
            Some(model) => Ok(self.hydrate(vec![model]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn save(&self, order: &Order) -> AppResult<Order> {
        let txn = self.orm.begin().await?;
        let now = Utc::now();

        if order.version() == 0 {
            OrderActive {
                id: Set(order.id),
                user_id: Set(order.user_id),
                user_name: Set(non_empty(&order.buyer.name)),
                user_phone: Set(non_empty(&order.buyer.phone)),
                user_street: Set(non_empty(&order.buyer.street)),
                total_amount: Set(order.total()),
                status: Set(order.status().as_str().to_string()),
                contact: Set(order.contact.clone()),
                version: Set(1),
                frozen_at: Set(order.frozen_at.map(Into::into)),
                created_at: Set(order.created_at.into()),
                updated_at: Set(now.into()),
            }
            .insert(&txn)
            .await?;
        } else {
            let result = Orders::update_many()
                .col_expr(OrderCol::UserName, Expr::value(non_empty(&order.buyer.name)))
                .col_expr(OrderCol::UserPhone, Expr::value(non_empty(&order.buyer.phone)))
                .col_expr(OrderCol::UserStreet, Expr::value(non_empty(&order.buyer.street)))
                .col_expr(OrderCol::TotalAmount, Expr::value(order.total()))
                .col_expr(OrderCol::Status, Expr::value(order.status().as_str()))
                .col_expr(OrderCol::Contact, Expr::value(order.contact.clone()))
                .col_expr(
                    OrderCol::FrozenAt,
                    Expr::value(order.frozen_at.map(sea_orm::prelude::DateTimeWithTimeZone::from)),
                )
                .col_expr(OrderCol::UpdatedAt, Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(now)))
                .col_expr(OrderCol::Version, Expr::col(OrderCol::Version).add(1))
                .filter(OrderCol::Id.eq(order.id))
                .filter(OrderCol::Version.eq(order.version()))
                .exec(&txn)
                .await?;

            if result.rows_affected == 0 {
                let exists = Orders::find_by_id(order.id).count(&txn).await? > 0;
                return Err(if exists {
                    AppError::Conflict(format!("order {} was modified concurrently", order.id))
                } else {
                    AppError::NotFound
                });
            }

            OrderItems::delete_many()
                .filter(ItemCol::OrderId.eq(order.id))
                .exec(&txn)
                .await?;
        }

        let rows: Vec<OrderItemActive> = order
            .items()
            .iter()
            .enumerate()
            .map(|(position, item)| OrderItemActive {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                product_id: Set(item.product_id),
                position: Set(i32::try_from(position).unwrap_or(i32::MAX)),
                name: Set(item.name.clone()),
                unit_price: Set(item.unit_price),
                quantity: Set(item.quantity),
                created_at: Set(now.into()),
            })
            .collect();
        if !rows.is_empty() {
            OrderItems::insert_many(rows).exec(&txn).await?;
        }

        txn.commit().await?;

        let mut saved = order.clone();
        saved.touch(now);
        saved.mark_saved();
        Ok(saved)
    }

    async fn delete_order(&self, id: Uuid) -> AppResult<bool> {
        let result = Orders::delete_by_id(id).exec(&self.orm).await?;
        Ok(result.rows_affected > 0)
    }

    async fn list_orders(&self, filter: &OrderFilter) -> AppResult<OrderPage> {
        let mut condition = Condition::all();
        if let Some(user_id) = filter.user_id {
            condition = condition.add(OrderCol::UserId.eq(user_id));
        }
        if let Some(status) = filter.status {
            condition = condition.add(OrderCol::Status.eq(status.as_str()));
        }
        if let Some(product_id) = filter.product_id {
            condition = condition.add(
                OrderCol::Id.in_subquery(
                    Query::select()
                        .column(ItemCol::OrderId)
                        .from(order_items::Entity)
                        .and_where(ItemCol::ProductId.eq(product_id))
                        .to_owned(),
                ),
            );
        }

        let mut finder = Orders::find().filter(condition);
        finder = match filter.sort_order.unwrap_or(SortOrder::Desc) {
            SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
            SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
        };

        let total = finder.clone().count(&self.orm).await?;

        let mut paged = finder.offset(filter.offset);
        if let Some(limit) = filter.limit {
            paged = paged.limit(limit);
        }
        let models = paged.all(&self.orm).await?;

        Ok(OrderPage {
            items: self.hydrate(models).await?,
            total,
        })
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn order_from_entity(model: orders::Model, items: Vec<OrderLineItem>) -> AppResult<Order> {
    let status: OrderStatus = model.status.parse()?;
    Ok(Order::restore(OrderParts {
        id: model.id,
        user_id: model.user_id,
        buyer: BuyerSnapshot {
            name: model.user_name.unwrap_or_default(),
            phone: model.user_phone.unwrap_or_default(),
            street: model.user_street.unwrap_or_default(),
        },
        items,
        status,
        contact: model.contact,
        version: model.version,
        frozen_at: model.frozen_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }))
}
