use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;
use wholesale_orders_api::{
    error::AppError,
    models::{BuyerSnapshot, Order, OrderLineItem, OrderStatus, Product},
    ordering::{
        DraftLocks, OrderingContext, OrderingRules, RemovedLine, RequestedItem,
        order::OrderParts, pricing::REMOVED_PRODUCT_NAME,
    },
    store::{MemoryStore, OrderFilter, OrderStore},
};

struct Fixture {
    store: MemoryStore,
    rules: OrderingRules,
    locks: DraftLocks,
}

impl Fixture {
    fn new() -> Self {
        Self::with_minimum(Decimal::from(2000))
    }

    fn with_minimum(min_order_total: Decimal) -> Self {
        Self {
            store: MemoryStore::new(),
            rules: OrderingRules { min_order_total },
            locks: DraftLocks::new(),
        }
    }

    fn ctx(&self) -> OrderingContext<'_> {
        OrderingContext {
            catalog: &self.store,
            identity: &self.store,
            orders: &self.store,
            rules: &self.rules,
            locks: &self.locks,
        }
    }

    fn customer(&self) -> anyhow::Result<Uuid> {
        let id = Uuid::new_v4();
        self.store.put_user(id, buyer())?;
        Ok(id)
    }

    fn product(
        &self,
        name: &str,
        price: i64,
        wholesale: Option<(i64, i32)>,
        min_order: i32,
    ) -> anyhow::Result<Product> {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            category: "Groceries".to_string(),
            price: Decimal::from(price),
            wholesale_price: wholesale.map(|(p, _)| Decimal::from(p)),
            wholesale_min_qty: wholesale.map(|(_, q)| q),
            min_order,
            image: None,
            created_at: now,
            updated_at: now,
        };
        self.store.put_product(product.clone())?;
        Ok(product)
    }

    /// New retail price and label; the wholesale tier is dropped.
    fn reprice(&self, product: &Product, price: i64) -> anyhow::Result<()> {
        let mut changed = product.clone();
        changed.price = Decimal::from(price);
        changed.wholesale_price = None;
        changed.wholesale_min_qty = None;
        changed.name = format!("{} (new label)", product.name);
        self.store.put_product(changed)?;
        Ok(())
    }
}

fn buyer() -> BuyerSnapshot {
    BuyerSnapshot {
        name: "Shevchenko".into(),
        phone: "+380671234567".into(),
        street: "Sadova 12".into(),
    }
}

fn item(product: &Product, quantity: i64) -> RequestedItem {
    RequestedItem {
        product_id: product.id,
        quantity,
    }
}

fn assert_total_consistent(order: &Order) {
    let sum: Decimal = order.items().iter().map(OrderLineItem::line_total).sum();
    assert_eq!(order.total(), sum, "total drifted from line items");
}

#[tokio::test]
async fn wholesale_tier_applies_from_minimum_quantity() -> anyhow::Result<()> {
    let fx = Fixture::with_minimum(Decimal::ZERO);
    let rice = fx.product("Rice 1kg", 100, Some((80, 10)), 1)?;

    let below = fx
        .ctx()
        .aggregator()
        .submit_items(fx.customer()?, &[item(&rice, 9)])
        .await?;
    assert_eq!(below.items()[0].unit_price, Decimal::from(100));

    let at = fx
        .ctx()
        .aggregator()
        .submit_items(fx.customer()?, &[item(&rice, 10)])
        .await?;
    assert_eq!(at.items()[0].unit_price, Decimal::from(80));
    assert_eq!(at.total(), Decimal::from(800));
    Ok(())
}

#[tokio::test]
async fn repeated_submission_accumulates_and_reprices_merged_quantity() -> anyhow::Result<()> {
    let fx = Fixture::with_minimum(Decimal::from(1000));
    let user = fx.customer()?;
    let oil = fx.product("Sunflower oil", 500, Some((400, 5)), 1)?;
    let aggregator = fx.ctx().aggregator();

    let first = aggregator.submit_items(user, &[item(&oil, 3)]).await?;
    assert_eq!(first.total(), Decimal::from(1500));

    let merged = aggregator.submit_items(user, &[item(&oil, 2)]).await?;
    assert_eq!(merged.id, first.id);
    assert_eq!(merged.items().len(), 1);
    assert_eq!(merged.items()[0].quantity, 5);
    assert_eq!(merged.items()[0].unit_price, Decimal::from(400));
    assert_eq!(merged.total(), Decimal::from(2000));
    assert_total_consistent(&merged);
    Ok(())
}

#[tokio::test]
async fn merge_that_overflows_quantity_is_rejected_and_draft_kept() -> anyhow::Result<()> {
    let fx = Fixture::with_minimum(Decimal::ZERO);
    let user = fx.customer()?;
    let salt = fx.product("Salt 1kg", 1, None, 1)?;
    let aggregator = fx.ctx().aggregator();

    let first = aggregator
        .submit_items(user, &[item(&salt, 2_000_000_000)])
        .await?;

    let err = aggregator
        .submit_items(user, &[item(&salt, 2_000_000_000)])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(ref msg) if msg.contains("too large")));

    let stored = fx.store.find_draft_order(user).await?.expect("draft kept");
    assert_eq!(stored.id, first.id);
    assert_eq!(stored.version(), first.version());
    assert_eq!(stored.items()[0].quantity, 2_000_000_000);
    assert_eq!(stored.total(), Decimal::from(2_000_000_000));
    Ok(())
}

#[tokio::test]
async fn duplicate_products_in_one_request_are_summed() -> anyhow::Result<()> {
    let fx = Fixture::with_minimum(Decimal::ZERO);
    let pasta = fx.product("Spaghetti", 50, Some((40, 4)), 1)?;

    let order = fx
        .ctx()
        .aggregator()
        .submit_items(fx.customer()?, &[item(&pasta, 2), item(&pasta, 2)])
        .await?;
    assert_eq!(order.items().len(), 1);
    assert_eq!(order.items()[0].quantity, 4);
    assert_eq!(order.items()[0].unit_price, Decimal::from(40));
    Ok(())
}

#[tokio::test]
async fn new_order_below_minimum_total_is_rejected() -> anyhow::Result<()> {
    let fx = Fixture::new();
    let user = fx.customer()?;
    let cheap = fx.product("Sugar sack", 1999, None, 1)?;
    let exact = fx.product("Flour sack", 2000, None, 1)?;
    let aggregator = fx.ctx().aggregator();

    let err = aggregator
        .submit_items(user, &[item(&cheap, 1)])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(ref msg) if msg.contains("minimum order total")));
    assert!(fx.store.find_draft_order(user).await?.is_none());

    let order = aggregator.submit_items(user, &[item(&exact, 1)]).await?;
    assert_eq!(order.total(), Decimal::from(2000));
    assert_eq!(order.status(), OrderStatus::New);
    assert_eq!(order.buyer, buyer());
    Ok(())
}

#[tokio::test]
async fn existing_draft_may_sit_below_minimum() -> anyhow::Result<()> {
    let fx = Fixture::new();
    let user = fx.customer()?;
    let big = fx.product("Cooking oil pallet", 2000, None, 1)?;
    let small = fx.product("Salt", 100, None, 1)?;
    let ctx = fx.ctx();

    let draft = ctx
        .aggregator()
        .submit_items(user, &[item(&big, 1), item(&small, 1)])
        .await?;
    let RemovedLine::Updated(reduced) = ctx.aggregator().remove_line_item(draft.id, big.id).await?
    else {
        panic!("order should survive with one line left");
    };
    assert_eq!(reduced.total(), Decimal::from(100));

    let topped_up = ctx.aggregator().submit_items(user, &[item(&small, 1)]).await?;
    assert_eq!(topped_up.id, draft.id);
    assert_eq!(topped_up.total(), Decimal::from(200));
    Ok(())
}

#[tokio::test]
async fn missing_product_degrades_to_zero_priced_line() -> anyhow::Result<()> {
    let fx = Fixture::new();
    let flour = fx.product("Flour sack", 2000, None, 1)?;
    let ghost = Uuid::new_v4();

    let order = fx
        .ctx()
        .aggregator()
        .submit_items(
            fx.customer()?,
            &[
                item(&flour, 1),
                RequestedItem {
                    product_id: ghost,
                    quantity: 3,
                },
            ],
        )
        .await?;

    let line = order.line(ghost).expect("ghost line kept");
    assert_eq!(line.name, REMOVED_PRODUCT_NAME);
    assert_eq!(line.unit_price, Decimal::ZERO);
    assert_eq!(line.quantity, 3);
    assert_eq!(order.total(), Decimal::from(2000));
    Ok(())
}

#[tokio::test]
async fn minimum_quantity_is_enforced_per_product() -> anyhow::Result<()> {
    let fx = Fixture::new();
    let canned = fx.product("Canned beans", 900, None, 5)?;

    let err = fx
        .ctx()
        .aggregator()
        .submit_items(fx.customer()?, &[item(&canned, 3)])
        .await
        .unwrap_err();
    match err {
        AppError::BadRequest(msg) => {
            assert!(msg.contains("Canned beans"));
            assert!(msg.contains("of 5"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn empty_and_non_positive_requests_are_rejected() -> anyhow::Result<()> {
    let fx = Fixture::new();
    let user = fx.customer()?;
    let tea = fx.product("Black tea", 2500, None, 1)?;
    let aggregator = fx.ctx().aggregator();

    assert!(matches!(
        aggregator.submit_items(user, &[]).await,
        Err(AppError::BadRequest(_))
    ));
    assert!(matches!(
        aggregator.submit_items(user, &[item(&tea, 0)]).await,
        Err(AppError::BadRequest(_))
    ));
    assert!(fx.store.find_draft_order(user).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn unknown_user_is_not_found() -> anyhow::Result<()> {
    let fx = Fixture::new();
    let tea = fx.product("Black tea", 2500, None, 1)?;

    let err = fx
        .ctx()
        .aggregator()
        .submit_items(Uuid::new_v4(), &[item(&tea, 1)])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    Ok(())
}

#[tokio::test]
async fn frozen_order_keeps_prices_after_catalog_change() -> anyhow::Result<()> {
    let fx = Fixture::new();
    let user = fx.customer()?;
    let coffee = fx.product("Coffee beans", 1000, Some((900, 3)), 1)?;
    let ctx = fx.ctx();

    let draft = ctx.aggregator().submit_items(user, &[item(&coffee, 3)]).await?;
    let frozen = ctx
        .freezer()
        .apply_status_transition(draft.id, OrderStatus::Processing)
        .await?;
    assert_eq!(frozen.status(), OrderStatus::Processing);
    assert!(frozen.frozen_at.is_some());
    assert_eq!(frozen.total(), Decimal::from(2700));

    fx.reprice(&coffee, 5000)?;

    let stored = fx.store.find_order(draft.id).await?.expect("order stored");
    let viewed = ctx.freezer().live_view(stored).await?;
    assert_eq!(viewed.items()[0].unit_price, Decimal::from(900));
    assert_eq!(viewed.items()[0].name, "Coffee beans");
    assert_eq!(viewed.total(), Decimal::from(2700));

    let done = ctx
        .freezer()
        .apply_status_transition(draft.id, OrderStatus::Done)
        .await?;
    assert_eq!(done.items(), frozen.items());
    assert_eq!(done.total(), Decimal::from(2700));

    let listed = ctx.freezer().live_views(vec![done]).await?;
    assert_eq!(listed[0].total(), Decimal::from(2700));
    Ok(())
}

#[tokio::test]
async fn draft_view_follows_live_catalog() -> anyhow::Result<()> {
    let fx = Fixture::new();
    let user = fx.customer()?;
    let sugar = fx.product("Sugar", 1000, None, 1)?;
    let ctx = fx.ctx();

    let draft = ctx.aggregator().submit_items(user, &[item(&sugar, 2)]).await?;
    fx.reprice(&sugar, 1200)?;

    let viewed = ctx.freezer().live_view(draft.clone()).await?;
    assert_eq!(viewed.items()[0].unit_price, Decimal::from(1200));
    assert_eq!(viewed.items()[0].name, "Sugar (new label)");
    assert_eq!(viewed.total(), Decimal::from(2400));

    // The view is not persisted.
    let stored = fx.store.find_order(draft.id).await?.expect("order stored");
    assert_eq!(stored.total(), Decimal::from(2000));

    let frozen = ctx
        .freezer()
        .apply_status_transition(draft.id, OrderStatus::Processing)
        .await?;
    assert_eq!(frozen.items()[0].unit_price, Decimal::from(1200));
    assert_total_consistent(&frozen);
    Ok(())
}

#[tokio::test]
async fn finalizing_below_minimum_is_rejected() -> anyhow::Result<()> {
    let fx = Fixture::new();
    let user = fx.customer()?;
    let milk = fx.product("Milk crate", 2000, None, 1)?;
    let ctx = fx.ctx();

    let draft = ctx.aggregator().submit_items(user, &[item(&milk, 1)]).await?;
    fx.reprice(&milk, 1500)?;

    let err = ctx
        .freezer()
        .apply_status_transition(draft.id, OrderStatus::Processing)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(ref msg) if msg.contains("minimum")));

    let stored = fx.store.find_order(draft.id).await?.expect("order stored");
    assert_eq!(stored.status(), OrderStatus::New);
    Ok(())
}

#[tokio::test]
async fn transition_table_is_enforced() -> anyhow::Result<()> {
    let fx = Fixture::new();
    let user = fx.customer()?;
    let rice = fx.product("Rice sack", 2500, None, 1)?;
    let ctx = fx.ctx();
    let freezer = ctx.freezer();

    let order = ctx.aggregator().submit_items(user, &[item(&rice, 1)]).await?;
    let same = freezer.apply_status_transition(order.id, OrderStatus::New).await?;
    assert_eq!(same.version(), order.version());

    freezer
        .apply_status_transition(order.id, OrderStatus::Processing)
        .await?;
    assert!(matches!(
        freezer.apply_status_transition(order.id, OrderStatus::New).await,
        Err(AppError::BadRequest(_))
    ));

    freezer
        .apply_status_transition(order.id, OrderStatus::Cancelled)
        .await?;
    for next in [
        OrderStatus::New,
        OrderStatus::Processing,
        OrderStatus::Done,
        OrderStatus::Cancelled,
    ] {
        assert!(matches!(
            freezer.apply_status_transition(order.id, next).await,
            Err(AppError::BadRequest(_))
        ));
    }

    assert!(matches!(
        freezer
            .apply_status_transition(Uuid::new_v4(), OrderStatus::Done)
            .await,
        Err(AppError::NotFound)
    ));
    Ok(())
}

#[tokio::test]
async fn cancelling_a_draft_locks_lines_as_stored() -> anyhow::Result<()> {
    let fx = Fixture::new();
    let user = fx.customer()?;
    let beans = fx.product("Beans", 2100, None, 1)?;
    let ctx = fx.ctx();

    let draft = ctx.aggregator().submit_items(user, &[item(&beans, 1)]).await?;
    fx.reprice(&beans, 9999)?;

    let cancelled = ctx
        .freezer()
        .apply_status_transition(draft.id, OrderStatus::Cancelled)
        .await?;
    assert_eq!(cancelled.items(), draft.items());
    assert!(cancelled.frozen_at.is_some());

    // The next submission starts a fresh draft.
    fx.reprice(&beans, 2100)?;
    let next = ctx.aggregator().submit_items(user, &[item(&beans, 1)]).await?;
    assert_ne!(next.id, draft.id);
    Ok(())
}

fn legacy_order(user_id: Uuid, status: OrderStatus, lines: Vec<OrderLineItem>) -> Order {
    let now = Utc::now();
    Order::restore(OrderParts {
        id: Uuid::new_v4(),
        user_id,
        buyer: BuyerSnapshot::default(),
        items: lines,
        status,
        contact: String::new(),
        version: 1,
        frozen_at: None,
        created_at: now,
        updated_at: now,
    })
}

#[tokio::test]
async fn transition_backfills_missing_buyer_without_repricing() -> anyhow::Result<()> {
    let fx = Fixture::new();
    let user = fx.customer()?;
    let oats = fx.product("Oats", 3000, None, 1)?;
    let legacy = legacy_order(
        user,
        OrderStatus::Processing,
        vec![OrderLineItem {
            product_id: oats.id,
            name: "Oats (old label)".into(),
            unit_price: Decimal::from(2500),
            quantity: 1,
        }],
    );
    fx.store.put_order(legacy.clone())?;

    let done = fx
        .ctx()
        .freezer()
        .apply_status_transition(legacy.id, OrderStatus::Done)
        .await?;
    assert_eq!(done.buyer, buyer());
    assert_eq!(done.contact, buyer().phone);
    assert_eq!(done.items(), legacy.items());
    assert_eq!(done.total(), Decimal::from(2500));
    Ok(())
}

#[tokio::test]
async fn same_status_transition_persists_backfill() -> anyhow::Result<()> {
    let fx = Fixture::new();
    let user = fx.customer()?;
    let legacy = legacy_order(user, OrderStatus::Processing, Vec::new());
    fx.store.put_order(legacy.clone())?;

    let updated = fx
        .ctx()
        .freezer()
        .apply_status_transition(legacy.id, OrderStatus::Processing)
        .await?;
    assert_eq!(updated.buyer, buyer());
    let stored = fx.store.find_order(legacy.id).await?.expect("order stored");
    assert_eq!(stored.buyer, buyer());
    assert_eq!(stored.version(), legacy.version() + 1);
    Ok(())
}

#[tokio::test]
async fn removing_lines_recomputes_and_deletes_empty_orders() -> anyhow::Result<()> {
    let fx = Fixture::new();
    let user = fx.customer()?;
    let flour = fx.product("Flour", 1500, None, 1)?;
    let yeast = fx.product("Yeast", 600, None, 1)?;
    let ctx = fx.ctx();
    let aggregator = ctx.aggregator();

    let order = aggregator
        .submit_items(user, &[item(&flour, 1), item(&yeast, 1)])
        .await?;
    ctx.freezer()
        .apply_status_transition(order.id, OrderStatus::Processing)
        .await?;

    match aggregator.remove_line_item(order.id, yeast.id).await? {
        RemovedLine::Updated(updated) => {
            assert_eq!(updated.total(), Decimal::from(1500));
            assert_eq!(updated.status(), OrderStatus::Processing);
            assert_total_consistent(&updated);
        }
        RemovedLine::OrderDeleted => panic!("one line should remain"),
    }

    assert!(matches!(
        aggregator.remove_line_item(order.id, yeast.id).await,
        Err(AppError::NotFound)
    ));

    assert!(matches!(
        aggregator.remove_line_item(order.id, flour.id).await?,
        RemovedLine::OrderDeleted
    ));
    assert!(fx.store.find_order(order.id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn deleted_product_is_detached_from_drafts_only() -> anyhow::Result<()> {
    let fx = Fixture::new();
    let discontinued = fx.product("Discontinued cereal", 2000, None, 1)?;
    let keeper = fx.product("Cereal", 2000, None, 1)?;
    let ctx = fx.ctx();
    let aggregator = ctx.aggregator();

    let mixed_user = fx.customer()?;
    let mixed = aggregator
        .submit_items(mixed_user, &[item(&discontinued, 1), item(&keeper, 1)])
        .await?;

    let single_user = fx.customer()?;
    let single = aggregator
        .submit_items(single_user, &[item(&discontinued, 1)])
        .await?;

    let frozen_user = fx.customer()?;
    let frozen = aggregator
        .submit_items(frozen_user, &[item(&discontinued, 2)])
        .await?;
    ctx.freezer()
        .apply_status_transition(frozen.id, OrderStatus::Processing)
        .await?;

    fx.store.remove_product(discontinued.id)?;
    let touched = aggregator.detach_product(discontinued.id).await?;
    assert_eq!(touched, 2);

    let mixed = fx.store.find_order(mixed.id).await?.expect("mixed draft kept");
    assert!(mixed.line(discontinued.id).is_none());
    assert_eq!(mixed.total(), Decimal::from(2000));

    assert!(fx.store.find_order(single.id).await?.is_none());

    let frozen = fx.store.find_order(frozen.id).await?.expect("frozen kept");
    let line = frozen.line(discontinued.id).expect("frozen line kept");
    assert_eq!(line.name, "Discontinued cereal");
    assert_eq!(frozen.total(), Decimal::from(4000));
    Ok(())
}

#[tokio::test]
async fn concurrent_submissions_from_one_user_accumulate() -> anyhow::Result<()> {
    let fx = Fixture::with_minimum(Decimal::ZERO);
    let user = fx.customer()?;
    let water = fx.product("Water 6x1.5L", 120, Some((100, 5)), 1)?;
    let aggregator = fx.ctx().aggregator();

    let items_a = [item(&water, 3)];
    let items_b = [item(&water, 2)];
    let (a, b) = tokio::join!(
        aggregator.submit_items(user, &items_a),
        aggregator.submit_items(user, &items_b),
    );
    let (a, b) = (a?, b?);
    assert_eq!(a.id, b.id);

    let draft = fx.store.find_draft_order(user).await?.expect("one draft");
    assert_eq!(draft.items()[0].quantity, 5);
    assert_eq!(draft.items()[0].unit_price, Decimal::from(100));

    let page = fx
        .store
        .list_orders(&OrderFilter {
            user_id: Some(user),
            ..Default::default()
        })
        .await?;
    assert_eq!(page.total, 1);
    Ok(())
}

#[tokio::test]
async fn stale_save_is_a_conflict() -> anyhow::Result<()> {
    let fx = Fixture::new();
    let user = fx.customer()?;
    let rice = fx.product("Rice sack", 2500, None, 1)?;
    let ctx = fx.ctx();

    let draft = ctx.aggregator().submit_items(user, &[item(&rice, 1)]).await?;
    ctx.aggregator().submit_items(user, &[item(&rice, 1)]).await?;

    let err = fx.store.save(&draft).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    Ok(())
}
