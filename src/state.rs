use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::OrmConn,
    ordering::{DraftLocks, OrderingContext, OrderingRules},
    store::PgStore,
};

#[derive(Clone)]
pub struct AppState {
    pub orm: OrmConn,
    pub store: PgStore,
    pub config: Arc<AppConfig>,
    pub rules: OrderingRules,
    pub draft_locks: DraftLocks,
}

impl AppState {
    pub fn new(orm: OrmConn, config: AppConfig) -> Self {
        Self {
            store: PgStore::new(orm.clone()),
            rules: config.ordering_rules(),
            config: Arc::new(config),
            draft_locks: DraftLocks::new(),
            orm,
        }
    }

    pub fn ordering(&self) -> OrderingContext<'_> {
        OrderingContext {
            catalog: &self.store,
            identity: &self.store,
            orders: &self.store,
            rules: &self.rules,
            locks: &self.draft_locks,
        }
    }
}
