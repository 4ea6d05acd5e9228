use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// One async mutex per user, held across "find draft, merge, save".
#[derive(Debug, Clone, Default)]
pub struct DraftLocks {
    slots: Arc<Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>>,
}

impl DraftLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, user_id: Uuid) -> AppResult<OwnedMutexGuard<()>> {
        let slot = {
            let mut slots = self
                .slots
                .lock()
                .map_err(|e| AppError::Internal(anyhow!("draft lock table poisoned: {e}")))?;
            // Drop slots nobody holds or waits on.
            slots.retain(|id, slot| *id == user_id || Arc::strong_count(slot) > 1);
            slots.entry(user_id).or_default().clone()
        };
        Ok(slot.lock_owned().await)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_user_waits_for_the_holder() {
        let locks = DraftLocks::new();
        let user = Uuid::new_v4();

        let guard = locks.acquire(user).await.unwrap();
        let contender = locks.clone();
        let waiter = tokio::spawn(async move { contender.acquire(user).await.map(|_| ()) });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn different_users_do_not_block_each_other() {
        let locks = DraftLocks::new();
        let _first = locks.acquire(Uuid::new_v4()).await.unwrap();
        let _second = locks.acquire(Uuid::new_v4()).await.unwrap();
    }
}
