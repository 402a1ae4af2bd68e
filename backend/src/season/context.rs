use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{
    clock::{self, Clock},
    error::SeasonResult,
};
use crate::{
    db::models::{Scope, ScopeSettings},
    store::SeasonStore,
};

/// Engine-wide behaviour switches.
#[derive(Debug, Clone)]
pub struct SeasonPolicy {
    /// Submitting into an ended season starts the next one instead of failing.
    pub auto_rollover: bool,
    /// Season length for scopes without configured settings.
    pub default_season_weeks: u32,
}

impl Default for SeasonPolicy {
    fn default() -> Self {
        Self {
            auto_rollover: true,
            default_season_weeks: clock::DEFAULT_SEASON_WEEKS,
        }
    }
}

/// One async mutex per scope key. Every check-then-act sequence on a scope
/// runs while holding that scope's guard.
///
/// Entries nobody holds or waits on are dropped on the next acquire, so the
/// map only tracks scopes with work in flight.
#[derive(Default)]
pub struct ScopeLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ScopeLocks {
    pub async fn acquire(&self, scope: &Scope) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Handles are only cloned under this map lock, so a count of one
            // means no guard or waiter exists for that key.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(scope.key()).or_default().clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}

pub(crate) struct SeasonContext {
    pub(crate) store: Arc<dyn SeasonStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) locks: ScopeLocks,
    pub(crate) policy: SeasonPolicy,
}

impl SeasonContext {
    pub(crate) fn new(
        store: Arc<dyn SeasonStore>,
        clock: Arc<dyn Clock>,
        policy: SeasonPolicy,
    ) -> Self {
        Self {
            store,
            clock,
            locks: ScopeLocks::default(),
            policy,
        }
    }

    pub(crate) fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    pub(crate) async fn categories(&self, scope: &Scope) -> SeasonResult<Vec<String>> {
        Ok(self.store.get_category_list(scope).await?)
    }

    /// Length a season started now would get.
    pub(crate) async fn configured_season_length(&self, scope: &Scope) -> SeasonResult<u32> {
        let weeks = self
            .store
            .get_season_length(scope)
            .await?
            .unwrap_or(self.policy.default_season_weeks);
        Ok(clock::clamp_season_length(weeks))
    }

    pub(crate) async fn settings(&self, scope: &Scope) -> SeasonResult<ScopeSettings> {
        Ok(ScopeSettings {
            categories: self.categories(scope).await?,
            season_length_weeks: self.configured_season_length(scope).await?,
        })
    }
}
