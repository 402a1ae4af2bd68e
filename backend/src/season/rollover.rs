//! Season Rollover Coordinator
//!
//! Moves a scope from an ended season to a fresh one. Archiving the old
//! season and installing the new one is a single store call; clearing the
//! old season's submissions and trackers afterwards is best-effort, since
//! every read filters by season number anyway.

use std::sync::Arc;

use super::{
    context::SeasonContext,
    error::{RolloverError, SeasonResult},
    tracker::SeasonTracker,
};
use crate::{
    audit,
    db::models::{Scope, Season},
};

pub(crate) struct RolloverService {
    ctx: Arc<SeasonContext>,
    tracker: SeasonTracker,
}

impl RolloverService {
    pub(crate) fn new(ctx: Arc<SeasonContext>, tracker: SeasonTracker) -> Self {
        Self { ctx, tracker }
    }

    /// Admin-triggered rollover. Rejected while the current season runs.
    pub(crate) async fn start_new_season(&self, scope: &Scope) -> SeasonResult<Season> {
        let season = self.tracker.current_season(scope).await?;
        let now = self.ctx.now();

        if !season.has_ended(now) {
            return Err(RolloverError::SeasonStillActive {
                current_week: season.current_week(now),
                total_weeks: season.length_weeks,
            }
            .into());
        }

        roll_over(&self.ctx, season).await
    }
}

/// Archives `current` (stamping it if needed) and starts the next season.
/// Caller holds the scope lock and has checked that `current` has ended.
pub(crate) async fn roll_over(ctx: &SeasonContext, current: Season) -> SeasonResult<Season> {
    let now = ctx.now();
    let scope = current.scope.clone();

    let mut ended = current;
    let newly_ended = ended.end_date.is_none();
    if newly_ended {
        ended.end_date = Some(now);
    }

    let length = ctx.configured_season_length(&scope).await?;
    let next = ended.successor(now, length);
    ctx.store.replace_season(&ended, newly_ended, &next).await?;

    audit::log_season_event(
        &scope,
        next.season_number,
        "started",
        &format!(
            "rolled over from season {} ({} weeks)",
            ended.season_number, length
        ),
    );

    if let Err(e) = ctx.store.delete_submissions(&scope).await {
        tracing::warn!(
            "Rollover for {}: failed to clear submissions of season {}: {}",
            scope,
            ended.season_number,
            e
        );
    }
    if let Err(e) = ctx.store.clear_user_trackers(&scope).await {
        tracing::warn!(
            "Rollover for {}: failed to clear member trackers: {}",
            scope,
            e
        );
    }

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::models::{ArchiveRecord, Submission},
        season::{
            clock::{Clock, ManualClock},
            context::SeasonPolicy,
            error::SeasonError,
        },
        store::{MemoryStore, SeasonStore},
    };
    use chrono::{Duration, Utc};

    fn service() -> (RolloverService, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let ctx = Arc::new(SeasonContext::new(
            store.clone(),
            clock.clone(),
            SeasonPolicy::default(),
        ));
        let tracker = SeasonTracker::new(ctx.clone());
        (RolloverService::new(ctx, tracker), store, clock)
    }

    #[tokio::test]
    async fn rejects_active_season() {
        let (service, _store, clock) = service();
        let scope = Scope::club("c1");
        service.start_new_season(&scope).await.unwrap_err();

        clock.advance(Duration::days(20));
        let err = service.start_new_season(&scope).await.unwrap_err();
        assert!(matches!(
            err,
            SeasonError::Rollover(RolloverError::SeasonStillActive {
                current_week: 3,
                total_weeks: 14
            })
        ));
    }

    #[tokio::test]
    async fn rollover_clears_scope_state_but_keeps_archive() {
        let (service, store, clock) = service();
        let scope = Scope::club("c1");
        store
            .put_season(&Season::first(scope.clone(), clock.now() - Duration::days(40), 4))
            .await
            .unwrap();

        let submission = Submission::new(
            scope.clone(),
            1,
            "Arrival".to_string(),
            "arrival".to_string(),
            "d".to_string(),
            "top-pick".to_string(),
            "alice".to_string(),
            clock.now(),
        );
        store
            .record_submission(
                &submission,
                &["top-pick".to_string()],
                &ArchiveRecord::for_submission(&submission),
            )
            .await
            .unwrap();

        let next = service.start_new_season(&scope).await.unwrap();
        assert_eq!(next.season_number, 2);
        assert_eq!(next.start_date, clock.now());

        assert!(store.list_submissions(&scope, 1).await.unwrap().is_empty());
        assert!(store.get_user_tracker(&scope, 1, "alice").await.unwrap().is_empty());
        assert!(store
            .find_archive_record(&scope, "arrival")
            .await
            .unwrap()
            .is_some());

        let history = store.list_seasons_history(&scope).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].season_number, 1);
        assert!(history[0].end_date.is_some());
    }

    #[tokio::test]
    async fn already_stamped_season_is_not_archived_twice() {
        let (service, store, clock) = service();
        let scope = Scope::global();
        let mut season = Season::first(scope.clone(), clock.now() - Duration::days(10), 14);
        season.end_date = Some(clock.now());
        store.archive_season(&season).await.unwrap();

        let next = service.start_new_season(&scope).await.unwrap();
        assert_eq!(next.season_number, 2);
        assert_eq!(store.list_seasons_history(&scope).await.unwrap().len(), 1);
    }
}
