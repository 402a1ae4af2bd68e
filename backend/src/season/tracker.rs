//! Season Tracker
//!
//! Answers "which season is this scope in, what week is it, and has it
//! ended". Season end is detected lazily on read: the first read past the
//! last week stamps `end_date` and archives the season, but does not start
//! a new one. Callers run these methods while holding the scope lock.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::{
    clock,
    context::SeasonContext,
    error::{SeasonError, SeasonResult},
    rollover,
};
use crate::{
    audit,
    db::models::{Scope, Season},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeasonStatus {
    pub scope: Scope,
    pub season_number: i64,
    pub current_week: u32,
    pub total_weeks: u32,
    pub weeks_remaining: u32,
    pub is_active: bool,
    pub start_date: DateTime<Utc>,
    /// Scheduled end of the season.
    pub end_date: DateTime<Utc>,
    /// When the season was actually stamped as ended, if it has been.
    pub ended_at: Option<DateTime<Utc>>,
}

impl SeasonStatus {
    pub fn for_season(season: &Season, now: DateTime<Utc>) -> Self {
        Self {
            scope: season.scope.clone(),
            season_number: season.season_number,
            current_week: season.current_week(now),
            total_weeks: season.length_weeks,
            weeks_remaining: clock::weeks_remaining(season.start_date, season.length_weeks, now),
            is_active: !season.has_ended(now),
            start_date: season.start_date,
            end_date: clock::projected_end(season.start_date, season.length_weeks),
            ended_at: season.end_date,
        }
    }
}

#[derive(Clone)]
pub(crate) struct SeasonTracker {
    ctx: Arc<SeasonContext>,
}

impl SeasonTracker {
    pub(crate) fn new(ctx: Arc<SeasonContext>) -> Self {
        Self { ctx }
    }

    /// Current season record for the scope, creating season 1 if there is none.
    pub(crate) async fn get_or_create_season(&self, scope: &Scope) -> SeasonResult<Season> {
        if let Some(season) = self.ctx.store.get_season(scope).await? {
            return Ok(season);
        }

        let length = self.ctx.configured_season_length(scope).await?;
        let season = Season::first(scope.clone(), self.ctx.now(), length);
        self.ctx.store.put_season(&season).await?;

        audit::log_season_event(scope, season.season_number, "started", "first season");
        tracing::info!("Created season 1 for {} ({} weeks)", scope, length);
        Ok(season)
    }

    /// Stamps and archives the season if it has just run out. Idempotent:
    /// an already stamped season is returned unchanged.
    pub(crate) async fn observe(&self, season: Season) -> SeasonResult<Season> {
        let now = self.ctx.now();
        if season.is_archived() || !season.has_ended(now) {
            return Ok(season);
        }

        let mut ended = season;
        ended.end_date = Some(now);
        self.ctx.store.archive_season(&ended).await?;

        audit::log_season_event(
            &ended.scope,
            ended.season_number,
            "ended",
            &format!("ran {} weeks", ended.length_weeks),
        );
        Ok(ended)
    }

    /// Current season with lazy end detection applied.
    pub(crate) async fn current_season(&self, scope: &Scope) -> SeasonResult<Season> {
        let season = self.get_or_create_season(scope).await?;
        self.observe(season).await
    }

    /// Season that accepts submissions right now. An ended season is rolled
    /// over when the policy allows it, otherwise rejected.
    pub(crate) async fn active_season(&self, scope: &Scope) -> SeasonResult<Season> {
        let season = self.current_season(scope).await?;
        if !season.has_ended(self.ctx.now()) {
            return Ok(season);
        }

        if !self.ctx.policy.auto_rollover {
            return Err(SeasonError::SeasonEnded {
                season_number: season.season_number,
            });
        }

        tracing::info!(
            "Season {} for {} has ended; starting the next one automatically",
            season.season_number,
            scope
        );
        rollover::roll_over(&self.ctx, season).await
    }

    pub(crate) async fn status(&self, scope: &Scope) -> SeasonResult<SeasonStatus> {
        let season = self.current_season(scope).await?;
        Ok(SeasonStatus::for_season(&season, self.ctx.now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        season::{
            clock::{Clock, ManualClock},
            context::SeasonPolicy,
        },
        store::{MemoryStore, SeasonStore},
    };
    use chrono::Duration;

    fn tracker(policy: SeasonPolicy) -> (SeasonTracker, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let ctx = Arc::new(SeasonContext::new(store.clone(), clock.clone(), policy));
        (SeasonTracker::new(ctx), store, clock)
    }

    #[tokio::test]
    async fn first_read_creates_season_one() {
        let (tracker, store, clock) = tracker(SeasonPolicy::default());
        let scope = Scope::club("c1");

        let season = tracker.get_or_create_season(&scope).await.unwrap();
        assert_eq!(season.season_number, 1);
        assert_eq!(season.start_date, clock.now());
        assert_eq!(season.length_weeks, 14);
        assert!(store.get_season(&scope).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn status_reports_week_two_after_ten_days() {
        let (tracker, _store, clock) = tracker(SeasonPolicy::default());
        let scope = Scope::global();
        tracker.get_or_create_season(&scope).await.unwrap();

        clock.advance(Duration::days(10));
        let status = tracker.status(&scope).await.unwrap();
        assert_eq!(status.current_week, 2);
        assert_eq!(status.total_weeks, 14);
        assert_eq!(status.weeks_remaining, 12);
        assert!(status.is_active);
        assert!(status.ended_at.is_none());
    }

    #[tokio::test]
    async fn end_is_stamped_exactly_once() {
        let (tracker, store, clock) = tracker(SeasonPolicy::default());
        let scope = Scope::club("c1");
        store
            .put_scope_settings(
                &scope,
                &crate::db::models::ScopeSettings {
                    categories: vec!["top-pick".to_string()],
                    season_length_weeks: 4,
                },
            )
            .await
            .unwrap();
        tracker.get_or_create_season(&scope).await.unwrap();

        clock.advance(Duration::days(40));
        let first = tracker.status(&scope).await.unwrap();
        assert!(!first.is_active);
        let stamped = first.ended_at.expect("end should be stamped");

        clock.advance(Duration::days(3));
        let second = tracker.status(&scope).await.unwrap();
        assert_eq!(second.ended_at, Some(stamped));

        let history = store.list_seasons_history(&scope).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].end_date, Some(stamped));
    }

    #[tokio::test]
    async fn ended_season_is_not_replaced_by_reads() {
        let (tracker, store, clock) = tracker(SeasonPolicy::default());
        let scope = Scope::global();
        tracker.get_or_create_season(&scope).await.unwrap();

        clock.advance(Duration::weeks(20));
        tracker.status(&scope).await.unwrap();

        let current = store.get_season(&scope).await.unwrap().unwrap();
        assert_eq!(current.season_number, 1);
    }

    #[tokio::test]
    async fn active_season_respects_auto_rollover_policy() {
        let policy = SeasonPolicy {
            auto_rollover: false,
            ..SeasonPolicy::default()
        };
        let (tracker, _store, clock) = tracker(policy);
        let scope = Scope::club("c1");
        tracker.get_or_create_season(&scope).await.unwrap();

        clock.advance(Duration::weeks(15));
        let err = tracker.active_season(&scope).await.unwrap_err();
        assert!(matches!(err, SeasonError::SeasonEnded { season_number: 1 }));
    }

    #[tokio::test]
    async fn active_season_rolls_over_when_allowed() {
        let (tracker, store, clock) = tracker(SeasonPolicy::default());
        let scope = Scope::club("c1");
        tracker.get_or_create_season(&scope).await.unwrap();

        clock.advance(Duration::weeks(15));
        let season = tracker.active_season(&scope).await.unwrap();
        assert_eq!(season.season_number, 2);
        assert_eq!(season.start_date, clock.now());
        assert_eq!(store.list_seasons_history(&scope).await.unwrap().len(), 1);
    }
}
