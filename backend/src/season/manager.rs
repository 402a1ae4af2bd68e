//! Season Manager
//!
//! Entry point for every season operation:
//! - Submissions and per-member status
//! - Season status and archived seasons
//! - Winner picks and pick history
//! - Reviews and the watch list
//! - Admin actions (rollover, member reset, settings, summary)
//!
//! Each operation that reads-then-writes holds the scope's lock for its
//! whole duration, so two requests on the same scope never interleave.

use std::{collections::HashSet, sync::Arc};

use super::{
    clock::{Clock, SystemClock, MAX_SEASON_WEEKS, MIN_SEASON_WEEKS},
    context::{SeasonContext, SeasonPolicy},
    error::{RolloverError, SeasonError, SeasonResult},
    reviews::{NewReview, ReviewService},
    rollover::RolloverService,
    selector::{PickResult, WinnerSelector},
    submission::{NewSubmission, SubmissionService, SubmissionSummary, UserStatus},
    tracker::{SeasonStatus, SeasonTracker},
};
use crate::{
    audit,
    db::models::{HistoryEntry, Review, Scope, ScopeSettings, Season, Submission, WatchedEntry},
    store::SeasonStore,
};

pub struct SeasonManager {
    ctx: Arc<SeasonContext>,
    tracker: SeasonTracker,
    submissions: SubmissionService,
    selector: WinnerSelector,
    rollover: RolloverService,
    reviews: ReviewService,
}

impl SeasonManager {
    pub fn new(store: Arc<dyn SeasonStore>, clock: Arc<dyn Clock>, policy: SeasonPolicy) -> Self {
        let ctx = Arc::new(SeasonContext::new(store, clock, policy));
        let tracker = SeasonTracker::new(ctx.clone());
        let selector = WinnerSelector::new(ctx.clone(), tracker.clone());
        Self::assemble(ctx, tracker, selector)
    }

    /// Same as [`SeasonManager::new`] with the wall clock.
    pub fn with_system_clock(store: Arc<dyn SeasonStore>, policy: SeasonPolicy) -> Self {
        Self::new(store, Arc::new(SystemClock), policy)
    }

    /// Builds a manager whose picks are reproducible for a given seed.
    pub fn with_seed(
        store: Arc<dyn SeasonStore>,
        clock: Arc<dyn Clock>,
        policy: SeasonPolicy,
        seed: u64,
    ) -> Self {
        let ctx = Arc::new(SeasonContext::new(store, clock, policy));
        let tracker = SeasonTracker::new(ctx.clone());
        let selector = WinnerSelector::with_seed(ctx.clone(), tracker.clone(), seed);
        Self::assemble(ctx, tracker, selector)
    }

    fn assemble(ctx: Arc<SeasonContext>, tracker: SeasonTracker, selector: WinnerSelector) -> Self {
        Self {
            submissions: SubmissionService::new(ctx.clone(), tracker.clone()),
            rollover: RolloverService::new(ctx.clone(), tracker.clone()),
            reviews: ReviewService::new(ctx.clone()),
            ctx,
            tracker,
            selector,
        }
    }

    // ------------------------------------------------------------------
    // Submissions
    // ------------------------------------------------------------------

    pub async fn submit(&self, scope: &Scope, submission: NewSubmission) -> SeasonResult<Submission> {
        let _guard = self.ctx.locks.acquire(scope).await;
        self.submissions.submit(scope, submission).await
    }

    pub async fn user_status(&self, scope: &Scope, submitter_id: &str) -> SeasonResult<UserStatus> {
        let _guard = self.ctx.locks.acquire(scope).await;
        self.submissions.user_status(scope, submitter_id).await
    }

    /// Submissions of the scope's current season.
    pub async fn list_submissions(&self, scope: &Scope) -> SeasonResult<Vec<Submission>> {
        self.submissions.current_submissions(scope).await
    }

    pub async fn reset_member(
        &self,
        scope: &Scope,
        submitter_id: &str,
        authorized: bool,
    ) -> SeasonResult<u64> {
        if !authorized {
            audit::log_security_event(scope, "reset_member", &format!("member {}", submitter_id));
            return Err(SeasonError::Unauthorized {
                action: "reset member submissions",
            });
        }
        let _guard = self.ctx.locks.acquire(scope).await;
        self.submissions.reset_member(scope, submitter_id).await
    }

    pub async fn submission_summary(
        &self,
        scope: &Scope,
        authorized: bool,
    ) -> SeasonResult<SubmissionSummary> {
        if !authorized {
            audit::log_security_event(scope, "submission_summary", "summary requested");
            return Err(SeasonError::Unauthorized {
                action: "view the submission summary",
            });
        }
        let _guard = self.ctx.locks.acquire(scope).await;
        self.submissions.summary(scope).await
    }

    // ------------------------------------------------------------------
    // Seasons
    // ------------------------------------------------------------------

    pub async fn season_status(&self, scope: &Scope) -> SeasonResult<SeasonStatus> {
        let _guard = self.ctx.locks.acquire(scope).await;
        self.tracker.status(scope).await
    }

    /// Archived seasons, oldest first.
    pub async fn list_seasons(&self, scope: &Scope) -> SeasonResult<Vec<Season>> {
        Ok(self.ctx.store.list_seasons_history(scope).await?)
    }

    pub async fn start_new_season(&self, scope: &Scope, authorized: bool) -> SeasonResult<Season> {
        if !authorized {
            audit::log_security_event(scope, "start_new_season", "rollover requested");
            return Err(RolloverError::Unauthorized.into());
        }
        let _guard = self.ctx.locks.acquire(scope).await;
        self.rollover.start_new_season(scope).await
    }

    // ------------------------------------------------------------------
    // Picks
    // ------------------------------------------------------------------

    pub async fn pick_winners(&self, scope: &Scope) -> SeasonResult<PickResult> {
        let _guard = self.ctx.locks.acquire(scope).await;
        self.selector.pick_winners(scope).await
    }

    pub async fn list_history(
        &self,
        scope: &Scope,
        season_number: Option<i64>,
    ) -> SeasonResult<Vec<HistoryEntry>> {
        Ok(self.ctx.store.list_history(scope, season_number).await?)
    }

    /// Runs a pick for every scope that has a season. A failing scope is
    /// logged and skipped.
    pub async fn pick_all_scopes(&self) -> SeasonResult<Vec<(Scope, PickResult)>> {
        let scopes = self.ctx.store.list_scopes().await?;
        let mut picked = Vec::new();

        for scope in scopes {
            match self.pick_winners(&scope).await {
                Ok(result) => {
                    tracing::info!("Scheduled pick for {}: {}", scope, result.message());
                    picked.push((scope, result));
                }
                Err(SeasonError::NoEligibleSubmissions) => {
                    tracing::debug!("Scheduled pick for {}: nothing to pick", scope);
                }
                Err(e) => {
                    tracing::error!("Scheduled pick for {} failed: {}", scope, e);
                }
            }
        }

        Ok(picked)
    }

    // ------------------------------------------------------------------
    // Reviews and watch list
    // ------------------------------------------------------------------

    pub async fn mark_watched(
        &self,
        scope: &Scope,
        user_id: &str,
        movie_title: &str,
    ) -> SeasonResult<WatchedEntry> {
        self.reviews.mark_watched(scope, user_id, movie_title).await
    }

    pub async fn list_watched(&self, scope: &Scope, user_id: &str) -> SeasonResult<Vec<WatchedEntry>> {
        self.reviews.list_watched(scope, user_id).await
    }

    pub async fn add_review(&self, scope: &Scope, review: NewReview) -> SeasonResult<Review> {
        self.reviews.add_review(scope, review).await
    }

    pub async fn list_reviews(
        &self,
        scope: &Scope,
        movie_title: Option<&str>,
    ) -> SeasonResult<Vec<Review>> {
        self.reviews.list_reviews(scope, movie_title).await
    }

    /// Reviews of the titles chosen by the scope's latest pick.
    pub async fn weekly_reviews(&self, scope: &Scope) -> SeasonResult<Vec<Review>> {
        self.reviews.weekly_reviews(scope).await
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    /// Effective settings, with defaults filled in.
    pub async fn settings(&self, scope: &Scope) -> SeasonResult<ScopeSettings> {
        self.ctx.settings(scope).await
    }

    /// Replaces the scope's settings. A new season length takes effect at
    /// the next season.
    pub async fn update_settings(
        &self,
        scope: &Scope,
        settings: ScopeSettings,
        authorized: bool,
    ) -> SeasonResult<ScopeSettings> {
        if !authorized {
            audit::log_security_event(scope, "update_settings", "settings change requested");
            return Err(SeasonError::Unauthorized {
                action: "change scope settings",
            });
        }
        let settings = validate_settings(settings)?;

        let _guard = self.ctx.locks.acquire(scope).await;
        self.ctx.store.put_scope_settings(scope, &settings).await?;

        audit::log_admin_action(
            scope,
            "update_settings",
            &format!(
                "categories [{}], {} weeks",
                settings.categories.join(", "),
                settings.season_length_weeks
            ),
        );
        Ok(settings)
    }
}

fn validate_settings(settings: ScopeSettings) -> SeasonResult<ScopeSettings> {
    let categories: Vec<String> = settings
        .categories
        .iter()
        .map(|c| c.trim().to_string())
        .collect();

    if categories.is_empty() {
        return Err(SeasonError::InvalidSettings(
            "at least one category is required".to_string(),
        ));
    }
    if categories.iter().any(|c| c.is_empty()) {
        return Err(SeasonError::InvalidSettings(
            "category names cannot be blank".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = categories.iter().find(|c| !seen.insert(c.as_str())) {
        return Err(SeasonError::InvalidSettings(format!(
            "duplicate category: {}",
            dup
        )));
    }
    if !(MIN_SEASON_WEEKS..=MAX_SEASON_WEEKS).contains(&settings.season_length_weeks) {
        return Err(SeasonError::InvalidSettings(format!(
            "season length must be between {} and {} weeks",
            MIN_SEASON_WEEKS, MAX_SEASON_WEEKS
        )));
    }

    Ok(ScopeSettings {
        categories,
        season_length_weeks: settings.season_length_weeks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(categories: &[&str], weeks: u32) -> ScopeSettings {
        ScopeSettings {
            categories: categories.iter().map(|c| c.to_string()).collect(),
            season_length_weeks: weeks,
        }
    }

    #[test]
    fn settings_are_trimmed() {
        let valid = validate_settings(settings(&[" comedy ", "drama"], 8)).unwrap();
        assert_eq!(valid.categories, vec!["comedy", "drama"]);
        assert_eq!(valid.season_length_weeks, 8);
    }

    #[test]
    fn bad_settings_are_rejected() {
        assert!(validate_settings(settings(&[], 14)).is_err());
        assert!(validate_settings(settings(&["  "], 14)).is_err());
        assert!(validate_settings(settings(&["drama", " drama"], 14)).is_err());
        assert!(validate_settings(settings(&["drama"], 3)).is_err());
        assert!(validate_settings(settings(&["drama"], 53)).is_err());
        assert!(validate_settings(settings(&["drama"], 4)).is_ok());
        assert!(validate_settings(settings(&["drama"], 52)).is_ok());
    }
}
