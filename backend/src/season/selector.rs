//! Winner Selector
//!
//! Picks one winner per category, uniformly at random among eligible
//! candidates. A title can win at most once per season: titles that won in
//! an earlier pick this season are excluded, and so are titles already
//! chosen for an earlier category in the same pick.

use rand::{seq::SliceRandom, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::Serialize;
use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use super::{
    context::SeasonContext,
    error::{SeasonError, SeasonResult},
    submission::normalize_title,
    tracker::SeasonTracker,
};
use crate::{
    audit,
    db::models::{HistoryEntry, Scope, Submission},
};

#[derive(Debug, Clone, Serialize)]
pub struct PickResult {
    pub season_number: i64,
    pub winners: Vec<Submission>,
    pub skipped_categories: Vec<String>,
    pub history_entry: HistoryEntry,
}

impl PickResult {
    /// Human-readable summary, e.g. `Picked Arrival. Skipped: wild-card.`
    pub fn message(&self) -> String {
        let titles: Vec<&str> = self.winners.iter().map(|w| w.title.as_str()).collect();
        let mut message = format!("Picked {}.", titles.join(", "));
        if !self.skipped_categories.is_empty() {
            message.push_str(&format!(" Skipped: {}.", self.skipped_categories.join(", ")));
        }
        message
    }
}

pub(crate) struct WinnerSelector {
    ctx: Arc<SeasonContext>,
    tracker: SeasonTracker,
    rng: Mutex<ChaCha20Rng>,
}

impl WinnerSelector {
    pub(crate) fn new(ctx: Arc<SeasonContext>, tracker: SeasonTracker) -> Self {
        Self::with_rng(ctx, tracker, ChaCha20Rng::from_entropy())
    }

    pub(crate) fn with_seed(ctx: Arc<SeasonContext>, tracker: SeasonTracker, seed: u64) -> Self {
        Self::with_rng(ctx, tracker, ChaCha20Rng::seed_from_u64(seed))
    }

    fn with_rng(ctx: Arc<SeasonContext>, tracker: SeasonTracker, rng: ChaCha20Rng) -> Self {
        Self {
            ctx,
            tracker,
            rng: Mutex::new(rng),
        }
    }

    pub(crate) async fn pick_winners(&self, scope: &Scope) -> SeasonResult<PickResult> {
        let Some(season) = self.ctx.store.get_season(scope).await? else {
            return Err(SeasonError::NoEligibleSubmissions);
        };
        let season = self.tracker.observe(season).await?;

        let categories = self.ctx.categories(scope).await?;
        let submissions = self
            .ctx
            .store
            .list_submissions(scope, season.season_number)
            .await?;
        if submissions.is_empty() {
            return Err(SeasonError::NoEligibleSubmissions);
        }

        let already_won: HashSet<String> = self
            .ctx
            .store
            .list_history(scope, Some(season.season_number))
            .await?
            .iter()
            .flat_map(|entry| entry.winners.iter())
            .map(|winner| normalize_title(&winner.title))
            .collect();

        let (winners, skipped_categories) = self.choose(&categories, &submissions, &already_won);
        if winners.is_empty() {
            return Err(SeasonError::NoEligibleSubmissions);
        }

        let entry = HistoryEntry::new(
            scope.clone(),
            season.season_number,
            self.ctx.now(),
            submissions.len() as i64,
            winners.clone(),
            skipped_categories.clone(),
        );
        self.ctx.store.insert_history_entry(&entry).await?;

        let titles: Vec<&str> = winners.iter().map(|w| w.title.as_str()).collect();
        audit::log_pick(scope, season.season_number, &titles, &skipped_categories);

        Ok(PickResult {
            season_number: season.season_number,
            winners,
            skipped_categories,
            history_entry: entry,
        })
    }

    /// One pass over the categories in configured order.
    fn choose(
        &self,
        categories: &[String],
        submissions: &[Submission],
        already_won: &HashSet<String>,
    ) -> (Vec<Submission>, Vec<String>) {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let mut chosen: HashSet<String> = HashSet::new();
        let mut winners = Vec::new();
        let mut skipped = Vec::new();

        for category in categories {
            let eligible: Vec<&Submission> = submissions
                .iter()
                .filter(|s| &s.category == category)
                .filter(|s| {
                    let key = normalize_title(&s.title);
                    !already_won.contains(&key) && !chosen.contains(&key)
                })
                .collect();

            match eligible.choose(&mut *rng) {
                Some(winner) => {
                    chosen.insert(normalize_title(&winner.title));
                    winners.push((*winner).clone());
                }
                None => skipped.push(category.clone()),
            }
        }

        (winners, skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::models::{ArchiveRecord, Season},
        season::{
            clock::{Clock, ManualClock},
            context::SeasonPolicy,
        },
        store::{MemoryStore, SeasonStore},
    };
    use chrono::Utc;

    fn selector() -> (WinnerSelector, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let ctx = Arc::new(SeasonContext::new(
            store.clone(),
            clock.clone(),
            SeasonPolicy::default(),
        ));
        let tracker = SeasonTracker::new(ctx.clone());
        (WinnerSelector::with_seed(ctx, tracker, 7), store, clock)
    }

    async fn add(store: &MemoryStore, scope: &Scope, submitter: &str, category: &str, title: &str) {
        let submission = Submission::new(
            scope.clone(),
            1,
            title.to_string(),
            normalize_title(title),
            "d".to_string(),
            category.to_string(),
            submitter.to_string(),
            Utc::now(),
        );
        store
            .record_submission(
                &submission,
                &[category.to_string()],
                &ArchiveRecord::for_submission(&submission),
            )
            .await
            .unwrap();
    }

    async fn start_season(store: &MemoryStore, clock: &ManualClock, scope: &Scope) {
        store
            .put_season(&Season::first(scope.clone(), clock.now(), 14))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn no_season_means_nothing_to_pick() {
        let (selector, _store, _clock) = selector();
        let err = selector.pick_winners(&Scope::club("c1")).await.unwrap_err();
        assert!(matches!(err, SeasonError::NoEligibleSubmissions));
    }

    #[tokio::test]
    async fn empty_category_is_skipped() {
        let (selector, store, clock) = selector();
        let scope = Scope::club("c1");
        start_season(&store, &clock, &scope).await;
        add(&store, &scope, "alice", "top-pick", "Arrival").await;
        add(&store, &scope, "bob", "top-pick", "Heat").await;

        let result = selector.pick_winners(&scope).await.unwrap();
        assert_eq!(result.winners.len(), 1);
        assert_eq!(result.winners[0].category, "top-pick");
        assert_eq!(result.skipped_categories, vec!["wild-card".to_string()]);
        assert_eq!(result.history_entry.submissions_count_at_pick, 2);
        assert!(result.message().contains("Skipped: wild-card."));
    }

    #[tokio::test]
    async fn winners_never_repeat_within_season() {
        let (selector, store, clock) = selector();
        let scope = Scope::global();
        start_season(&store, &clock, &scope).await;
        add(&store, &scope, "alice", "top-pick", "Arrival").await;
        add(&store, &scope, "bob", "top-pick", "Heat").await;
        add(&store, &scope, "carol", "wild-card", "Alien").await;

        let mut seen = HashSet::new();
        let mut picks = 0;
        while let Ok(result) = selector.pick_winners(&scope).await {
            for winner in result.winners {
                assert!(seen.insert(winner.title_key.clone()), "repeat winner {}", winner.title);
            }
            picks += 1;
            assert!(picks <= 3, "selector kept picking after candidates ran out");
        }

        assert_eq!(seen.len(), 3);
        let history = store.list_history(&scope, Some(1)).await.unwrap();
        assert_eq!(history.len(), picks);
    }

    #[test]
    fn same_title_cannot_win_two_categories_in_one_pass() {
        let (selector, _store, _clock) = selector();
        let scope = Scope::global();
        let make = |category: &str, title: &str| {
            Submission::new(
                scope.clone(),
                1,
                title.to_string(),
                normalize_title(title),
                "d".to_string(),
                category.to_string(),
                "alice".to_string(),
                Utc::now(),
            )
        };
        // Only reachable through legacy data, but the pass must still hold.
        let submissions = vec![make("top-pick", "Arrival"), make("wild-card", "ARRIVAL")];
        let categories = vec!["top-pick".to_string(), "wild-card".to_string()];

        let (winners, skipped) = selector.choose(&categories, &submissions, &HashSet::new());
        assert_eq!(winners.len(), 1);
        assert_eq!(skipped, vec!["wild-card".to_string()]);
    }
}
