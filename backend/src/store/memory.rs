//! In-process store, optionally mirrored to a JSON snapshot file.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};
use tokio::sync::RwLock;

use super::{SeasonStore, StoreResult};
use crate::db::models::{
    ArchiveRecord, HistoryEntry, Review, Scope, ScopeSettings, Season, Submission, WatchedEntry,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct TrackerRecord {
    scope: Scope,
    season_number: i64,
    submitter_id: String,
    categories: Vec<String>,
}

/// Everything the store holds. Maps are keyed by [`Scope::key`].
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    settings: HashMap<String, ScopeSettings>,
    #[serde(default)]
    seasons: HashMap<String, Season>,
    #[serde(default)]
    season_history: HashMap<String, Vec<Season>>,
    #[serde(default)]
    submissions: Vec<Submission>,
    #[serde(default)]
    trackers: Vec<TrackerRecord>,
    #[serde(default)]
    archive: Vec<ArchiveRecord>,
    #[serde(default)]
    history: Vec<HistoryEntry>,
    #[serde(default)]
    reviews: Vec<Review>,
    #[serde(default)]
    watched: Vec<WatchedEntry>,
}

pub struct MemoryStore {
    state: RwLock<Snapshot>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryStore {
    /// Volatile store; nothing survives the process.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(Snapshot::default()),
            snapshot_path: None,
        }
    }

    /// Loads the snapshot at `path` if present and rewrites it after every write.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let snapshot = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => Snapshot::default(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Snapshot::default(),
            Err(e) => return Err(e.into()),
        };

        tracing::info!("Opened season snapshot at {}", path.display());

        Ok(Self {
            state: RwLock::new(snapshot),
            snapshot_path: Some(path),
        })
    }

    /// Applies `change` and persists the result. With a snapshot file the
    /// change is made on a copy, which becomes the live state only after the
    /// file write succeeded.
    async fn update<R, F>(&self, change: F) -> StoreResult<R>
    where
        F: FnOnce(&mut Snapshot) -> R + Send,
        R: Send,
    {
        let mut state = self.state.write().await;
        if self.snapshot_path.is_none() {
            return Ok(change(&mut *state));
        }

        let mut next = state.clone();
        let result = change(&mut next);
        self.persist(&next).await?;
        *state = next;
        Ok(result)
    }

    async fn persist(&self, state: &Snapshot) -> StoreResult<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        // Replace via rename; readers never see a partial file.
        let json = serde_json::to_vec_pretty(state)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn append_unique(history: &mut Vec<Season>, season: &Season) {
    if !history
        .iter()
        .any(|s| s.season_number == season.season_number)
    {
        history.push(season.clone());
    }
}

#[async_trait]
impl SeasonStore for MemoryStore {
    async fn get_season(&self, scope: &Scope) -> StoreResult<Option<Season>> {
        Ok(self.state.read().await.seasons.get(&scope.key()).cloned())
    }

    async fn put_season(&self, season: &Season) -> StoreResult<()> {
        self.update(|state| {
            state.seasons.insert(season.scope.key(), season.clone());
        })
        .await
    }

    async fn list_seasons_history(&self, scope: &Scope) -> StoreResult<Vec<Season>> {
        Ok(self
            .state
            .read()
            .await
            .season_history
            .get(&scope.key())
            .cloned()
            .unwrap_or_default())
    }

    async fn append_season_history(&self, season: &Season) -> StoreResult<()> {
        self.update(|state| {
            append_unique(
                state.season_history.entry(season.scope.key()).or_default(),
                season,
            );
        })
        .await
    }

    async fn archive_season(&self, season: &Season) -> StoreResult<()> {
        self.update(|state| {
            let key = season.scope.key();
            state.seasons.insert(key.clone(), season.clone());
            append_unique(state.season_history.entry(key).or_default(), season);
        })
        .await
    }

    async fn replace_season(
        &self,
        ended: &Season,
        append_ended: bool,
        next: &Season,
    ) -> StoreResult<()> {
        self.update(|state| {
            let key = next.scope.key();
            if append_ended {
                append_unique(state.season_history.entry(key.clone()).or_default(), ended);
            }
            state.seasons.insert(key, next.clone());
        })
        .await
    }

    async fn list_scopes(&self) -> StoreResult<Vec<Scope>> {
        let state = self.state.read().await;
        let mut scopes: Vec<Scope> = state.seasons.values().map(|s| s.scope.clone()).collect();
        scopes.sort_by_key(|s| s.key());
        Ok(scopes)
    }

    async fn list_submissions(
        &self,
        scope: &Scope,
        season_number: i64,
    ) -> StoreResult<Vec<Submission>> {
        Ok(self
            .state
            .read()
            .await
            .submissions
            .iter()
            .filter(|s| &s.scope == scope && s.season_number == season_number)
            .cloned()
            .collect())
    }

    async fn insert_submission(&self, submission: &Submission) -> StoreResult<()> {
        self.update(|state| state.submissions.push(submission.clone()))
            .await
    }

    async fn delete_submissions(&self, scope: &Scope) -> StoreResult<()> {
        self.update(|state| state.submissions.retain(|s| &s.scope != scope))
            .await
    }

    async fn delete_member_submissions(
        &self,
        scope: &Scope,
        season_number: i64,
        submitter_id: &str,
    ) -> StoreResult<u64> {
        self.update(|state| {
            let before = state.submissions.len();
            state.submissions.retain(|s| {
                !(&s.scope == scope
                    && s.season_number == season_number
                    && s.submitter_id == submitter_id)
            });
            (before - state.submissions.len()) as u64
        })
        .await
    }

    async fn record_submission(
        &self,
        submission: &Submission,
        filled_categories: &[String],
        archive: &ArchiveRecord,
    ) -> StoreResult<()> {
        self.update(|state| {
            state.submissions.push(submission.clone());
            upsert_tracker(
                &mut state.trackers,
                &submission.scope,
                submission.season_number,
                &submission.submitter_id,
                filled_categories,
            );
            insert_archive(&mut state.archive, archive);
        })
        .await
    }

    async fn get_user_tracker(
        &self,
        scope: &Scope,
        season_number: i64,
        submitter_id: &str,
    ) -> StoreResult<Vec<String>> {
        Ok(self
            .state
            .read()
            .await
            .trackers
            .iter()
            .find(|t| {
                &t.scope == scope
                    && t.season_number == season_number
                    && t.submitter_id == submitter_id
            })
            .map(|t| t.categories.clone())
            .unwrap_or_default())
    }

    async fn set_user_tracker(
        &self,
        scope: &Scope,
        season_number: i64,
        submitter_id: &str,
        categories: &[String],
    ) -> StoreResult<()> {
        self.update(|state| {
            upsert_tracker(
                &mut state.trackers,
                scope,
                season_number,
                submitter_id,
                categories,
            );
        })
        .await
    }

    async fn clear_user_trackers(&self, scope: &Scope) -> StoreResult<()> {
        self.update(|state| state.trackers.retain(|t| &t.scope != scope))
            .await
    }

    async fn find_archive_record(
        &self,
        scope: &Scope,
        title_key: &str,
    ) -> StoreResult<Option<ArchiveRecord>> {
        Ok(self
            .state
            .read()
            .await
            .archive
            .iter()
            .filter(|r| &r.scope == scope && r.title_key == title_key)
            .min_by_key(|r| r.season_number)
            .cloned())
    }

    async fn insert_archive_record(&self, record: &ArchiveRecord) -> StoreResult<()> {
        self.update(|state| insert_archive(&mut state.archive, record))
            .await
    }

    async fn list_history(
        &self,
        scope: &Scope,
        season_number: Option<i64>,
    ) -> StoreResult<Vec<HistoryEntry>> {
        let state = self.state.read().await;
        let mut entries: Vec<HistoryEntry> = state
            .history
            .iter()
            .filter(|h| &h.scope == scope)
            .filter(|h| season_number.map_or(true, |n| h.season_number == n))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.picked_at.cmp(&a.picked_at));
        Ok(entries)
    }

    async fn insert_history_entry(&self, entry: &HistoryEntry) -> StoreResult<()> {
        self.update(|state| state.history.push(entry.clone()))
            .await
    }

    async fn insert_review(&self, review: &Review) -> StoreResult<()> {
        self.update(|state| state.reviews.push(review.clone()))
            .await
    }

    async fn list_reviews(
        &self,
        scope: &Scope,
        title_key: Option<&str>,
    ) -> StoreResult<Vec<Review>> {
        let state = self.state.read().await;
        let mut reviews: Vec<Review> = state
            .reviews
            .iter()
            .filter(|r| &r.scope == scope)
            .filter(|r| title_key.map_or(true, |key| r.title_key == key))
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }

    async fn mark_watched(&self, entry: &WatchedEntry) -> StoreResult<WatchedEntry> {
        {
            let state = self.state.read().await;
            if let Some(existing) = find_watched(&state.watched, entry) {
                return Ok(existing.clone());
            }
        }

        self.update(|state| match find_watched(&state.watched, entry) {
            Some(existing) => existing.clone(),
            None => {
                state.watched.push(entry.clone());
                entry.clone()
            }
        })
        .await
    }

    async fn list_watched(&self, scope: &Scope, user_id: &str) -> StoreResult<Vec<WatchedEntry>> {
        let state = self.state.read().await;
        let mut watched: Vec<WatchedEntry> = state
            .watched
            .iter()
            .filter(|w| &w.scope == scope && w.user_id == user_id)
            .cloned()
            .collect();
        watched.sort_by(|a, b| a.watched_at.cmp(&b.watched_at));
        Ok(watched)
    }

    async fn get_scope_settings(&self, scope: &Scope) -> StoreResult<Option<ScopeSettings>> {
        Ok(self.state.read().await.settings.get(&scope.key()).cloned())
    }

    async fn put_scope_settings(&self, scope: &Scope, settings: &ScopeSettings) -> StoreResult<()> {
        self.update(|state| {
            state.settings.insert(scope.key(), settings.clone());
        })
        .await
    }
}

fn upsert_tracker(
    trackers: &mut Vec<TrackerRecord>,
    scope: &Scope,
    season_number: i64,
    submitter_id: &str,
    categories: &[String],
) {
    match trackers.iter_mut().find(|t| {
        &t.scope == scope && t.season_number == season_number && t.submitter_id == submitter_id
    }) {
        Some(existing) => existing.categories = categories.to_vec(),
        None => trackers.push(TrackerRecord {
            scope: scope.clone(),
            season_number,
            submitter_id: submitter_id.to_string(),
            categories: categories.to_vec(),
        }),
    }
}

fn find_watched<'a>(watched: &'a [WatchedEntry], entry: &WatchedEntry) -> Option<&'a WatchedEntry> {
    watched.iter().find(|w| {
        w.scope == entry.scope && w.user_id == entry.user_id && w.title_key == entry.title_key
    })
}

fn insert_archive(archive: &mut Vec<ArchiveRecord>, record: &ArchiveRecord) {
    let exists = archive.iter().any(|r| {
        r.scope == record.scope
            && r.title_key == record.title_key
            && r.season_number == record.season_number
    });
    if !exists {
        archive.push(record.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use chrono::Utc;

    fn submission(scope: &Scope, season: i64, title: &str, submitter: &str) -> Submission {
        Submission::new(
            scope.clone(),
            season,
            title.to_string(),
            title.to_lowercase(),
            "desc".to_string(),
            "top-pick".to_string(),
            submitter.to_string(),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn archive_lookup_returns_earliest_season() {
        let store = MemoryStore::new();
        let scope = Scope::club("c1");
        let mut later = ArchiveRecord::for_submission(&submission(&scope, 3, "Arrival", "a"));
        store.insert_archive_record(&later).await.unwrap();
        later.season_number = 1;
        store.insert_archive_record(&later).await.unwrap();

        let found = store
            .find_archive_record(&scope, "arrival")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.season_number, 1);
    }

    #[tokio::test]
    async fn archive_is_first_write_wins_per_season() {
        let store = MemoryStore::new();
        let scope = Scope::global();
        let first = ArchiveRecord::for_submission(&submission(&scope, 1, "Arrival", "a"));
        let mut second = first.clone();
        second.title = "ARRIVAL".to_string();

        store.insert_archive_record(&first).await.unwrap();
        store.insert_archive_record(&second).await.unwrap();

        let found = store
            .find_archive_record(&scope, "arrival")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.title, "Arrival");
    }

    #[tokio::test]
    async fn season_history_appends_once() {
        let store = MemoryStore::new();
        let mut season = Season::first(Scope::club("c1"), Utc::now(), 4);
        season.end_date = Some(Utc::now());

        store.archive_season(&season).await.unwrap();
        store.archive_season(&season).await.unwrap();
        store.append_season_history(&season).await.unwrap();

        let history = store.list_seasons_history(&season.scope).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn delete_submissions_is_scoped() {
        let store = MemoryStore::new();
        let a = Scope::club("a");
        let b = Scope::club("b");
        store.insert_submission(&submission(&a, 1, "One", "u")).await.unwrap();
        store.insert_submission(&submission(&b, 1, "Two", "u")).await.unwrap();

        store.delete_submissions(&a).await.unwrap();

        assert!(store.list_submissions(&a, 1).await.unwrap().is_empty());
        assert_eq!(store.list_submissions(&b, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seasons.json");
        let scope = Scope::club("c1");

        {
            let store = MemoryStore::open(&path).await.unwrap();
            store
                .put_season(&Season::first(scope.clone(), Utc::now(), 6))
                .await
                .unwrap();
            store
                .set_user_tracker(&scope, 1, "alice", &["top-pick".to_string()])
                .await
                .unwrap();
        }

        let reopened = MemoryStore::open(&path).await.unwrap();
        let season = reopened.get_season(&scope).await.unwrap().unwrap();
        assert_eq!(season.length_weeks, 6);
        assert_eq!(
            reopened.get_user_tracker(&scope, 1, "alice").await.unwrap(),
            vec!["top-pick".to_string()]
        );
    }

    #[tokio::test]
    async fn failed_snapshot_write_leaves_state_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let snap_dir = dir.path().join("snap");
        let path = snap_dir.join("seasons.json");
        let scope = Scope::club("c1");

        let store = MemoryStore::open(&path).await.unwrap();
        store
            .put_season(&Season::first(scope.clone(), Utc::now(), 6))
            .await
            .unwrap();

        // The snapshot's parent becomes a regular file, so every write fails.
        std::fs::remove_dir_all(&snap_dir).unwrap();
        std::fs::write(&snap_dir, b"not a directory").unwrap();

        let err = store
            .put_season(&Season::first(scope.clone(), Utc::now(), 10))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));

        let sub = submission(&scope, 1, "Arrival", "alice");
        let err = store
            .record_submission(
                &sub,
                &["top-pick".to_string()],
                &ArchiveRecord::for_submission(&sub),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));

        let removed = store.delete_member_submissions(&scope, 1, "alice").await;
        assert!(removed.is_err());

        assert_eq!(store.get_season(&scope).await.unwrap().unwrap().length_weeks, 6);
        assert!(store.list_submissions(&scope, 1).await.unwrap().is_empty());
        assert!(store.get_user_tracker(&scope, 1, "alice").await.unwrap().is_empty());
        assert!(store.find_archive_record(&scope, "arrival").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mark_watched_keeps_first_entry() {
        let store = MemoryStore::new();
        let scope = Scope::club("c1");
        let first = WatchedEntry {
            scope: scope.clone(),
            user_id: "alice".to_string(),
            movie_title: "Arrival".to_string(),
            title_key: "arrival".to_string(),
            watched_at: Utc::now(),
        };
        let again = WatchedEntry {
            movie_title: "ARRIVAL".to_string(),
            watched_at: first.watched_at + chrono::Duration::days(1),
            ..first.clone()
        };

        assert_eq!(store.mark_watched(&first).await.unwrap(), first);
        assert_eq!(store.mark_watched(&again).await.unwrap(), first);
        assert_eq!(store.list_watched(&scope, "alice").await.unwrap(), vec![first]);
        assert!(store.list_watched(&Scope::global(), "alice").await.unwrap().is_empty());
    }
}
