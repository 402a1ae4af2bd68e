//! Persistence port for season state.
//!
//! The engine talks to storage only through [`SeasonStore`]. Two adapters
//! are provided: [`MemoryStore`] (optionally snapshotted to a JSON file) and
//! [`SqliteStore`].

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::db::models::{
    default_categories, ArchiveRecord, HistoryEntry, Review, Scope, ScopeSettings, Season,
    Submission, WatchedEntry,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("snapshot i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait SeasonStore: Send + Sync {
    // --- seasons ---

    /// The scope's current season record, ended or not.
    async fn get_season(&self, scope: &Scope) -> StoreResult<Option<Season>>;
    async fn put_season(&self, season: &Season) -> StoreResult<()>;
    async fn list_seasons_history(&self, scope: &Scope) -> StoreResult<Vec<Season>>;
    /// Appends an ended season. Appending the same season number twice is a no-op.
    async fn append_season_history(&self, season: &Season) -> StoreResult<()>;

    /// Stores the stamped season and appends it to the history list.
    async fn archive_season(&self, season: &Season) -> StoreResult<()> {
        self.put_season(season).await?;
        self.append_season_history(season).await
    }

    /// Archives `ended` (when `append_ended` is set) and makes `next` the
    /// scope's current season. Adapters with transactions apply both or neither.
    async fn replace_season(
        &self,
        ended: &Season,
        append_ended: bool,
        next: &Season,
    ) -> StoreResult<()> {
        if append_ended {
            self.append_season_history(ended).await?;
        }
        self.put_season(next).await
    }

    /// Scopes that have a current season record.
    async fn list_scopes(&self) -> StoreResult<Vec<Scope>>;

    // --- submissions ---

    async fn list_submissions(&self, scope: &Scope, season_number: i64)
        -> StoreResult<Vec<Submission>>;
    async fn insert_submission(&self, submission: &Submission) -> StoreResult<()>;
    async fn delete_submissions(&self, scope: &Scope) -> StoreResult<()>;
    async fn delete_member_submissions(
        &self,
        scope: &Scope,
        season_number: i64,
        submitter_id: &str,
    ) -> StoreResult<u64>;

    /// Persists an accepted submission together with the submitter's updated
    /// category list and the archive record.
    async fn record_submission(
        &self,
        submission: &Submission,
        filled_categories: &[String],
        archive: &ArchiveRecord,
    ) -> StoreResult<()> {
        self.insert_submission(submission).await?;
        self.set_user_tracker(
            &submission.scope,
            submission.season_number,
            &submission.submitter_id,
            filled_categories,
        )
        .await?;
        self.insert_archive_record(archive).await
    }

    // --- per-member category trackers ---

    async fn get_user_tracker(
        &self,
        scope: &Scope,
        season_number: i64,
        submitter_id: &str,
    ) -> StoreResult<Vec<String>>;
    async fn set_user_tracker(
        &self,
        scope: &Scope,
        season_number: i64,
        submitter_id: &str,
        categories: &[String],
    ) -> StoreResult<()>;
    async fn clear_user_trackers(&self, scope: &Scope) -> StoreResult<()>;

    // --- archive ---

    /// Earliest-season archive record for the title, if any.
    async fn find_archive_record(
        &self,
        scope: &Scope,
        title_key: &str,
    ) -> StoreResult<Option<ArchiveRecord>>;
    /// First write wins per (scope, title, season).
    async fn insert_archive_record(&self, record: &ArchiveRecord) -> StoreResult<()>;

    // --- winner history ---

    /// Entries newest first, optionally restricted to one season.
    async fn list_history(
        &self,
        scope: &Scope,
        season_number: Option<i64>,
    ) -> StoreResult<Vec<HistoryEntry>>;
    async fn insert_history_entry(&self, entry: &HistoryEntry) -> StoreResult<()>;

    // --- reviews and watch list ---

    async fn insert_review(&self, review: &Review) -> StoreResult<()>;
    /// Reviews newest first, optionally only those of one normalized title.
    async fn list_reviews(&self, scope: &Scope, title_key: Option<&str>)
        -> StoreResult<Vec<Review>>;
    /// Stores the entry unless the member already marked that title, and
    /// returns whichever entry is stored.
    async fn mark_watched(&self, entry: &WatchedEntry) -> StoreResult<WatchedEntry>;
    /// The member's watched titles, oldest first.
    async fn list_watched(&self, scope: &Scope, user_id: &str) -> StoreResult<Vec<WatchedEntry>>;

    // --- scope configuration ---

    async fn get_scope_settings(&self, scope: &Scope) -> StoreResult<Option<ScopeSettings>>;
    async fn put_scope_settings(&self, scope: &Scope, settings: &ScopeSettings) -> StoreResult<()>;

    /// Configured categories, or the default pair when none are configured.
    async fn get_category_list(&self, scope: &Scope) -> StoreResult<Vec<String>> {
        Ok(self
            .get_scope_settings(scope)
            .await?
            .map(|s| s.categories)
            .filter(|c| !c.is_empty())
            .unwrap_or_else(default_categories))
    }

    async fn get_season_length(&self, scope: &Scope) -> StoreResult<Option<u32>> {
        Ok(self
            .get_scope_settings(scope)
            .await?
            .map(|s| s.season_length_weeks))
    }
}
