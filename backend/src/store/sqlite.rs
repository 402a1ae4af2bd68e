//! SQLite adapter for the season store.
//!
//! Timestamps are stored as fixed-width RFC 3339 text so that ordering by
//! column matches chronological order. Winner lists and category lists are
//! JSON text columns.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{FromRow, Sqlite};

use super::{SeasonStore, StoreError, StoreResult};
use crate::db::{
    models::{
        ArchiveRecord, HistoryEntry, Review, Scope, ScopeSettings, Season, Submission,
        WatchedEntry,
    },
    DbPool,
};

pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ts(value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp {:?}: {}", value, e)))
}

fn to_weeks(value: i64) -> StoreResult<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("bad season length {}", value)))
}

// ============================================================================
// Rows
// ============================================================================

#[derive(Debug, FromRow)]
struct SeasonRow {
    scope_key: String,
    season_number: i64,
    start_date: String,
    length_weeks: i64,
    end_date: Option<String>,
}

impl TryFrom<SeasonRow> for Season {
    type Error = StoreError;

    fn try_from(row: SeasonRow) -> StoreResult<Self> {
        Ok(Season {
            scope: Scope::from_key(&row.scope_key),
            season_number: row.season_number,
            start_date: parse_ts(&row.start_date)?,
            length_weeks: to_weeks(row.length_weeks)?,
            end_date: row.end_date.as_deref().map(parse_ts).transpose()?,
        })
    }
}

#[derive(Debug, FromRow)]
struct SubmissionRow {
    id: String,
    scope_key: String,
    season_number: i64,
    title: String,
    title_key: String,
    description: String,
    category: String,
    submitter_id: String,
    submitted_at: String,
}

impl TryFrom<SubmissionRow> for Submission {
    type Error = StoreError;

    fn try_from(row: SubmissionRow) -> StoreResult<Self> {
        Ok(Submission {
            id: row.id,
            scope: Scope::from_key(&row.scope_key),
            season_number: row.season_number,
            title: row.title,
            title_key: row.title_key,
            description: row.description,
            category: row.category,
            submitter_id: row.submitter_id,
            submitted_at: parse_ts(&row.submitted_at)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct ArchiveRow {
    scope_key: String,
    title_key: String,
    season_number: i64,
    title: String,
    recorded_at: String,
}

impl TryFrom<ArchiveRow> for ArchiveRecord {
    type Error = StoreError;

    fn try_from(row: ArchiveRow) -> StoreResult<Self> {
        Ok(ArchiveRecord {
            scope: Scope::from_key(&row.scope_key),
            title_key: row.title_key,
            season_number: row.season_number,
            title: row.title,
            recorded_at: parse_ts(&row.recorded_at)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct HistoryRow {
    id: String,
    scope_key: String,
    season_number: i64,
    picked_at: String,
    submissions_count: i64,
    winners: String,
    skipped_categories: String,
}

impl TryFrom<HistoryRow> for HistoryEntry {
    type Error = StoreError;

    fn try_from(row: HistoryRow) -> StoreResult<Self> {
        Ok(HistoryEntry {
            id: row.id,
            scope: Scope::from_key(&row.scope_key),
            season_number: row.season_number,
            picked_at: parse_ts(&row.picked_at)?,
            submissions_count_at_pick: row.submissions_count,
            winners: serde_json::from_str(&row.winners)?,
            skipped_categories: serde_json::from_str(&row.skipped_categories)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct ReviewRow {
    id: String,
    scope_key: String,
    user_id: String,
    movie_title: String,
    title_key: String,
    rating: Option<i64>,
    review: String,
    created_at: String,
}

impl TryFrom<ReviewRow> for Review {
    type Error = StoreError;

    fn try_from(row: ReviewRow) -> StoreResult<Self> {
        let rating = row
            .rating
            .map(|r| u8::try_from(r).map_err(|_| StoreError::Corrupt(format!("bad rating {}", r))))
            .transpose()?;
        Ok(Review {
            id: row.id,
            scope: Scope::from_key(&row.scope_key),
            user_id: row.user_id,
            movie_title: row.movie_title,
            title_key: row.title_key,
            rating,
            review: row.review,
            created_at: parse_ts(&row.created_at)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct WatchedRow {
    scope_key: String,
    user_id: String,
    title_key: String,
    movie_title: String,
    watched_at: String,
}

impl TryFrom<WatchedRow> for WatchedEntry {
    type Error = StoreError;

    fn try_from(row: WatchedRow) -> StoreResult<Self> {
        Ok(WatchedEntry {
            scope: Scope::from_key(&row.scope_key),
            user_id: row.user_id,
            movie_title: row.movie_title,
            title_key: row.title_key,
            watched_at: parse_ts(&row.watched_at)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct SettingsRow {
    categories: String,
    season_length_weeks: i64,
}

// ============================================================================
// Shared statements (usable on the pool or inside a transaction)
// ============================================================================

async fn upsert_season<'e, E>(executor: E, season: &Season) -> StoreResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO seasons (scope_key, season_number, start_date, length_weeks, end_date)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(scope_key) DO UPDATE SET
            season_number = excluded.season_number,
            start_date = excluded.start_date,
            length_weeks = excluded.length_weeks,
            end_date = excluded.end_date",
    )
    .bind(season.scope.key())
    .bind(season.season_number)
    .bind(fmt_ts(&season.start_date))
    .bind(i64::from(season.length_weeks))
    .bind(season.end_date.as_ref().map(fmt_ts))
    .execute(executor)
    .await?;
    Ok(())
}

async fn insert_season_history<'e, E>(executor: E, season: &Season) -> StoreResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT OR IGNORE INTO season_history (scope_key, season_number, start_date, length_weeks, end_date)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(season.scope.key())
    .bind(season.season_number)
    .bind(fmt_ts(&season.start_date))
    .bind(i64::from(season.length_weeks))
    .bind(season.end_date.as_ref().map(fmt_ts))
    .execute(executor)
    .await?;
    Ok(())
}

async fn insert_submission_row<'e, E>(executor: E, submission: &Submission) -> StoreResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO submissions (id, scope_key, season_number, title, title_key, description, category, submitter_id, submitted_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&submission.id)
    .bind(submission.scope.key())
    .bind(submission.season_number)
    .bind(&submission.title)
    .bind(&submission.title_key)
    .bind(&submission.description)
    .bind(&submission.category)
    .bind(&submission.submitter_id)
    .bind(fmt_ts(&submission.submitted_at))
    .execute(executor)
    .await?;
    Ok(())
}

async fn upsert_tracker<'e, E>(
    executor: E,
    scope: &Scope,
    season_number: i64,
    submitter_id: &str,
    categories: &[String],
) -> StoreResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let categories_json = serde_json::to_string(categories)?;
    sqlx::query(
        "INSERT INTO user_trackers (scope_key, season_number, submitter_id, categories)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(scope_key, season_number, submitter_id) DO UPDATE SET
            categories = excluded.categories",
    )
    .bind(scope.key())
    .bind(season_number)
    .bind(submitter_id)
    .bind(categories_json)
    .execute(executor)
    .await?;
    Ok(())
}

async fn insert_archive_row<'e, E>(executor: E, record: &ArchiveRecord) -> StoreResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT OR IGNORE INTO archive_records (scope_key, title_key, season_number, title, recorded_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(record.scope.key())
    .bind(&record.title_key)
    .bind(record.season_number)
    .bind(&record.title)
    .bind(fmt_ts(&record.recorded_at))
    .execute(executor)
    .await?;
    Ok(())
}

// ============================================================================
// Port implementation
// ============================================================================

#[async_trait]
impl SeasonStore for SqliteStore {
    async fn get_season(&self, scope: &Scope) -> StoreResult<Option<Season>> {
        sqlx::query_as::<_, SeasonRow>("SELECT * FROM seasons WHERE scope_key = ?")
            .bind(scope.key())
            .fetch_optional(&self.pool)
            .await?
            .map(Season::try_from)
            .transpose()
    }

    async fn put_season(&self, season: &Season) -> StoreResult<()> {
        upsert_season(&self.pool, season).await
    }

    async fn list_seasons_history(&self, scope: &Scope) -> StoreResult<Vec<Season>> {
        sqlx::query_as::<_, SeasonRow>(
            "SELECT * FROM season_history WHERE scope_key = ? ORDER BY season_number",
        )
        .bind(scope.key())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Season::try_from)
        .collect()
    }

    async fn append_season_history(&self, season: &Season) -> StoreResult<()> {
        insert_season_history(&self.pool, season).await
    }

    async fn archive_season(&self, season: &Season) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        upsert_season(&mut *tx, season).await?;
        insert_season_history(&mut *tx, season).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn replace_season(
        &self,
        ended: &Season,
        append_ended: bool,
        next: &Season,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        if append_ended {
            insert_season_history(&mut *tx, ended).await?;
        }
        upsert_season(&mut *tx, next).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_scopes(&self) -> StoreResult<Vec<Scope>> {
        let keys: Vec<String> =
            sqlx::query_scalar("SELECT scope_key FROM seasons ORDER BY scope_key")
                .fetch_all(&self.pool)
                .await?;
        Ok(keys.iter().map(|k| Scope::from_key(k)).collect())
    }

    async fn list_submissions(
        &self,
        scope: &Scope,
        season_number: i64,
    ) -> StoreResult<Vec<Submission>> {
        sqlx::query_as::<_, SubmissionRow>(
            "SELECT * FROM submissions WHERE scope_key = ? AND season_number = ? ORDER BY submitted_at",
        )
        .bind(scope.key())
        .bind(season_number)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Submission::try_from)
        .collect()
    }

    async fn insert_submission(&self, submission: &Submission) -> StoreResult<()> {
        insert_submission_row(&self.pool, submission).await
    }

    async fn delete_submissions(&self, scope: &Scope) -> StoreResult<()> {
        sqlx::query("DELETE FROM submissions WHERE scope_key = ?")
            .bind(scope.key())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_member_submissions(
        &self,
        scope: &Scope,
        season_number: i64,
        submitter_id: &str,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "DELETE FROM submissions WHERE scope_key = ? AND season_number = ? AND submitter_id = ?",
        )
        .bind(scope.key())
        .bind(season_number)
        .bind(submitter_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn record_submission(
        &self,
        submission: &Submission,
        filled_categories: &[String],
        archive: &ArchiveRecord,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_submission_row(&mut *tx, submission).await?;
        upsert_tracker(
            &mut *tx,
            &submission.scope,
            submission.season_number,
            &submission.submitter_id,
            filled_categories,
        )
        .await?;
        insert_archive_row(&mut *tx, archive).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_user_tracker(
        &self,
        scope: &Scope,
        season_number: i64,
        submitter_id: &str,
    ) -> StoreResult<Vec<String>> {
        let categories: Option<String> = sqlx::query_scalar(
            "SELECT categories FROM user_trackers WHERE scope_key = ? AND season_number = ? AND submitter_id = ?",
        )
        .bind(scope.key())
        .bind(season_number)
        .bind(submitter_id)
        .fetch_optional(&self.pool)
        .await?;

        match categories {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    async fn set_user_tracker(
        &self,
        scope: &Scope,
        season_number: i64,
        submitter_id: &str,
        categories: &[String],
    ) -> StoreResult<()> {
        upsert_tracker(&self.pool, scope, season_number, submitter_id, categories).await
    }

    async fn clear_user_trackers(&self, scope: &Scope) -> StoreResult<()> {
        sqlx::query("DELETE FROM user_trackers WHERE scope_key = ?")
            .bind(scope.key())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_archive_record(
        &self,
        scope: &Scope,
        title_key: &str,
    ) -> StoreResult<Option<ArchiveRecord>> {
        sqlx::query_as::<_, ArchiveRow>(
            "SELECT * FROM archive_records WHERE scope_key = ? AND title_key = ?
             ORDER BY season_number ASC LIMIT 1",
        )
        .bind(scope.key())
        .bind(title_key)
        .fetch_optional(&self.pool)
        .await?
        .map(ArchiveRecord::try_from)
        .transpose()
    }

    async fn insert_archive_record(&self, record: &ArchiveRecord) -> StoreResult<()> {
        insert_archive_row(&self.pool, record).await
    }

    async fn list_history(
        &self,
        scope: &Scope,
        season_number: Option<i64>,
    ) -> StoreResult<Vec<HistoryEntry>> {
        let rows = match season_number {
            Some(number) => {
                sqlx::query_as::<_, HistoryRow>(
                    "SELECT * FROM history_entries WHERE scope_key = ? AND season_number = ?
                     ORDER BY picked_at DESC",
                )
                .bind(scope.key())
                .bind(number)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, HistoryRow>(
                    "SELECT * FROM history_entries WHERE scope_key = ? ORDER BY picked_at DESC",
                )
                .bind(scope.key())
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(HistoryEntry::try_from).collect()
    }

    async fn insert_history_entry(&self, entry: &HistoryEntry) -> StoreResult<()> {
        let winners_json = serde_json::to_string(&entry.winners)?;
        let skipped_json = serde_json::to_string(&entry.skipped_categories)?;

        sqlx::query(
            "INSERT INTO history_entries (id, scope_key, season_number, picked_at, submissions_count, winners, skipped_categories)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(entry.scope.key())
        .bind(entry.season_number)
        .bind(fmt_ts(&entry.picked_at))
        .bind(entry.submissions_count_at_pick)
        .bind(winners_json)
        .bind(skipped_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_review(&self, review: &Review) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO reviews (id, scope_key, user_id, movie_title, title_key, rating, review, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&review.id)
        .bind(review.scope.key())
        .bind(&review.user_id)
        .bind(&review.movie_title)
        .bind(&review.title_key)
        .bind(review.rating.map(i64::from))
        .bind(&review.review)
        .bind(fmt_ts(&review.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_reviews(
        &self,
        scope: &Scope,
        title_key: Option<&str>,
    ) -> StoreResult<Vec<Review>> {
        let rows = match title_key {
            Some(key) => {
                sqlx::query_as::<_, ReviewRow>(
                    "SELECT * FROM reviews WHERE scope_key = ? AND title_key = ?
                     ORDER BY created_at DESC",
                )
                .bind(scope.key())
                .bind(key)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, ReviewRow>(
                    "SELECT * FROM reviews WHERE scope_key = ? ORDER BY created_at DESC",
                )
                .bind(scope.key())
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(Review::try_from).collect()
    }

    async fn mark_watched(&self, entry: &WatchedEntry) -> StoreResult<WatchedEntry> {
        sqlx::query(
            "INSERT INTO watched_titles (scope_key, user_id, title_key, movie_title, watched_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(scope_key, user_id, title_key) DO NOTHING",
        )
        .bind(entry.scope.key())
        .bind(&entry.user_id)
        .bind(&entry.title_key)
        .bind(&entry.movie_title)
        .bind(fmt_ts(&entry.watched_at))
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, WatchedRow>(
            "SELECT * FROM watched_titles WHERE scope_key = ? AND user_id = ? AND title_key = ?",
        )
        .bind(entry.scope.key())
        .bind(&entry.user_id)
        .bind(&entry.title_key)
        .fetch_one(&self.pool)
        .await?;
        WatchedEntry::try_from(row)
    }

    async fn list_watched(&self, scope: &Scope, user_id: &str) -> StoreResult<Vec<WatchedEntry>> {
        sqlx::query_as::<_, WatchedRow>(
            "SELECT * FROM watched_titles WHERE scope_key = ? AND user_id = ?
             ORDER BY watched_at ASC",
        )
        .bind(scope.key())
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(WatchedEntry::try_from)
        .collect()
    }

    async fn get_scope_settings(&self, scope: &Scope) -> StoreResult<Option<ScopeSettings>> {
        let row = sqlx::query_as::<_, SettingsRow>(
            "SELECT categories, season_length_weeks FROM scope_settings WHERE scope_key = ?",
        )
        .bind(scope.key())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(ScopeSettings {
                categories: serde_json::from_str(&row.categories)?,
                season_length_weeks: to_weeks(row.season_length_weeks)?,
            })),
            None => Ok(None),
        }
    }

    async fn put_scope_settings(&self, scope: &Scope, settings: &ScopeSettings) -> StoreResult<()> {
        let categories_json = serde_json::to_string(&settings.categories)?;
        sqlx::query(
            "INSERT INTO scope_settings (scope_key, categories, season_length_weeks)
             VALUES (?, ?, ?)
             ON CONFLICT(scope_key) DO UPDATE SET
                categories = excluded.categories,
                season_length_weeks = excluded.season_length_weeks",
        )
        .bind(scope.key())
        .bind(categories_json)
        .bind(i64::from(settings.season_length_weeks))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
