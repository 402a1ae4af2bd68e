use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::season::clock;

/// Categories used by a scope that has no configured list.
pub const DEFAULT_CATEGORIES: [&str; 2] = ["top-pick", "wild-card"];

// ============================================================================
// Scope
// ============================================================================

/// Partition key for seasons and submissions: a club, or the global context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(Option<String>);

impl Scope {
    const GLOBAL_KEY: &'static str = "global";
    const CLUB_PREFIX: &'static str = "club:";

    pub fn global() -> Self {
        Self(None)
    }

    pub fn club(club_id: impl Into<String>) -> Self {
        Self(Some(club_id.into()))
    }

    pub fn club_id(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_global(&self) -> bool {
        self.0.is_none()
    }

    /// Storage key used by persistence adapters.
    pub fn key(&self) -> String {
        match &self.0 {
            None => Self::GLOBAL_KEY.to_string(),
            Some(id) => format!("{}{}", Self::CLUB_PREFIX, id),
        }
    }

    /// Inverse of [`Scope::key`]. Unprefixed keys other than `global` are
    /// treated as club ids.
    pub fn from_key(key: &str) -> Self {
        if key == Self::GLOBAL_KEY {
            Self::global()
        } else {
            Self::club(key.strip_prefix(Self::CLUB_PREFIX).unwrap_or(key))
        }
    }

    /// Parses a URL path segment: `global` or a club id.
    pub fn from_path(segment: &str) -> Self {
        if segment.eq_ignore_ascii_case(Self::GLOBAL_KEY) {
            Self::global()
        } else {
            Self::club(segment)
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            None => write!(f, "global"),
            Some(id) => write!(f, "club {}", id),
        }
    }
}

// ============================================================================
// Scope settings
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeSettings {
    pub categories: Vec<String>,
    pub season_length_weeks: u32,
}

impl Default for ScopeSettings {
    fn default() -> Self {
        Self {
            categories: default_categories(),
            season_length_weeks: clock::DEFAULT_SEASON_WEEKS,
        }
    }
}

pub fn default_categories() -> Vec<String> {
    DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect()
}

// ============================================================================
// Season
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Season {
    pub scope: Scope,
    pub season_number: i64,
    pub start_date: DateTime<Utc>,
    pub length_weeks: u32,
    /// Set once the season has been archived.
    pub end_date: Option<DateTime<Utc>>,
}

impl Season {
    pub fn new(scope: Scope, season_number: i64, start_date: DateTime<Utc>, length_weeks: u32) -> Self {
        Self {
            scope,
            season_number,
            start_date,
            length_weeks,
            end_date: None,
        }
    }

    pub fn first(scope: Scope, start_date: DateTime<Utc>, length_weeks: u32) -> Self {
        Self::new(scope, 1, start_date, length_weeks)
    }

    /// The season that follows this one, starting at `start_date`.
    pub fn successor(&self, start_date: DateTime<Utc>, length_weeks: u32) -> Self {
        Self::new(
            self.scope.clone(),
            self.season_number + 1,
            start_date,
            length_weeks,
        )
    }

    pub fn current_week(&self, now: DateTime<Utc>) -> u32 {
        clock::current_week(self.start_date, self.length_weeks, now)
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.end_date.is_some() || clock::has_expired(self.start_date, self.length_weeks, now)
    }

    pub fn is_archived(&self) -> bool {
        self.end_date.is_some()
    }
}

// ============================================================================
// Submissions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub scope: Scope,
    pub season_number: i64,
    pub title: String,
    /// Normalized title used for duplicate detection.
    pub title_key: String,
    pub description: String,
    pub category: String,
    pub submitter_id: String,
    pub submitted_at: DateTime<Utc>,
}

impl Submission {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        scope: Scope,
        season_number: i64,
        title: String,
        title_key: String,
        description: String,
        category: String,
        submitter_id: String,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            scope,
            season_number,
            title,
            title_key,
            description,
            category,
            submitter_id,
            submitted_at,
        }
    }
}

/// Ledger entry marking that a normalized title was submitted to a scope in
/// a given season. Never removed by a rollover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub scope: Scope,
    pub title_key: String,
    pub season_number: i64,
    pub title: String,
    pub recorded_at: DateTime<Utc>,
}

impl ArchiveRecord {
    pub fn for_submission(submission: &Submission) -> Self {
        Self {
            scope: submission.scope.clone(),
            title_key: submission.title_key.clone(),
            season_number: submission.season_number,
            title: submission.title.clone(),
            recorded_at: submission.submitted_at,
        }
    }
}

// ============================================================================
// Winner history
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub scope: Scope,
    pub season_number: i64,
    pub picked_at: DateTime<Utc>,
    pub submissions_count_at_pick: i64,
    /// One winner per category that had eligible candidates, in category order.
    pub winners: Vec<Submission>,
    pub skipped_categories: Vec<String>,
}

impl HistoryEntry {
    pub fn new(
        scope: Scope,
        season_number: i64,
        picked_at: DateTime<Utc>,
        submissions_count_at_pick: i64,
        winners: Vec<Submission>,
        skipped_categories: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            scope,
            season_number,
            picked_at,
            submissions_count_at_pick,
            winners,
            skipped_categories,
        }
    }
}

// ============================================================================
// Reviews and watch list
// ============================================================================

/// A member's written review of a title. `title_key` is the normalized title
/// used to match reviews against submissions and winners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub scope: Scope,
    pub user_id: String,
    pub movie_title: String,
    pub title_key: String,
    pub rating: Option<u8>,
    pub review: String,
    pub created_at: DateTime<Utc>,
}

impl Review {
    pub fn new(
        scope: Scope,
        user_id: String,
        movie_title: String,
        title_key: String,
        rating: Option<u8>,
        review: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            scope,
            user_id,
            movie_title,
            title_key,
            rating,
            review,
            created_at,
        }
    }
}

/// Marks that a member watched a title. One entry per (scope, member, title).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedEntry {
    pub scope: Scope,
    pub user_id: String,
    pub movie_title: String,
    pub title_key: String,
    pub watched_at: DateTime<Utc>,
}
