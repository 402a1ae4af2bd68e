//! Season engine error types
//!
//! Validation failures are ordinary outcomes and each carries its own
//! message; only `Persistence` indicates something actually went wrong.

use super::reviews::{MAX_RATING, MIN_RATING};
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum RolloverError {
    #[error("Current season is still active (week {current_week} of {total_weeks})")]
    SeasonStillActive { current_week: u32, total_weeks: u32 },

    #[error("Only admins can start a new season")]
    Unauthorized,
}

#[derive(Debug, thiserror::Error)]
pub enum SeasonError {
    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("Category must be one of: {}", allowed.join(", "))]
    InvalidCategory {
        category: String,
        allowed: Vec<String>,
    },

    #[error("\"{title}\" has already been submitted this season")]
    DuplicateInSeason { title: String },

    #[error("\"{title}\" was submitted in a previous season (season {season_number})")]
    DuplicateAcrossSeasons { title: String, season_number: i64 },

    #[error("You can only submit one entry per category ({category} is already filled)")]
    CategoryAlreadyFilled { category: String },

    #[error("You have already submitted for all categories")]
    AllCategoriesFilled,

    #[error("No submissions available to pick")]
    NoEligibleSubmissions,

    #[error("Season {season_number} has ended; an admin must start a new season")]
    SeasonEnded { season_number: i64 },

    #[error(transparent)]
    Rollover(#[from] RolloverError),

    #[error("Only admins can {action}")]
    Unauthorized { action: &'static str },

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Rating must be between {} and {}", MIN_RATING, MAX_RATING)]
    InvalidRating { rating: i64 },

    #[error("Persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl SeasonError {
    /// Stable identifier for the error kind, for callers that branch on it.
    pub fn kind(&self) -> &'static str {
        match self {
            SeasonError::MissingField { .. } => "missing_field",
            SeasonError::InvalidCategory { .. } => "invalid_category",
            SeasonError::DuplicateInSeason { .. } => "duplicate_in_season",
            SeasonError::DuplicateAcrossSeasons { .. } => "duplicate_across_seasons",
            SeasonError::CategoryAlreadyFilled { .. } => "category_already_filled",
            SeasonError::AllCategoriesFilled => "all_categories_filled",
            SeasonError::NoEligibleSubmissions => "no_eligible_submissions",
            SeasonError::SeasonEnded { .. } => "season_ended",
            SeasonError::Rollover(RolloverError::SeasonStillActive { .. }) => "season_still_active",
            SeasonError::Rollover(RolloverError::Unauthorized) | SeasonError::Unauthorized { .. } => {
                "unauthorized"
            }
            SeasonError::InvalidSettings(_) => "invalid_settings",
            SeasonError::InvalidRating { .. } => "invalid_rating",
            SeasonError::Persistence(_) => "persistence_failure",
        }
    }

    /// True for user-facing rejections of a submission, review or settings change.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SeasonError::MissingField { .. }
                | SeasonError::InvalidCategory { .. }
                | SeasonError::DuplicateInSeason { .. }
                | SeasonError::DuplicateAcrossSeasons { .. }
                | SeasonError::CategoryAlreadyFilled { .. }
                | SeasonError::AllCategoriesFilled
                | SeasonError::SeasonEnded { .. }
                | SeasonError::InvalidSettings(_)
                | SeasonError::InvalidRating { .. }
        )
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            SeasonError::Unauthorized { .. } | SeasonError::Rollover(RolloverError::Unauthorized)
        )
    }
}

pub type SeasonResult<T> = Result<T, SeasonError>;
