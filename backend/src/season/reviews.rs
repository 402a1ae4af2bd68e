//! Reviews and watch list
//!
//! Members mark titles as watched and post reviews. Titles are matched by
//! their normalized form, so "Arrival" and " ARRIVAL " refer to the same film.
//! The weekly feed shows reviews of the titles chosen by the scope's most
//! recent pick.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{
    context::SeasonContext,
    error::{SeasonError, SeasonResult},
    submission::normalize_title,
};
use crate::{
    audit,
    db::models::{Review, Scope, WatchedEntry},
};

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// A review as received from a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReview {
    pub user_id: String,
    pub movie_title: String,
    #[serde(default)]
    pub rating: Option<i64>,
    pub review: String,
}

pub(crate) struct ReviewService {
    ctx: Arc<SeasonContext>,
}

impl ReviewService {
    pub(crate) fn new(ctx: Arc<SeasonContext>) -> Self {
        Self { ctx }
    }

    /// Marks the title watched. Marking it again returns the first entry.
    pub(crate) async fn mark_watched(
        &self,
        scope: &Scope,
        user_id: &str,
        movie_title: &str,
    ) -> SeasonResult<WatchedEntry> {
        let user_id = required(user_id, "user_id")?;
        let movie_title = required(movie_title, "movie_title")?;

        let entry = WatchedEntry {
            scope: scope.clone(),
            user_id,
            title_key: normalize_title(&movie_title),
            movie_title,
            watched_at: self.ctx.now(),
        };
        Ok(self.ctx.store.mark_watched(&entry).await?)
    }

    pub(crate) async fn list_watched(
        &self,
        scope: &Scope,
        user_id: &str,
    ) -> SeasonResult<Vec<WatchedEntry>> {
        Ok(self.ctx.store.list_watched(scope, user_id.trim()).await?)
    }

    pub(crate) async fn add_review(&self, scope: &Scope, new: NewReview) -> SeasonResult<Review> {
        let user_id = required(&new.user_id, "user_id")?;
        let movie_title = required(&new.movie_title, "movie_title")?;
        let text = required(&new.review, "review")?;
        let rating = new.rating.map(validate_rating).transpose()?;
        let title_key = normalize_title(&movie_title);

        let review = Review::new(
            scope.clone(),
            user_id,
            movie_title,
            title_key,
            rating,
            text,
            self.ctx.now(),
        );
        self.ctx.store.insert_review(&review).await?;

        audit::log_review(scope, &review.user_id, &review.movie_title, review.rating);
        Ok(review)
    }

    /// Reviews newest first. A blank title means every review in the scope.
    pub(crate) async fn list_reviews(
        &self,
        scope: &Scope,
        movie_title: Option<&str>,
    ) -> SeasonResult<Vec<Review>> {
        let title_key = movie_title
            .map(normalize_title)
            .filter(|key| !key.is_empty());
        Ok(self
            .ctx
            .store
            .list_reviews(scope, title_key.as_deref())
            .await?)
    }

    /// Reviews of the winners of the scope's latest pick, newest first.
    /// Empty when the scope has never picked.
    pub(crate) async fn weekly_reviews(&self, scope: &Scope) -> SeasonResult<Vec<Review>> {
        let history = self.ctx.store.list_history(scope, None).await?;
        let Some(latest) = history.first() else {
            return Ok(Vec::new());
        };

        let mut reviews = Vec::new();
        for winner in &latest.winners {
            let key = normalize_title(&winner.title);
            reviews.extend(self.ctx.store.list_reviews(scope, Some(&key)).await?);
        }
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }
}

fn required(value: &str, field: &'static str) -> SeasonResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(SeasonError::MissingField { field });
    }
    Ok(value.to_string())
}

fn validate_rating(rating: i64) -> SeasonResult<u8> {
    u8::try_from(rating)
        .ok()
        .filter(|r| (MIN_RATING..=MAX_RATING).contains(r))
        .ok_or(SeasonError::InvalidRating { rating })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratings_outside_range_are_rejected() {
        assert_eq!(validate_rating(1).unwrap(), 1);
        assert_eq!(validate_rating(5).unwrap(), 5);
        for bad in [0, 6, -1, 300] {
            let err = validate_rating(bad).unwrap_err();
            assert!(matches!(err, SeasonError::InvalidRating { rating } if rating == bad));
        }
    }

    #[test]
    fn blank_fields_are_missing() {
        assert_eq!(required("  Arrival ", "movie_title").unwrap(), "Arrival");
        assert!(matches!(
            required("   ", "review"),
            Err(SeasonError::MissingField { field: "review" })
        ));
    }
}
