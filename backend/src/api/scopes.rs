use crate::{
    db::models::{HistoryEntry, Review, Scope, ScopeSettings, Season, Submission, WatchedEntry},
    error::{AppError, Result},
    season::{
        NewReview, NewSubmission, PickResult, SeasonManager, SeasonStatus, SubmissionSummary,
        UserStatus,
    },
};
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";
const MAX_SCOPE_ID_LEN: usize = 64;

// ==================== Request/Response Types ====================

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub submitter_id: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub ok: bool,
    pub message: String,
    pub submission: Submission,
}

#[derive(Debug, Serialize)]
pub struct PickResponse {
    pub ok: bool,
    pub message: String,
    #[serde(flatten)]
    pub result: PickResult,
}

#[derive(Debug, Serialize)]
pub struct NewSeasonResponse {
    pub ok: bool,
    pub message: String,
    pub season: Season,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub ok: bool,
    pub removed_submissions: u64,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub season: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct MarkWatchedRequest {
    #[serde(default)]
    pub movie_title: String,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub movie_title: String,
    pub rating: Option<i64>,
    #[serde(default)]
    pub review: String,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub ok: bool,
    pub review: Review,
}

#[derive(Debug, Deserialize)]
pub struct ReviewsQuery {
    pub title: Option<String>,
}

// ==================== AppState ====================

pub struct AppState {
    pub manager: Arc<SeasonManager>,
    /// Admin routes are refused for everyone when unset.
    pub admin_token: Option<String>,
}

impl AppState {
    fn is_admin(&self, headers: &HeaderMap) -> bool {
        let presented = headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|h| h.to_str().ok());
        matches!(
            (self.admin_token.as_deref(), presented),
            (Some(expected), Some(given)) if expected == given
        )
    }
}

// ==================== Router ====================

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        // Submissions
        .route("/:scope/submissions", post(submit).get(list_submissions))
        .route("/:scope/members/:member/status", get(member_status))
        .route("/:scope/members/:member/reset", post(reset_member))
        // Seasons
        .route("/:scope/season", get(season_status))
        .route("/:scope/season/start", post(start_new_season))
        .route("/:scope/seasons", get(list_seasons))
        // Picks
        .route("/:scope/picks", post(pick_winners))
        .route("/:scope/history", get(list_history))
        // Reviews and watch list
        .route(
            "/:scope/members/:member/watched",
            post(mark_watched).get(list_watched),
        )
        .route("/:scope/reviews", post(add_review).get(list_reviews))
        .route("/:scope/reviews/weekly", get(weekly_reviews))
        // Administration
        .route("/:scope/settings", get(get_settings).put(update_settings))
        .route("/:scope/summary", get(submission_summary))
}

/// Parses the `:scope` path segment: `global` or a club id.
fn parse_scope(segment: &str) -> Result<Scope> {
    let segment = segment.trim();
    let valid = !segment.is_empty()
        && segment.len() <= MAX_SCOPE_ID_LEN
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(AppError::BadRequest(format!("Invalid scope: {:?}", segment)));
    }
    Ok(Scope::from_path(segment))
}

// ==================== Handlers ====================

async fn submit(
    State(state): State<Arc<AppState>>,
    Path(scope): Path<String>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>> {
    let scope = parse_scope(&scope)?;
    let submission = state
        .manager
        .submit(
            &scope,
            NewSubmission {
                submitter_id: req.submitter_id,
                category: req.category,
                title: req.title,
                description: req.description,
            },
        )
        .await?;

    Ok(Json(SubmitResponse {
        ok: true,
        message: format!("\"{}\" submitted for {}", submission.title, submission.category),
        submission,
    }))
}

async fn list_submissions(
    State(state): State<Arc<AppState>>,
    Path(scope): Path<String>,
) -> Result<Json<Vec<Submission>>> {
    let scope = parse_scope(&scope)?;
    Ok(Json(state.manager.list_submissions(&scope).await?))
}

async fn member_status(
    State(state): State<Arc<AppState>>,
    Path((scope, member)): Path<(String, String)>,
) -> Result<Json<UserStatus>> {
    let scope = parse_scope(&scope)?;
    Ok(Json(state.manager.user_status(&scope, &member).await?))
}

async fn reset_member(
    State(state): State<Arc<AppState>>,
    Path((scope, member)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<ResetResponse>> {
    let scope = parse_scope(&scope)?;
    let removed_submissions = state
        .manager
        .reset_member(&scope, &member, state.is_admin(&headers))
        .await?;

    Ok(Json(ResetResponse {
        ok: true,
        removed_submissions,
    }))
}

async fn season_status(
    State(state): State<Arc<AppState>>,
    Path(scope): Path<String>,
) -> Result<Json<SeasonStatus>> {
    let scope = parse_scope(&scope)?;
    Ok(Json(state.manager.season_status(&scope).await?))
}

async fn start_new_season(
    State(state): State<Arc<AppState>>,
    Path(scope): Path<String>,
    headers: HeaderMap,
) -> Result<Json<NewSeasonResponse>> {
    let scope = parse_scope(&scope)?;
    let season = state
        .manager
        .start_new_season(&scope, state.is_admin(&headers))
        .await?;

    Ok(Json(NewSeasonResponse {
        ok: true,
        message: format!("Season {} started", season.season_number),
        season,
    }))
}

async fn list_seasons(
    State(state): State<Arc<AppState>>,
    Path(scope): Path<String>,
) -> Result<Json<Vec<Season>>> {
    let scope = parse_scope(&scope)?;
    Ok(Json(state.manager.list_seasons(&scope).await?))
}

async fn pick_winners(
    State(state): State<Arc<AppState>>,
    Path(scope): Path<String>,
) -> Result<Json<PickResponse>> {
    let scope = parse_scope(&scope)?;
    let result = state.manager.pick_winners(&scope).await?;

    Ok(Json(PickResponse {
        ok: true,
        message: result.message(),
        result,
    }))
}

async fn list_history(
    State(state): State<Arc<AppState>>,
    Path(scope): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryEntry>>> {
    let scope = parse_scope(&scope)?;
    Ok(Json(state.manager.list_history(&scope, query.season).await?))
}

async fn mark_watched(
    State(state): State<Arc<AppState>>,
    Path((scope, member)): Path<(String, String)>,
    Json(req): Json<MarkWatchedRequest>,
) -> Result<Json<WatchedEntry>> {
    let scope = parse_scope(&scope)?;
    Ok(Json(
        state
            .manager
            .mark_watched(&scope, &member, &req.movie_title)
            .await?,
    ))
}

async fn list_watched(
    State(state): State<Arc<AppState>>,
    Path((scope, member)): Path<(String, String)>,
) -> Result<Json<Vec<WatchedEntry>>> {
    let scope = parse_scope(&scope)?;
    Ok(Json(state.manager.list_watched(&scope, &member).await?))
}

async fn add_review(
    State(state): State<Arc<AppState>>,
    Path(scope): Path<String>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<ReviewResponse>> {
    let scope = parse_scope(&scope)?;
    let review = state
        .manager
        .add_review(
            &scope,
            NewReview {
                user_id: req.user_id,
                movie_title: req.movie_title,
                rating: req.rating,
                review: req.review,
            },
        )
        .await?;

    Ok(Json(ReviewResponse { ok: true, review }))
}

async fn list_reviews(
    State(state): State<Arc<AppState>>,
    Path(scope): Path<String>,
    Query(query): Query<ReviewsQuery>,
) -> Result<Json<Vec<Review>>> {
    let scope = parse_scope(&scope)?;
    Ok(Json(
        state
            .manager
            .list_reviews(&scope, query.title.as_deref())
            .await?,
    ))
}

async fn weekly_reviews(
    State(state): State<Arc<AppState>>,
    Path(scope): Path<String>,
) -> Result<Json<Vec<Review>>> {
    let scope = parse_scope(&scope)?;
    Ok(Json(state.manager.weekly_reviews(&scope).await?))
}

async fn get_settings(
    State(state): State<Arc<AppState>>,
    Path(scope): Path<String>,
) -> Result<Json<ScopeSettings>> {
    let scope = parse_scope(&scope)?;
    Ok(Json(state.manager.settings(&scope).await?))
}

async fn update_settings(
    State(state): State<Arc<AppState>>,
    Path(scope): Path<String>,
    headers: HeaderMap,
    Json(settings): Json<ScopeSettings>,
) -> Result<Json<ScopeSettings>> {
    let scope = parse_scope(&scope)?;
    let settings = state
        .manager
        .update_settings(&scope, settings, state.is_admin(&headers))
        .await?;
    Ok(Json(settings))
}

async fn submission_summary(
    State(state): State<Arc<AppState>>,
    Path(scope): Path<String>,
    headers: HeaderMap,
) -> Result<Json<SubmissionSummary>> {
    let scope = parse_scope(&scope)?;
    Ok(Json(
        state
            .manager
            .submission_summary(&scope, state.is_admin(&headers))
            .await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_segment_parsing() {
        assert_eq!(parse_scope("global").unwrap(), Scope::global());
        assert_eq!(parse_scope("GLOBAL").unwrap(), Scope::global());
        assert_eq!(parse_scope("club-42").unwrap(), Scope::club("club-42"));
        assert!(parse_scope("bad scope").is_err());
        assert!(parse_scope(&"x".repeat(65)).is_err());
    }
}
