//! Structured audit logging for season activity.
//!
//! Accepted submissions, picks, reviews, season transitions and admin
//! actions are logged under the `audit` target with structured fields.

use crate::db::models::Scope;

/// Log an accepted submission
pub fn log_submission(scope: &Scope, season_number: i64, submitter_id: &str, category: &str, title: &str) {
    tracing::info!(
        target: "audit",
        event = "submission",
        scope = %scope.key(),
        season_number = season_number,
        submitter_id = submitter_id,
        category = category,
        title = title,
        "Submission: \"{}\" ({}) by {} in {} season {}",
        title,
        category,
        submitter_id,
        scope,
        season_number
    );
}

/// Log a winner pick
pub fn log_pick(scope: &Scope, season_number: i64, winners: &[&str], skipped: &[String]) {
    tracing::info!(
        target: "audit",
        event = "pick",
        scope = %scope.key(),
        season_number = season_number,
        winners = %winners.join(", "),
        skipped = %skipped.join(", "),
        "Pick in {} season {}: {}",
        scope,
        season_number,
        winners.join(", ")
    );
}

/// Log a season transition (started, ended)
pub fn log_season_event(scope: &Scope, season_number: i64, event: &str, details: &str) {
    tracing::info!(
        target: "audit",
        event = "season",
        scope = %scope.key(),
        season_number = season_number,
        season_event = event,
        details = details,
        "Season {} for {}: {} - {}",
        season_number,
        scope,
        event,
        details
    );
}

/// Log a posted review
pub fn log_review(scope: &Scope, user_id: &str, title: &str, rating: Option<u8>) {
    tracing::info!(
        target: "audit",
        event = "review",
        scope = %scope.key(),
        user_id = user_id,
        title = title,
        rating = rating,
        "Review: \"{}\" by {} in {}",
        title,
        user_id,
        scope
    );
}

/// Log an admin action that changed state
pub fn log_admin_action(scope: &Scope, action: &str, details: &str) {
    tracing::info!(
        target: "audit",
        event = "admin",
        scope = %scope.key(),
        action = action,
        details = details,
        "Admin: {} for {} - {}",
        action,
        scope,
        details
    );
}

/// Log a refused admin action
pub fn log_security_event(scope: &Scope, action: &str, details: &str) {
    tracing::warn!(
        target: "audit",
        event = "security",
        scope = %scope.key(),
        action = action,
        details = details,
        "Security: unauthorized {} for {} - {}",
        action,
        scope,
        details
    );
}
