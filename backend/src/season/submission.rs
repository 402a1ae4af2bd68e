//! Submission Validator
//!
//! Checks run in a fixed order so that the caller always gets the most
//! specific rejection: category, season, duplicate in season, duplicate
//! across seasons, category already filled, all categories filled.

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};

use super::{
    context::SeasonContext,
    error::{SeasonError, SeasonResult},
    tracker::SeasonTracker,
};
use crate::{
    audit,
    db::models::{ArchiveRecord, Scope, Submission},
};

/// A proposed submission as received from a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSubmission {
    pub submitter_id: String,
    pub category: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserStatus {
    pub season_number: i64,
    pub filled_categories: Vec<String>,
    pub all_filled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberSummary {
    pub submitter_id: String,
    pub submission_count: usize,
    pub by_category: BTreeMap<String, Vec<Submission>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionSummary {
    pub season_number: i64,
    pub total_submissions: usize,
    pub members: Vec<MemberSummary>,
}

/// Lowercases, trims and collapses internal whitespace.
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) struct SubmissionService {
    ctx: Arc<SeasonContext>,
    tracker: SeasonTracker,
}

impl SubmissionService {
    pub(crate) fn new(ctx: Arc<SeasonContext>, tracker: SeasonTracker) -> Self {
        Self { ctx, tracker }
    }

    /// Validate and accept a submission. Nothing is written unless every
    /// check passes.
    pub(crate) async fn submit(&self, scope: &Scope, new: NewSubmission) -> SeasonResult<Submission> {
        let NewSubmission {
            submitter_id,
            category,
            title,
            description,
        } = new;

        let title = title.trim().to_string();
        let description = description.trim().to_string();
        let submitter_id = submitter_id.trim().to_string();
        if title.is_empty() {
            return Err(SeasonError::MissingField { field: "title" });
        }
        if description.is_empty() {
            return Err(SeasonError::MissingField {
                field: "description",
            });
        }
        if submitter_id.is_empty() {
            return Err(SeasonError::MissingField {
                field: "submitter_id",
            });
        }

        // 1. Category must be configured for the scope
        let categories = self.ctx.categories(scope).await?;
        if !categories.iter().any(|c| c == &category) {
            return Err(SeasonError::InvalidCategory {
                category,
                allowed: categories,
            });
        }

        // 2. Resolve the season accepting submissions
        let season = self.tracker.active_season(scope).await?;

        // 3. Normalize
        let title_key = normalize_title(&title);

        // 4. Duplicate within this season
        let existing = self
            .ctx
            .store
            .list_submissions(scope, season.season_number)
            .await?;
        if existing.iter().any(|s| s.title_key == title_key) {
            return Err(SeasonError::DuplicateInSeason { title });
        }

        // 5. Title used in an earlier season
        if let Some(record) = self.ctx.store.find_archive_record(scope, &title_key).await? {
            if record.season_number < season.season_number {
                return Err(SeasonError::DuplicateAcrossSeasons {
                    title,
                    season_number: record.season_number,
                });
            }
        }

        // 6-7. Per-member category limits
        let mut filled = self
            .ctx
            .store
            .get_user_tracker(scope, season.season_number, &submitter_id)
            .await?;
        if filled.iter().any(|c| c == &category) {
            return Err(SeasonError::CategoryAlreadyFilled { category });
        }
        if filled.len() >= categories.len() {
            return Err(SeasonError::AllCategoriesFilled);
        }

        // 8. Accept
        filled.push(category.clone());
        let submission = Submission::new(
            scope.clone(),
            season.season_number,
            title,
            title_key,
            description,
            category,
            submitter_id,
            self.ctx.now(),
        );
        let archive = ArchiveRecord::for_submission(&submission);
        self.ctx
            .store
            .record_submission(&submission, &filled, &archive)
            .await?;

        audit::log_submission(
            scope,
            submission.season_number,
            &submission.submitter_id,
            &submission.category,
            &submission.title,
        );

        Ok(submission)
    }

    /// Where the member's next submission would land. When the season has
    /// ended and auto-rollover is on, that is the empty season after it.
    pub(crate) async fn user_status(&self, scope: &Scope, submitter_id: &str) -> SeasonResult<UserStatus> {
        let season = self.tracker.current_season(scope).await?;
        if season.has_ended(self.ctx.now()) && self.ctx.policy.auto_rollover {
            return Ok(UserStatus {
                season_number: season.season_number + 1,
                filled_categories: Vec::new(),
                all_filled: false,
            });
        }

        let categories = self.ctx.categories(scope).await?;
        let filled_categories = self
            .ctx
            .store
            .get_user_tracker(scope, season.season_number, submitter_id)
            .await?;

        Ok(UserStatus {
            season_number: season.season_number,
            all_filled: filled_categories.len() >= categories.len(),
            filled_categories,
        })
    }

    /// Clears a member's categories and submissions for the current season.
    pub(crate) async fn reset_member(&self, scope: &Scope, submitter_id: &str) -> SeasonResult<u64> {
        let season = self.tracker.get_or_create_season(scope).await?;
        let removed = self
            .ctx
            .store
            .delete_member_submissions(scope, season.season_number, submitter_id)
            .await?;
        self.ctx
            .store
            .set_user_tracker(scope, season.season_number, submitter_id, &[])
            .await?;

        audit::log_admin_action(
            scope,
            "reset_member",
            &format!(
                "member {} reset for season {} ({} submissions removed)",
                submitter_id, season.season_number, removed
            ),
        );
        Ok(removed)
    }

    pub(crate) async fn current_submissions(&self, scope: &Scope) -> SeasonResult<Vec<Submission>> {
        match self.ctx.store.get_season(scope).await? {
            Some(season) => Ok(self
                .ctx
                .store
                .list_submissions(scope, season.season_number)
                .await?),
            None => Ok(Vec::new()),
        }
    }

    pub(crate) async fn summary(&self, scope: &Scope) -> SeasonResult<SubmissionSummary> {
        let season = self.tracker.get_or_create_season(scope).await?;
        let submissions = self
            .ctx
            .store
            .list_submissions(scope, season.season_number)
            .await?;

        Ok(SubmissionSummary {
            season_number: season.season_number,
            total_submissions: submissions.len(),
            members: summarize_by_member(submissions),
        })
    }
}

/// Groups submissions per submitter, busiest first, ties by submitter id.
fn summarize_by_member(submissions: Vec<Submission>) -> Vec<MemberSummary> {
    let mut by_member: BTreeMap<String, BTreeMap<String, Vec<Submission>>> = BTreeMap::new();
    for submission in submissions {
        by_member
            .entry(submission.submitter_id.clone())
            .or_default()
            .entry(submission.category.clone())
            .or_default()
            .push(submission);
    }

    let mut members: Vec<MemberSummary> = by_member
        .into_iter()
        .map(|(submitter_id, by_category)| MemberSummary {
            submitter_id,
            submission_count: by_category.values().map(Vec::len).sum(),
            by_category,
        })
        .collect();

    members.sort_by(|a, b| {
        b.submission_count
            .cmp(&a.submission_count)
            .then_with(|| a.submitter_id.cmp(&b.submitter_id))
    });
    members
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn normalize_title_folds_case_and_whitespace() {
        assert_eq!(normalize_title("  Arrival "), "arrival");
        assert_eq!(normalize_title("The   Grand\tBudapest\nHotel"), "the grand budapest hotel");
        assert_eq!(normalize_title("ARRIVAL"), normalize_title("arrival"));
        assert_eq!(normalize_title("   "), "");
    }

    fn submission(submitter: &str, category: &str, title: &str) -> Submission {
        Submission::new(
            Scope::global(),
            1,
            title.to_string(),
            normalize_title(title),
            "d".to_string(),
            category.to_string(),
            submitter.to_string(),
            Utc::now(),
        )
    }

    #[test]
    fn summary_orders_by_count_then_id() {
        let members = summarize_by_member(vec![
            submission("carol", "top-pick", "A"),
            submission("bob", "top-pick", "B"),
            submission("bob", "wild-card", "C"),
            submission("alice", "wild-card", "D"),
        ]);

        let order: Vec<&str> = members.iter().map(|m| m.submitter_id.as_str()).collect();
        assert_eq!(order, vec!["bob", "alice", "carol"]);
        assert_eq!(members[0].submission_count, 2);
        assert_eq!(members[0].by_category.len(), 2);
    }
}
