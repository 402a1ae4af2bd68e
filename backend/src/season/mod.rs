pub mod clock;
pub mod context;
pub mod error;
pub mod manager;
pub mod reviews;
pub mod rollover;
pub mod selector;
pub mod submission;
pub mod tracker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{ScopeLocks, SeasonPolicy};
pub use error::{RolloverError, SeasonError, SeasonResult};
pub use manager::SeasonManager;
pub use reviews::NewReview;
pub use selector::PickResult;
pub use submission::{normalize_title, MemberSummary, NewSubmission, SubmissionSummary, UserStatus};
pub use tracker::SeasonStatus;
