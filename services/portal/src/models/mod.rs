//! Portal domain models

pub mod account;
pub mod advising;

// Re-export for convenience
pub use account::{Account, NewAccount, PendingOtp, UpdateAccount};
pub use advising::{
    AdvisingRecord, AdvisingStatus, CourseStatus, DecisionTarget, FormSave, HistoryEntry,
    PlannedCourse, SaveOutcome, TakenCourse, normalize_course_name,
};
