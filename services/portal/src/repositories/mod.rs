//! Store access for accounts and advising records
//!
//! Services depend on the [`AccountStore`] and [`AdvisingStore`] traits only.
//! The PostgreSQL implementations back the running server; the in-memory ones
//! in [`memory`] back the tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::DatabaseResult;
use uuid::Uuid;

use crate::models::{
    Account, AdvisingRecord, AdvisingStatus, CourseStatus, DecisionTarget, FormSave, HistoryEntry,
    NewAccount, PlannedCourse, SaveOutcome, TakenCourse, UpdateAccount,
};

pub mod account;
pub mod advising;
pub mod memory;

pub use account::PgAccountStore;
pub use advising::PgAdvisingStore;

/// Persistence of user accounts and their credential state
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new account; a duplicate email yields `DatabaseError::UniqueViolation`
    async fn create(&self, new_account: &NewAccount) -> DatabaseResult<Account>;

    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<Account>>;

    /// Apply the provided fields; returns false if the account does not exist
    async fn update(&self, id: Uuid, update: &UpdateAccount) -> DatabaseResult<bool>;

    /// Store a one-time code, replacing any pending one
    async fn set_otp(&self, id: Uuid, code: &str, expires_at: DateTime<Utc>) -> DatabaseResult<()>;

    /// Clear the pending code if it still equals `code`; returns whether it did
    async fn clear_otp(&self, id: Uuid, code: &str) -> DatabaseResult<bool>;

    async fn set_reset_token(&self, id: Uuid, token: &str) -> DatabaseResult<()>;

    /// Replace the password of the account holding `token` and clear the token
    ///
    /// Returns false when no account holds the token.
    async fn consume_reset_token(&self, token: &str, password_hash: &str) -> DatabaseResult<bool>;
}

/// Persistence of advising records and course ledgers
#[async_trait]
pub trait AdvisingStore: Send + Sync {
    /// Names of `Completed` course rows plus the taken-course ledger
    async fn completed_course_names(&self, account_id: Uuid) -> DatabaseResult<Vec<String>>;

    async fn course_names_with_status(
        &self,
        account_id: Uuid,
        status: CourseStatus,
    ) -> DatabaseResult<Vec<String>>;

    /// All records of the account, newest first
    async fn list_records(&self, account_id: Uuid) -> DatabaseResult<Vec<AdvisingRecord>>;

    async fn find_record(&self, record_id: i64) -> DatabaseResult<Option<AdvisingRecord>>;

    async fn courses_for_record(&self, record_id: i64) -> DatabaseResult<Vec<PlannedCourse>>;

    /// Records of the account with their course names, newest first
    async fn history(&self, account_id: Uuid) -> DatabaseResult<Vec<HistoryEntry>>;

    /// Insert or update a record and replace its `Planned` courses atomically
    async fn save_form(&self, save: &FormSave) -> DatabaseResult<SaveOutcome>;

    /// Set a record's status and advisor message
    ///
    /// Returns the owner's notification details, or `None` if the record or
    /// its owner does not exist.
    async fn decide(
        &self,
        record_id: i64,
        status: AdvisingStatus,
        message: Option<&str>,
    ) -> DatabaseResult<Option<DecisionTarget>>;

    async fn taken_courses_for_term(
        &self,
        account_id: Uuid,
        term: &str,
    ) -> DatabaseResult<Vec<TakenCourse>>;

    /// Copy the courses of approved records into the taken-course ledger
    ///
    /// Returns the number of ledger rows inserted.
    async fn sync_approved(&self) -> DatabaseResult<u64>;
}
