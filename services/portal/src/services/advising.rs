//! Course plans: submission, review and history

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{PortalError, PortalResult};
use crate::models::{
    Account, AdvisingRecord, AdvisingStatus, CourseStatus, FormSave, HistoryEntry, PlannedCourse,
    SaveOutcome, TakenCourse, normalize_course_name,
};
use crate::notifications::{Notifier, templates};
use crate::repositories::{AccountStore, AdvisingStore};
use crate::validation::validate_required;

/// A student's plan submission
#[derive(Debug, Clone, Default)]
pub struct PlanSubmission {
    /// Existing record to update; a new record is created when absent
    pub form_id: Option<i64>,
    pub email: String,
    pub current_term: String,
    pub last_term: Option<String>,
    pub last_gpa: Option<String>,
    pub selected_courses: Vec<String>,
}

/// One record with its full course list
#[derive(Debug, Clone)]
pub struct FormDetail {
    pub record: AdvisingRecord,
    pub courses: Vec<PlannedCourse>,
}

#[derive(Clone)]
pub struct AdvisingService {
    accounts: Arc<dyn AccountStore>,
    advising: Arc<dyn AdvisingStore>,
    notifier: Notifier,
}

impl AdvisingService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        advising: Arc<dyn AdvisingStore>,
        notifier: Notifier,
    ) -> Self {
        Self {
            accounts,
            advising,
            notifier,
        }
    }

    /// Courses tagged `Current`; empty for an unknown email
    pub async fn current_courses(&self, email: &str) -> PortalResult<Vec<String>> {
        let Some(account) = self.resolve(email).await? else {
            return Ok(Vec::new());
        };

        let mut names = self
            .advising
            .course_names_with_status(account.id, CourseStatus::Current)
            .await?;
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Courses already completed; empty for an unknown email
    pub async fn taken_courses(&self, email: &str) -> PortalResult<Vec<String>> {
        let Some(account) = self.resolve(email).await? else {
            return Ok(Vec::new());
        };

        let names: BTreeSet<String> = self
            .advising
            .completed_course_names(account.id)
            .await?
            .into_iter()
            .collect();
        Ok(names.into_iter().collect())
    }

    /// Records of the account, newest first
    pub async fn list_forms(&self, email: &str) -> PortalResult<Vec<AdvisingRecord>> {
        match self.resolve(email).await? {
            Some(account) => Ok(self.advising.list_records(account.id).await?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn get_form(&self, form_id: i64) -> PortalResult<FormDetail> {
        let record = self
            .advising
            .find_record(form_id)
            .await?
            .ok_or_else(|| PortalError::NotFound("Advising form not found.".to_string()))?;
        let courses = self.advising.courses_for_record(form_id).await?;

        Ok(FormDetail { record, courses })
    }

    /// Create or update a pending plan and replace its planned courses
    ///
    /// Rejects the whole submission if any selected course was already
    /// completed. Returns the record id.
    pub async fn save_form(&self, submission: PlanSubmission) -> PortalResult<i64> {
        if submission.email.trim().is_empty() {
            return Err(PortalError::Validation("Email is required".to_string()));
        }
        validate_required("Current term", &submission.current_term)
            .map_err(PortalError::Validation)?;

        let account = self
            .resolve(&submission.email)
            .await?
            .ok_or_else(|| PortalError::Validation("User not found.".to_string()))?;

        let completed: HashSet<String> = self
            .advising
            .completed_course_names(account.id)
            .await?
            .iter()
            .map(|name| normalize_course_name(name))
            .collect();

        let mut seen = HashSet::new();
        let mut courses = Vec::with_capacity(submission.selected_courses.len());
        for name in &submission.selected_courses {
            let name = name.trim();
            if name.is_empty() {
                return Err(PortalError::Validation(
                    "Course names cannot be empty.".to_string(),
                ));
            }

            let normalized = normalize_course_name(name);
            if completed.contains(&normalized) {
                return Err(PortalError::Conflict(format!(
                    "{} has already been completed.",
                    name
                )));
            }
            if seen.insert(normalized) {
                courses.push(name.to_string());
            }
        }

        let save = FormSave {
            record_id: submission.form_id,
            account_id: account.id,
            current_term: submission.current_term.trim().to_string(),
            last_term: optional(submission.last_term),
            last_gpa: optional(submission.last_gpa),
            courses,
        };

        match self.advising.save_form(&save).await? {
            SaveOutcome::Saved(id) => Ok(id),
            SaveOutcome::Locked(status) => Err(PortalError::Locked(format!(
                "This advising form is {} and can no longer be edited.",
                status
            ))),
            SaveOutcome::Missing => Err(PortalError::NotFound(
                "Advising form not found.".to_string(),
            )),
        }
    }

    /// Record an advisor decision and notify the student
    pub async fn decide(
        &self,
        record_id: i64,
        status: AdvisingStatus,
        message: Option<&str>,
    ) -> PortalResult<()> {
        if !status.is_terminal() {
            return Err(PortalError::Validation(
                "Decision must be Approved or Rejected.".to_string(),
            ));
        }

        let message = message.map(str::trim).filter(|m| !m.is_empty());
        let target = self
            .advising
            .decide(record_id, status, message)
            .await?
            .ok_or_else(|| PortalError::NotFound("Advising record not found.".to_string()))?;

        info!("Advising record {} marked {}", record_id, status);
        self.notifier.dispatch(templates::status_email(
            &target.email,
            status,
            &target.current_term,
            message,
        ));

        Ok(())
    }

    /// Latest record of the account, if any
    pub async fn summary(&self, email: &str) -> PortalResult<Option<AdvisingRecord>> {
        Ok(self.list_forms(email).await?.into_iter().next())
    }

    pub async fn history(&self, email: &str) -> PortalResult<Vec<HistoryEntry>> {
        match self.resolve(email).await? {
            Some(account) => Ok(self.advising.history(account.id).await?),
            None => Ok(Vec::new()),
        }
    }

    /// Ledger rows for one past term
    pub async fn last_courses(&self, email: &str, term: &str) -> PortalResult<Vec<TakenCourse>> {
        if email.trim().is_empty() || term.trim().is_empty() {
            return Err(PortalError::Validation(
                "Email and term are required.".to_string(),
            ));
        }

        match self.resolve(email).await? {
            Some(account) => Ok(self
                .advising
                .taken_courses_for_term(account.id, term.trim())
                .await?),
            None => Ok(Vec::new()),
        }
    }

    /// Copy approved plans into the taken-course ledger
    pub async fn sync_approved(&self) -> PortalResult<u64> {
        let synced = self.advising.sync_approved().await?;
        info!("Synced {} approved courses into the ledger", synced);
        Ok(synced)
    }

    async fn resolve(&self, email: &str) -> PortalResult<Option<Account>> {
        let email = email.trim();
        if email.is_empty() {
            return Ok(None);
        }

        let account = self.accounts.find_by_email(email).await?;
        if account.is_none() {
            warn!("Advising request for unknown account");
        }
        Ok(account)
    }
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
