//! In-memory stores
//!
//! Behave like the PostgreSQL repositories for a single process. Used by the
//! test suites and handy for running the router without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::{DatabaseError, DatabaseResult};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{AccountStore, AdvisingStore};
use crate::models::{
    Account, AdvisingRecord, AdvisingStatus, CourseStatus, DecisionTarget, FormSave, HistoryEntry,
    NewAccount, PlannedCourse, SaveOutcome, TakenCourse, UpdateAccount,
};

/// Account store keeping every row in a map
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    accounts: Mutex<HashMap<Uuid, Account>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn find_by_id(&self, id: Uuid) -> Option<Account> {
        self.accounts.lock().await.get(&id).cloned()
    }

    /// Grant or revoke the admin flag; returns false for an unknown email
    pub async fn set_admin(&self, email: &str, is_admin: bool) -> bool {
        let mut accounts = self.accounts.lock().await;
        match accounts.values_mut().find(|a| a.email == email) {
            Some(account) => {
                account.is_admin = is_admin;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn create(&self, new_account: &NewAccount) -> DatabaseResult<Account> {
        let mut accounts = self.accounts.lock().await;
        if accounts.values().any(|a| a.email == new_account.email) {
            return Err(DatabaseError::UniqueViolation(
                "accounts_email_key".to_string(),
            ));
        }

        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            email: new_account.email.clone(),
            first_name: new_account.first_name.clone(),
            last_name: new_account.last_name.clone(),
            password_hash: new_account.password_hash.clone(),
            is_verified: true,
            is_admin: false,
            otp_code: None,
            otp_expires_at: None,
            reset_token: None,
            created_at: now,
            updated_at: now,
        };
        accounts.insert(account.id, account.clone());

        Ok(account)
    }

    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<Account>> {
        let accounts = self.accounts.lock().await;
        Ok(accounts.values().find(|a| a.email == email).cloned())
    }

    async fn update(&self, id: Uuid, update: &UpdateAccount) -> DatabaseResult<bool> {
        let mut accounts = self.accounts.lock().await;
        let Some(account) = accounts.get_mut(&id) else {
            return Ok(false);
        };

        if let Some(first_name) = &update.first_name {
            account.first_name = first_name.clone();
        }
        if let Some(last_name) = &update.last_name {
            account.last_name = last_name.clone();
        }
        if let Some(password_hash) = &update.password_hash {
            account.password_hash = password_hash.clone();
        }
        account.updated_at = Utc::now();

        Ok(true)
    }

    async fn set_otp(&self, id: Uuid, code: &str, expires_at: DateTime<Utc>) -> DatabaseResult<()> {
        if let Some(account) = self.accounts.lock().await.get_mut(&id) {
            account.otp_code = Some(code.to_string());
            account.otp_expires_at = Some(expires_at);
        }
        Ok(())
    }

    async fn clear_otp(&self, id: Uuid, code: &str) -> DatabaseResult<bool> {
        let mut accounts = self.accounts.lock().await;
        match accounts.get_mut(&id) {
            Some(account) if account.otp_code.as_deref() == Some(code) => {
                account.otp_code = None;
                account.otp_expires_at = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_reset_token(&self, id: Uuid, token: &str) -> DatabaseResult<()> {
        if let Some(account) = self.accounts.lock().await.get_mut(&id) {
            account.reset_token = Some(token.to_string());
        }
        Ok(())
    }

    async fn consume_reset_token(&self, token: &str, password_hash: &str) -> DatabaseResult<bool> {
        let mut accounts = self.accounts.lock().await;
        match accounts
            .values_mut()
            .find(|a| a.reset_token.as_deref() == Some(token))
        {
            Some(account) => {
                account.password_hash = password_hash.to_string();
                account.reset_token = None;
                account.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Debug, Default)]
struct AdvisingState {
    records: BTreeMap<i64, AdvisingRecord>,
    courses: Vec<PlannedCourse>,
    taken: Vec<TakenCourse>,
    next_record_id: i64,
    next_row_id: i64,
}

impl AdvisingState {
    fn next_record_id(&mut self) -> i64 {
        self.next_record_id += 1;
        self.next_record_id
    }

    fn next_row_id(&mut self) -> i64 {
        self.next_row_id += 1;
        self.next_row_id
    }

    fn records_newest_first(&self, account_id: Uuid) -> Vec<AdvisingRecord> {
        let mut records: Vec<AdvisingRecord> = self
            .records
            .values()
            .filter(|r| r.account_id == account_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        records
    }
}

/// Advising store keeping every row in memory
///
/// Shares the account store so decisions can resolve the owner's email.
#[derive(Debug)]
pub struct MemoryAdvisingStore {
    accounts: Arc<MemoryAccountStore>,
    state: Mutex<AdvisingState>,
}

impl MemoryAdvisingStore {
    pub fn new(accounts: Arc<MemoryAccountStore>) -> Self {
        Self {
            accounts,
            state: Mutex::new(AdvisingState::default()),
        }
    }

    /// Attach a course row with an arbitrary status to an existing record
    pub async fn add_course(
        &self,
        record_id: i64,
        course_name: &str,
        status: CourseStatus,
    ) -> Option<i64> {
        let mut state = self.state.lock().await;
        let record = state.records.get(&record_id)?.clone();
        let id = state.next_row_id();
        state.courses.push(PlannedCourse {
            id,
            record_id,
            account_id: record.account_id,
            course_name: course_name.to_string(),
            course_level: None,
            status,
            term: record.current_term,
        });
        Some(id)
    }

    /// Append a row to the taken-course ledger
    pub async fn add_taken_course(
        &self,
        account_id: Uuid,
        course_name: &str,
        term: &str,
        grade: Option<&str>,
    ) -> i64 {
        let mut state = self.state.lock().await;
        let id = state.next_row_id();
        state.taken.push(TakenCourse {
            id,
            account_id,
            course_name: course_name.to_string(),
            term: term.to_string(),
            grade: grade.map(str::to_string),
        });
        id
    }
}

#[async_trait]
impl AdvisingStore for MemoryAdvisingStore {
    async fn completed_course_names(&self, account_id: Uuid) -> DatabaseResult<Vec<String>> {
        let state = self.state.lock().await;
        let names: BTreeSet<String> = state
            .courses
            .iter()
            .filter(|c| c.account_id == account_id && c.status == CourseStatus::Completed)
            .map(|c| c.course_name.clone())
            .chain(
                state
                    .taken
                    .iter()
                    .filter(|t| t.account_id == account_id)
                    .map(|t| t.course_name.clone()),
            )
            .collect();

        Ok(names.into_iter().collect())
    }

    async fn course_names_with_status(
        &self,
        account_id: Uuid,
        status: CourseStatus,
    ) -> DatabaseResult<Vec<String>> {
        let state = self.state.lock().await;
        let names: BTreeSet<String> = state
            .courses
            .iter()
            .filter(|c| c.account_id == account_id && c.status == status)
            .map(|c| c.course_name.clone())
            .collect();

        Ok(names.into_iter().collect())
    }

    async fn list_records(&self, account_id: Uuid) -> DatabaseResult<Vec<AdvisingRecord>> {
        Ok(self.state.lock().await.records_newest_first(account_id))
    }

    async fn find_record(&self, record_id: i64) -> DatabaseResult<Option<AdvisingRecord>> {
        Ok(self.state.lock().await.records.get(&record_id).cloned())
    }

    async fn courses_for_record(&self, record_id: i64) -> DatabaseResult<Vec<PlannedCourse>> {
        let state = self.state.lock().await;
        Ok(state
            .courses
            .iter()
            .filter(|c| c.record_id == record_id)
            .cloned()
            .collect())
    }

    async fn history(&self, account_id: Uuid) -> DatabaseResult<Vec<HistoryEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .records_newest_first(account_id)
            .into_iter()
            .map(|record| {
                let mut courses: Vec<String> = state
                    .courses
                    .iter()
                    .filter(|c| c.record_id == record.id)
                    .map(|c| c.course_name.clone())
                    .collect();
                courses.sort();
                HistoryEntry { record, courses }
            })
            .collect())
    }

    async fn save_form(&self, save: &FormSave) -> DatabaseResult<SaveOutcome> {
        // One lock for the whole save keeps it atomic, like the SQL transaction.
        let mut state = self.state.lock().await;
        let now = Utc::now();

        let record_id = match save.record_id {
            Some(record_id) => {
                let Some(record) = state.records.get_mut(&record_id) else {
                    return Ok(SaveOutcome::Missing);
                };
                if record.account_id != save.account_id {
                    return Ok(SaveOutcome::Missing);
                }
                if !record.status.is_editable() {
                    return Ok(SaveOutcome::Locked(record.status));
                }

                record.current_term = save.current_term.clone();
                record.last_term = save.last_term.clone();
                record.last_gpa = save.last_gpa.clone();
                record.updated_at = now;
                record_id
            }
            None => {
                let record_id = state.next_record_id();
                state.records.insert(
                    record_id,
                    AdvisingRecord {
                        id: record_id,
                        account_id: save.account_id,
                        current_term: save.current_term.clone(),
                        last_term: save.last_term.clone(),
                        last_gpa: save.last_gpa.clone(),
                        status: AdvisingStatus::Pending,
                        advisor_message: None,
                        created_at: now,
                        updated_at: now,
                    },
                );
                record_id
            }
        };

        state
            .courses
            .retain(|c| !(c.record_id == record_id && c.status == CourseStatus::Planned));

        for course in &save.courses {
            let id = state.next_row_id();
            state.courses.push(PlannedCourse {
                id,
                record_id,
                account_id: save.account_id,
                course_name: course.clone(),
                course_level: None,
                status: CourseStatus::Planned,
                term: save.current_term.clone(),
            });
        }

        Ok(SaveOutcome::Saved(record_id))
    }

    async fn decide(
        &self,
        record_id: i64,
        status: AdvisingStatus,
        message: Option<&str>,
    ) -> DatabaseResult<Option<DecisionTarget>> {
        let (account_id, current_term) = {
            let mut state = self.state.lock().await;
            let Some(record) = state.records.get_mut(&record_id) else {
                return Ok(None);
            };
            record.status = status;
            record.advisor_message = message.map(str::to_string);
            record.updated_at = Utc::now();
            (record.account_id, record.current_term.clone())
        };

        Ok(self
            .accounts
            .find_by_id(account_id)
            .await
            .map(|account| DecisionTarget {
                email: account.email,
                first_name: account.first_name,
                current_term,
            }))
    }

    async fn taken_courses_for_term(
        &self,
        account_id: Uuid,
        term: &str,
    ) -> DatabaseResult<Vec<TakenCourse>> {
        let state = self.state.lock().await;
        let mut rows: Vec<TakenCourse> = state
            .taken
            .iter()
            .filter(|t| t.account_id == account_id && t.term == term)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.course_name.cmp(&b.course_name));
        Ok(rows)
    }

    async fn sync_approved(&self) -> DatabaseResult<u64> {
        let mut state = self.state.lock().await;

        let candidates: Vec<(Uuid, String, String)> = state
            .courses
            .iter()
            .filter(|c| c.status == CourseStatus::Planned)
            .filter_map(|c| {
                let record = state.records.get(&c.record_id)?;
                (record.status == AdvisingStatus::Approved).then(|| {
                    (
                        record.account_id,
                        c.course_name.clone(),
                        record.current_term.clone(),
                    )
                })
            })
            .collect();

        let mut inserted = 0;
        for (account_id, course_name, term) in candidates {
            let exists = state.taken.iter().any(|t| {
                t.account_id == account_id && t.course_name == course_name && t.term == term
            });
            if exists {
                continue;
            }

            let id = state.next_row_id();
            state.taken.push(TakenCourse {
                id,
                account_id,
                course_name,
                term,
                grade: None,
            });
            inserted += 1;
        }

        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn stores() -> (Arc<MemoryAccountStore>, MemoryAdvisingStore, Account) {
        let accounts = Arc::new(MemoryAccountStore::new());
        let account = accounts
            .create(&NewAccount {
                first_name: "A".to_string(),
                last_name: "B".to_string(),
                email: "a@x.com".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();
        let advising = MemoryAdvisingStore::new(Arc::clone(&accounts));
        (accounts, advising, account)
    }

    fn save(account_id: Uuid, record_id: Option<i64>, courses: &[&str]) -> FormSave {
        FormSave {
            record_id,
            account_id,
            current_term: "Fall2025".to_string(),
            last_term: None,
            last_gpa: None,
            courses: courses.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_is_unique_violation() {
        let (accounts, _, _) = stores().await;
        let err = accounts
            .create(&NewAccount {
                first_name: "C".to_string(),
                last_name: "D".to_string(),
                email: "a@x.com".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn test_clear_otp_only_matches_current_code() {
        let (accounts, _, account) = stores().await;
        accounts
            .set_otp(account.id, "111111", Utc::now())
            .await
            .unwrap();

        assert!(!accounts.clear_otp(account.id, "222222").await.unwrap());
        assert!(accounts.clear_otp(account.id, "111111").await.unwrap());
        assert!(!accounts.clear_otp(account.id, "111111").await.unwrap());
    }

    #[tokio::test]
    async fn test_save_preserves_non_planned_rows() {
        let (_, advising, account) = stores().await;
        let SaveOutcome::Saved(id) = advising
            .save_form(&save(account.id, None, &["CS101"]))
            .await
            .unwrap()
        else {
            panic!("expected a saved record");
        };
        advising
            .add_course(id, "CS100", CourseStatus::Completed)
            .await
            .unwrap();

        advising
            .save_form(&save(account.id, Some(id), &["CS102"]))
            .await
            .unwrap();

        let mut names: Vec<(String, CourseStatus)> = advising
            .courses_for_record(id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| (c.course_name, c.status))
            .collect();
        names.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            names,
            vec![
                ("CS100".to_string(), CourseStatus::Completed),
                ("CS102".to_string(), CourseStatus::Planned),
            ]
        );
    }

    #[tokio::test]
    async fn test_save_rejects_foreign_record() {
        let (accounts, advising, account) = stores().await;
        let other = accounts
            .create(&NewAccount {
                first_name: "E".to_string(),
                last_name: "F".to_string(),
                email: "e@x.com".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();

        let SaveOutcome::Saved(id) = advising
            .save_form(&save(account.id, None, &["CS101"]))
            .await
            .unwrap()
        else {
            panic!("expected a saved record");
        };

        let outcome = advising
            .save_form(&save(other.id, Some(id), &["CS999"]))
            .await
            .unwrap();
        assert_eq!(outcome, SaveOutcome::Missing);
    }

    #[tokio::test]
    async fn test_sync_approved_is_idempotent() {
        let (_, advising, account) = stores().await;
        let SaveOutcome::Saved(id) = advising
            .save_form(&save(account.id, None, &["CS101", "CS102"]))
            .await
            .unwrap()
        else {
            panic!("expected a saved record");
        };

        assert_eq!(advising.sync_approved().await.unwrap(), 0);

        advising
            .decide(id, AdvisingStatus::Approved, None)
            .await
            .unwrap();
        assert_eq!(advising.sync_approved().await.unwrap(), 2);
        assert_eq!(advising.sync_approved().await.unwrap(), 0);

        let taken = advising
            .taken_courses_for_term(account.id, "Fall2025")
            .await
            .unwrap();
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[0].course_name, "CS101");
    }
}
