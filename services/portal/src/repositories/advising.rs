//! Advising repository for database operations

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use tracing::{info, warn};
use uuid::Uuid;

use super::AdvisingStore;
use crate::models::{
    AdvisingRecord, AdvisingStatus, CourseStatus, DecisionTarget, FormSave, HistoryEntry,
    PlannedCourse, SaveOutcome, TakenCourse,
};

const RECORD_COLUMNS: &str = "id, account_id, current_term, last_term, last_gpa, status, \
     advisor_message, created_at, updated_at";

/// PostgreSQL-backed advising repository
#[derive(Clone)]
pub struct PgAdvisingStore {
    pool: PgPool,
}

impl PgAdvisingStore {
    /// Create a new advising repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_record(row: &PgRow) -> DatabaseResult<AdvisingRecord> {
        let status: String = row.get("status");
        Ok(AdvisingRecord {
            id: row.get("id"),
            account_id: row.get("account_id"),
            current_term: row.get("current_term"),
            last_term: row.get("last_term"),
            last_gpa: row.get("last_gpa"),
            status: status.parse().map_err(DatabaseError::Configuration)?,
            advisor_message: row.get("advisor_message"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    fn map_course(row: &PgRow) -> DatabaseResult<PlannedCourse> {
        let status: String = row.get("status");
        Ok(PlannedCourse {
            id: row.get("id"),
            record_id: row.get("record_id"),
            account_id: row.get("account_id"),
            course_name: row.get("course_name"),
            course_level: row.get("course_level"),
            status: status.parse().map_err(DatabaseError::Configuration)?,
            term: row.get("term"),
        })
    }

    /// Every statement of one save, run inside the caller's transaction
    async fn write_form(
        tx: &mut Transaction<'_, Postgres>,
        save: &FormSave,
    ) -> DatabaseResult<SaveOutcome> {
        let record_id = match save.record_id {
            Some(record_id) => {
                let row = sqlx::query(
                    "SELECT account_id, status FROM advising_records WHERE id = $1 FOR UPDATE",
                )
                .bind(record_id)
                .fetch_optional(&mut **tx)
                .await
                .map_err(DatabaseError::from_query)?;

                let Some(row) = row else {
                    return Ok(SaveOutcome::Missing);
                };

                let owner: Uuid = row.get("account_id");
                if owner != save.account_id {
                    return Ok(SaveOutcome::Missing);
                }

                let status: String = row.get("status");
                let status: AdvisingStatus =
                    status.parse().map_err(DatabaseError::Configuration)?;
                if !status.is_editable() {
                    return Ok(SaveOutcome::Locked(status));
                }

                sqlx::query(
                    r#"
                    UPDATE advising_records
                    SET current_term = $2, last_term = $3, last_gpa = $4, updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(record_id)
                .bind(&save.current_term)
                .bind(&save.last_term)
                .bind(&save.last_gpa)
                .execute(&mut **tx)
                .await
                .map_err(DatabaseError::from_query)?;

                record_id
            }
            None => sqlx::query_scalar::<_, i64>(
                r#"
                INSERT INTO advising_records (account_id, current_term, last_term, last_gpa, status)
                VALUES ($1, $2, $3, $4, 'Pending')
                RETURNING id
                "#,
            )
            .bind(save.account_id)
            .bind(&save.current_term)
            .bind(&save.last_term)
            .bind(&save.last_gpa)
            .fetch_one(&mut **tx)
            .await
            .map_err(DatabaseError::from_query)?,
        };

        sqlx::query("DELETE FROM planned_courses WHERE record_id = $1 AND status = 'Planned'")
            .bind(record_id)
            .execute(&mut **tx)
            .await
            .map_err(DatabaseError::from_query)?;

        for course in &save.courses {
            sqlx::query(
                r#"
                INSERT INTO planned_courses (record_id, account_id, course_name, status, term)
                VALUES ($1, $2, $3, 'Planned', $4)
                "#,
            )
            .bind(record_id)
            .bind(save.account_id)
            .bind(course)
            .bind(&save.current_term)
            .execute(&mut **tx)
            .await
            .map_err(DatabaseError::from_query)?;
        }

        Ok(SaveOutcome::Saved(record_id))
    }
}

#[async_trait]
impl AdvisingStore for PgAdvisingStore {
    async fn completed_course_names(&self, account_id: Uuid) -> DatabaseResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT course_name FROM planned_courses
            WHERE account_id = $1 AND status = 'Completed'
            UNION
            SELECT course_name FROM taken_courses
            WHERE account_id = $1
            ORDER BY course_name
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_query)
    }

    async fn course_names_with_status(
        &self,
        account_id: Uuid,
        status: CourseStatus,
    ) -> DatabaseResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT course_name FROM planned_courses
            WHERE account_id = $1 AND status = $2
            ORDER BY course_name
            "#,
        )
        .bind(account_id)
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_query)
    }

    async fn list_records(&self, account_id: Uuid) -> DatabaseResult<Vec<AdvisingRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {RECORD_COLUMNS} FROM advising_records
            WHERE account_id = $1
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        rows.iter().map(Self::map_record).collect()
    }

    async fn find_record(&self, record_id: i64) -> DatabaseResult<Option<AdvisingRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM advising_records WHERE id = $1"
        ))
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        row.as_ref().map(Self::map_record).transpose()
    }

    async fn courses_for_record(&self, record_id: i64) -> DatabaseResult<Vec<PlannedCourse>> {
        let rows = sqlx::query(
            r#"
            SELECT id, record_id, account_id, course_name, course_level, status, term
            FROM planned_courses
            WHERE record_id = $1
            ORDER BY id
            "#,
        )
        .bind(record_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        rows.iter().map(Self::map_course).collect()
    }

    async fn history(&self, account_id: Uuid) -> DatabaseResult<Vec<HistoryEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.account_id, r.current_term, r.last_term, r.last_gpa, r.status,
                   r.advisor_message, r.created_at, r.updated_at,
                   COALESCE(
                       ARRAY_AGG(pc.course_name ORDER BY pc.course_name)
                           FILTER (WHERE pc.course_name IS NOT NULL),
                       '{}'
                   ) AS courses
            FROM advising_records r
            LEFT JOIN planned_courses pc ON pc.record_id = r.id
            WHERE r.account_id = $1
            GROUP BY r.id
            ORDER BY r.created_at DESC, r.id DESC
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        rows.iter()
            .map(|row| {
                Ok(HistoryEntry {
                    record: Self::map_record(row)?,
                    courses: row.get("courses"),
                })
            })
            .collect()
    }

    async fn save_form(&self, save: &FormSave) -> DatabaseResult<SaveOutcome> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::Connection)?;

        match Self::write_form(&mut tx, save).await {
            Ok(SaveOutcome::Saved(record_id)) => {
                tx.commit().await.map_err(DatabaseError::from_query)?;
                info!(
                    "Saved advising record {} with {} planned courses",
                    record_id,
                    save.courses.len()
                );
                Ok(SaveOutcome::Saved(record_id))
            }
            Ok(outcome) => {
                tx.rollback().await.map_err(DatabaseError::from_query)?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("Rollback of advising save failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    async fn decide(
        &self,
        record_id: i64,
        status: AdvisingStatus,
        message: Option<&str>,
    ) -> DatabaseResult<Option<DecisionTarget>> {
        let row = sqlx::query(
            r#"
            WITH updated AS (
                UPDATE advising_records
                SET status = $2, advisor_message = $3, updated_at = NOW()
                WHERE id = $1
                RETURNING account_id, current_term
            )
            SELECT a.email, a.first_name, u.current_term
            FROM updated u
            JOIN accounts a ON a.id = u.account_id
            "#,
        )
        .bind(record_id)
        .bind(status.as_str())
        .bind(message)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        Ok(row.map(|row| DecisionTarget {
            email: row.get("email"),
            first_name: row.get("first_name"),
            current_term: row.get("current_term"),
        }))
    }

    async fn taken_courses_for_term(
        &self,
        account_id: Uuid,
        term: &str,
    ) -> DatabaseResult<Vec<TakenCourse>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, course_name, term, grade
            FROM taken_courses
            WHERE account_id = $1 AND term = $2
            ORDER BY course_name
            "#,
        )
        .bind(account_id)
        .bind(term)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        Ok(rows
            .into_iter()
            .map(|row| TakenCourse {
                id: row.get("id"),
                account_id: row.get("account_id"),
                course_name: row.get("course_name"),
                term: row.get("term"),
                grade: row.get("grade"),
            })
            .collect())
    }

    async fn sync_approved(&self) -> DatabaseResult<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO taken_courses (account_id, course_name, term)
            SELECT DISTINCT r.account_id, pc.course_name, r.current_term
            FROM advising_records r
            JOIN planned_courses pc ON pc.record_id = r.id
            WHERE r.status = 'Approved' AND pc.status = 'Planned'
            ON CONFLICT (account_id, term, course_name) DO NOTHING
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        Ok(result.rows_affected())
    }
}
