//! Account repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;
use uuid::Uuid;

use super::AccountStore;
use crate::models::{Account, NewAccount, UpdateAccount};

const ACCOUNT_COLUMNS: &str = "id, email, first_name, last_name, password_hash, is_verified, \
     is_admin, otp_code, otp_expires_at, reset_token, created_at, updated_at";

/// PostgreSQL-backed account repository
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    /// Create a new account repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &PgRow) -> Account {
        Account {
            id: row.get("id"),
            email: row.get("email"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            password_hash: row.get("password_hash"),
            is_verified: row.get("is_verified"),
            is_admin: row.get("is_admin"),
            otp_code: row.get("otp_code"),
            otp_expires_at: row.get("otp_expires_at"),
            reset_token: row.get("reset_token"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn create(&self, new_account: &NewAccount) -> DatabaseResult<Account> {
        info!("Creating new account: {}", new_account.email);

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO accounts (id, email, first_name, last_name, password_hash, is_verified)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new_account.email)
        .bind(&new_account.first_name)
        .bind(&new_account.last_name)
        .bind(&new_account.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        Ok(Self::map_row(&row))
    }

    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        Ok(row.as_ref().map(Self::map_row))
    }

    async fn update(&self, id: Uuid, update: &UpdateAccount) -> DatabaseResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                password_hash = COALESCE($4, password_hash),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.password_hash)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_otp(&self, id: Uuid, code: &str, expires_at: DateTime<Utc>) -> DatabaseResult<()> {
        sqlx::query(
            "UPDATE accounts SET otp_code = $2, otp_expires_at = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(code)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        Ok(())
    }

    async fn clear_otp(&self, id: Uuid, code: &str) -> DatabaseResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET otp_code = NULL, otp_expires_at = NULL, updated_at = NOW()
            WHERE id = $1 AND otp_code = $2
            "#,
        )
        .bind(id)
        .bind(code)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_reset_token(&self, id: Uuid, token: &str) -> DatabaseResult<()> {
        sqlx::query("UPDATE accounts SET reset_token = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;

        Ok(())
    }

    async fn consume_reset_token(&self, token: &str, password_hash: &str) -> DatabaseResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET password_hash = $2, reset_token = NULL, updated_at = NOW()
            WHERE reset_token = $1
            "#,
        )
        .bind(token)
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        Ok(result.rows_affected() > 0)
    }
}
