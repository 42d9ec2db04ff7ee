//! Course advising portal
//!
//! Students register, sign in with a password plus an emailed one-time code,
//! and submit per-term course plans. Advisors approve or reject plans, which
//! locks them and emails the student.
//!
//! Storage sits behind the [`repositories::AccountStore`] and
//! [`repositories::AdvisingStore`] traits, so the same router runs against
//! PostgreSQL in production and the in-memory stores in tests.

use sqlx::PgPool;

pub mod captcha;
pub mod config;
pub mod crypto;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod notifications;
pub mod rate_limiter;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod validation;

use crate::services::{AdvisingService, AuthService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub advising: AdvisingService,
    /// Absent when running on the in-memory stores
    pub db_pool: Option<PgPool>,
}
