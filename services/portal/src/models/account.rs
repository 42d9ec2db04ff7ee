//! Account model and related functionality

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_verified: bool,
    pub is_admin: bool,
    #[serde(skip_serializing)]
    pub otp_code: Option<String>,
    #[serde(skip_serializing)]
    pub otp_expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub reset_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// The one-time code currently awaiting verification, if any
    pub fn pending_otp(&self) -> Option<PendingOtp> {
        match (&self.otp_code, self.otp_expires_at) {
            (Some(code), Some(expires_at)) => Some(PendingOtp {
                code: code.clone(),
                expires_at,
            }),
            _ => None,
        }
    }
}

/// A one-time login code and its expiry
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOtp {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl PendingOtp {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// New account creation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
}

/// Account update payload
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateAccount {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password_hash: Option<String>,
}

impl UpdateAccount {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none() && self.password_hash.is_none()
    }
}
