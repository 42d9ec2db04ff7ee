//! JWT service for session token generation and validation
//!
//! A session token is issued once the one-time login code is verified. It
//! carries the account id, email and admin flag, signed with HS256.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;
use uuid::Uuid;

use crate::error::{PortalError, PortalResult};
use crate::models::Account;

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared secret for signing and verifying tokens
    pub secret: String,
    /// Session token lifetime in seconds (default: 1 hour)
    pub token_expiry: u64,
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account ID
    pub sub: Uuid,
    pub email: String,
    /// Whether the account may take administrative decisions
    pub admin: bool,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("token_expiry", &self.config.token_expiry)
            .finish_non_exhaustive()
    }
}

impl JwtService {
    /// Initialize a new JWT service
    pub fn new(config: JwtConfig) -> PortalResult<Self> {
        if config.secret.len() < 16 {
            return Err(PortalError::Internal(
                "JWT secret must be at least 16 bytes".to_string(),
            ));
        }

        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        Ok(JwtService {
            encoding_key,
            decoding_key,
            validation,
            config,
        })
    }

    /// Generate a session token for a verified account
    pub fn generate_session_token(&self, account: &Account) -> PortalResult<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| PortalError::Internal(format!("Failed to get current time: {}", e)))?
            .as_secs();

        let claims = Claims {
            sub: account.id,
            email: account.email.clone(),
            admin: account.is_admin,
            iat: now,
            exp: now + self.config.token_expiry,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| PortalError::Internal(format!("Failed to sign session token: {}", e)))
    }

    /// Validate a token and return the claims
    pub fn validate_token(&self, token: &str) -> PortalResult<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("Rejected session token: {}", e);
                PortalError::Auth("Invalid or expired session".to_string())
            })
    }

    /// Get the session token expiry time
    pub fn token_expiry(&self) -> u64 {
        self.config.token_expiry
    }
}
