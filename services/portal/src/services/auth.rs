//! Account lifecycle: registration, two-step login, password management

use chrono::{Duration, Utc};
use common::error::DatabaseError;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::captcha::CaptchaVerifier;
use crate::crypto;
use crate::error::{PortalError, PortalResult};
use crate::jwt::JwtService;
use crate::models::{Account, NewAccount, UpdateAccount};
use crate::notifications::{Notifier, templates};
use crate::rate_limiter::RateLimiter;
use crate::repositories::AccountStore;
use crate::validation::{
    DEFAULT_MIN_PASSWORD_LENGTH, validate_email, validate_password, validate_required,
};

/// Tunables for the auth flows
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Lifetime of a one-time login code
    pub otp_ttl: Duration,
    pub min_password_length: usize,
    /// Front-end page receiving the reset token as `?token=`
    pub reset_link_base: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            otp_ttl: Duration::minutes(10),
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
            reset_link_base: "http://localhost:5173/reset.html".to_string(),
        }
    }
}

/// Registration payload
#[derive(Debug, Clone)]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

/// Fields a user may change on their own profile
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
}

/// Result of a successful one-time code check
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub expires_in: u64,
    pub account: Account,
}

#[derive(Clone)]
pub struct AuthService {
    accounts: Arc<dyn AccountStore>,
    captcha: Arc<dyn CaptchaVerifier>,
    notifier: Notifier,
    jwt: JwtService,
    limiter: RateLimiter,
    settings: AuthSettings,
}

impl AuthService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        captcha: Arc<dyn CaptchaVerifier>,
        notifier: Notifier,
        jwt: JwtService,
        limiter: RateLimiter,
        settings: AuthSettings,
    ) -> Self {
        Self {
            accounts,
            captcha,
            notifier,
            jwt,
            limiter,
            settings,
        }
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    /// Create a verified account and send a welcome email
    pub async fn register(&self, registration: Registration) -> PortalResult<Account> {
        let email = registration.email.trim();
        validate_required("First name", &registration.first_name)
            .and_then(|_| validate_required("Last name", &registration.last_name))
            .and_then(|_| validate_email(email))
            .and_then(|_| validate_password(&registration.password, self.settings.min_password_length))
            .map_err(PortalError::Validation)?;

        if self.accounts.find_by_email(email).await?.is_some() {
            return Err(PortalError::Conflict("Email already registered.".to_string()));
        }

        let new_account = NewAccount {
            first_name: registration.first_name.trim().to_string(),
            last_name: registration.last_name.trim().to_string(),
            email: email.to_string(),
            password_hash: crypto::hash_password(&registration.password)?,
        };

        // A concurrent registration can still win the race to the unique index
        let account = self.accounts.create(&new_account).await.map_err(|e| match e {
            DatabaseError::UniqueViolation(_) => {
                PortalError::Conflict("Email already registered.".to_string())
            }
            other => PortalError::Database(other),
        })?;

        info!("Registered account {}", account.id);
        self.notifier
            .dispatch(templates::welcome_email(&account.email, &account.first_name));

        Ok(account)
    }

    /// Check credentials and email a one-time login code
    ///
    /// Unknown emails and wrong passwords fail with the same error and cost
    /// the same hashing work. Attempts are throttled per email and client
    /// address, so one client cannot lock an account out for everyone.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        captcha_response: Option<&str>,
        client: Option<IpAddr>,
    ) -> PortalResult<()> {
        let email = email.trim();
        let captcha_response = captcha_response
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| PortalError::Validation("Captcha required.".to_string()))?;

        if email.is_empty() || password.is_empty() {
            return Err(PortalError::Validation(
                "Email and password are required.".to_string(),
            ));
        }

        let limiter_key = match client {
            Some(addr) => format!("login:{}:{}", email, addr),
            None => format!("login:{}:unknown", email),
        };
        if !self.limiter.is_allowed(&limiter_key).await {
            return Err(PortalError::TooManyRequests);
        }

        if !self.captcha.verify(captcha_response).await? {
            return Err(PortalError::Auth("Captcha failed.".to_string()));
        }

        let verified = match self.accounts.find_by_email(email).await? {
            Some(account) if crypto::verify_password(password, &account.password_hash)? => {
                Some(account)
            }
            Some(_) => None,
            None => {
                crypto::verify_missing_account(password);
                None
            }
        };
        let Some(account) = verified else {
            return Err(PortalError::Auth("Invalid credentials.".to_string()));
        };
        self.limiter.reset(&limiter_key).await;

        let code = crypto::generate_otp();
        let expires_at = Utc::now() + self.settings.otp_ttl;
        self.accounts.set_otp(account.id, &code, expires_at).await?;

        self.notifier.dispatch(templates::otp_email(
            &account.email,
            &code,
            self.settings.otp_ttl.num_minutes(),
        ));

        Ok(())
    }

    /// Consume the pending one-time code and open a session
    pub async fn verify_otp(&self, email: &str, code: &str) -> PortalResult<Session> {
        let email = email.trim();
        let code = code.trim();
        if email.is_empty() || code.is_empty() {
            return Err(PortalError::Validation(
                "Email and OTP are required.".to_string(),
            ));
        }

        let limiter_key = format!("otp:{}", email);
        if !self.limiter.is_allowed(&limiter_key).await {
            return Err(PortalError::TooManyRequests);
        }

        let no_pending = || PortalError::NotFound("No OTP found. Login again.".to_string());

        let account = self
            .accounts
            .find_by_email(email)
            .await?
            .ok_or_else(no_pending)?;
        let pending = account.pending_otp().ok_or_else(no_pending)?;

        if pending.code != code {
            return Err(PortalError::Auth("Invalid OTP.".to_string()));
        }

        if pending.is_expired(Utc::now()) {
            self.accounts.clear_otp(account.id, &pending.code).await?;
            return Err(PortalError::Expired("OTP expired.".to_string()));
        }

        // Compare-and-clear so two concurrent submissions cannot both succeed
        if !self.accounts.clear_otp(account.id, code).await? {
            return Err(no_pending());
        }
        self.limiter.reset(&limiter_key).await;

        let token = self.jwt.generate_session_token(&account)?;
        info!("Account {} completed login", account.id);

        Ok(Session {
            token,
            expires_in: self.jwt.token_expiry(),
            account,
        })
    }

    /// Email a reset link if the account exists; silent otherwise
    pub async fn request_password_reset(&self, email: &str) -> PortalResult<()> {
        let email = email.trim();
        if email.is_empty() {
            return Err(PortalError::Validation("Email is required.".to_string()));
        }

        let Some(account) = self.accounts.find_by_email(email).await? else {
            return Ok(());
        };

        let token = crypto::generate_reset_token();
        self.accounts.set_reset_token(account.id, &token).await?;
        self.notifier.dispatch(templates::reset_email(
            &account.email,
            &self.settings.reset_link_base,
            &token,
        ));

        Ok(())
    }

    /// Replace the password of the account holding `token`; the token is single-use
    pub async fn reset_password(&self, token: &str, new_password: &str) -> PortalResult<()> {
        let token = token.trim();
        if token.is_empty() {
            return Err(PortalError::InvalidToken("Invalid or expired token.".to_string()));
        }
        validate_password(new_password, self.settings.min_password_length)
            .map_err(PortalError::Validation)?;

        let password_hash = crypto::hash_password(new_password)?;
        if !self
            .accounts
            .consume_reset_token(token, &password_hash)
            .await?
        {
            return Err(PortalError::InvalidToken("Invalid or expired token.".to_string()));
        }

        info!("Password reset completed");
        Ok(())
    }

    pub async fn change_password(
        &self,
        email: &str,
        current_password: &str,
        new_password: &str,
    ) -> PortalResult<()> {
        let account = self.require_account(email).await?;

        if !crypto::verify_password(current_password, &account.password_hash)? {
            return Err(PortalError::Auth("Current password is incorrect.".to_string()));
        }
        validate_password(new_password, self.settings.min_password_length)
            .map_err(PortalError::Validation)?;

        let update = UpdateAccount {
            password_hash: Some(crypto::hash_password(new_password)?),
            ..UpdateAccount::default()
        };
        if !self.accounts.update(account.id, &update).await? {
            return Err(PortalError::NotFound("User not found.".to_string()));
        }

        info!("Account {} changed its password", account.id);
        Ok(())
    }

    pub async fn get_profile(&self, email: &str) -> PortalResult<Account> {
        self.require_account(email).await
    }

    /// Apply name and password changes; absent fields are left alone
    pub async fn update_profile(&self, email: &str, changes: ProfileChanges) -> PortalResult<()> {
        let account = self.require_account(email).await?;

        let first_name = trimmed(changes.first_name);
        let last_name = trimmed(changes.last_name);
        if let Some(first_name) = &first_name {
            validate_required("First name", first_name).map_err(PortalError::Validation)?;
        }
        if let Some(last_name) = &last_name {
            validate_required("Last name", last_name).map_err(PortalError::Validation)?;
        }

        let password_hash = match changes.password.filter(|p| !p.is_empty()) {
            Some(password) => {
                validate_password(&password, self.settings.min_password_length)
                    .map_err(PortalError::Validation)?;
                Some(crypto::hash_password(&password)?)
            }
            None => None,
        };

        let update = UpdateAccount {
            first_name,
            last_name,
            password_hash,
        };
        if update.is_empty() {
            return Err(PortalError::Validation("Nothing to update.".to_string()));
        }

        if !self.accounts.update(account.id, &update).await? {
            return Err(PortalError::NotFound("User not found.".to_string()));
        }

        Ok(())
    }

    /// Whether `email` belongs to an administrator; unknown emails are not
    pub async fn is_admin(&self, email: &str) -> PortalResult<bool> {
        let email = email.trim();
        if email.is_empty() {
            return Ok(false);
        }

        Ok(self
            .accounts
            .find_by_email(email)
            .await?
            .is_some_and(|account| account.is_admin))
    }

    async fn require_account(&self, email: &str) -> PortalResult<Account> {
        let email = email.trim();
        if email.is_empty() {
            return Err(PortalError::Validation("Email is required.".to_string()));
        }

        self.accounts.find_by_email(email).await?.ok_or_else(|| {
            warn!("No account for requested email");
            PortalError::NotFound("User not found.".to_string())
        })
    }
}

/// Blank form fields count as "not provided"
fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
