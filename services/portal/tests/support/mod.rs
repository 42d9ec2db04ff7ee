//! Shared wiring for the integration tests

#![allow(dead_code)]

use axum::Router;
use std::sync::Arc;
use std::time::Duration;

use portal::{
    AppState,
    captcha::StaticCaptchaVerifier,
    jwt::{JwtConfig, JwtService},
    notifications::{Email, Notifier, RecordingEmailSender, RetryPolicy},
    rate_limiter::RateLimiter,
    repositories::{
        AccountStore,
        memory::{MemoryAccountStore, MemoryAdvisingStore},
    },
    routes,
    services::{AdvisingService, AuthService, AuthSettings, Registration},
};

pub const PASSWORD: &str = "secret1";

pub struct Harness {
    pub accounts: Arc<MemoryAccountStore>,
    pub advising_store: Arc<MemoryAdvisingStore>,
    pub mail: Arc<RecordingEmailSender>,
    pub auth: AuthService,
    pub advising: AdvisingService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(AuthSettings::default(), true)
    }

    /// Wire services over fresh in-memory stores
    pub fn with(settings: AuthSettings, captcha_passes: bool) -> Self {
        let accounts = Arc::new(MemoryAccountStore::new());
        let advising_store = Arc::new(MemoryAdvisingStore::new(accounts.clone()));
        let mail = Arc::new(RecordingEmailSender::new());

        let (notifier, _worker) = Notifier::spawn(
            mail.clone(),
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
            },
        );

        let jwt = JwtService::new(JwtConfig {
            secret: "integration-test-secret".to_string(),
            token_expiry: 3600,
        })
        .expect("valid jwt config");

        let auth = AuthService::new(
            accounts.clone(),
            Arc::new(StaticCaptchaVerifier(captcha_passes)),
            notifier.clone(),
            jwt,
            RateLimiter::default(),
            settings,
        );
        let advising = AdvisingService::new(accounts.clone(), advising_store.clone(), notifier);

        Self {
            accounts,
            advising_store,
            mail,
            auth,
            advising,
        }
    }

    pub fn router(&self) -> Router {
        let state = AppState {
            auth: self.auth.clone(),
            advising: self.advising.clone(),
            db_pool: None,
        };
        routes::create_router(state, &["http://localhost:5173".to_string()])
    }

    pub async fn register(&self, email: &str) {
        self.auth
            .register(Registration {
                first_name: "A".to_string(),
                last_name: "B".to_string(),
                email: email.to_string(),
                password: PASSWORD.to_string(),
            })
            .await
            .expect("registration succeeds");
    }

    /// The code currently stored for `email`
    pub async fn pending_otp(&self, email: &str) -> Option<String> {
        self.accounts
            .find_by_email(email)
            .await
            .expect("store lookup")
            .and_then(|account| account.otp_code)
    }

    pub async fn reset_token(&self, email: &str) -> Option<String> {
        self.accounts
            .find_by_email(email)
            .await
            .expect("store lookup")
            .and_then(|account| account.reset_token)
    }

    /// Register, log in and verify; returns the session token
    pub async fn sign_in(&self, email: &str) -> String {
        self.register(email).await;
        self.auth
            .login(email, PASSWORD, Some("ok"), None)
            .await
            .expect("login succeeds");
        let code = self.pending_otp(email).await.expect("otp issued");
        self.auth
            .verify_otp(email, &code)
            .await
            .expect("otp verifies")
            .token
    }

    pub async fn emails_to(&self, to: &str, count: usize) -> Vec<Email> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let matching: Vec<Email> = self
                .mail
                .sent()
                .await
                .into_iter()
                .filter(|e| e.to == to)
                .collect();
            if matching.len() >= count || tokio::time::Instant::now() >= deadline {
                return matching;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
