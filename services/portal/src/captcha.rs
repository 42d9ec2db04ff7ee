//! reCAPTCHA verification for the login form

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error};

use crate::error::{PortalError, PortalResult};

/// Checks a client-supplied captcha response
#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    /// `Ok(false)` means the provider rejected the response
    async fn verify(&self, response: &str) -> PortalResult<bool>;
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

/// Google reCAPTCHA `siteverify` client
#[derive(Debug, Clone)]
pub struct RecaptchaVerifier {
    client: reqwest::Client,
    secret: String,
    verify_url: String,
}

impl RecaptchaVerifier {
    pub fn new(secret: String, verify_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret,
            verify_url,
        }
    }
}

#[async_trait]
impl CaptchaVerifier for RecaptchaVerifier {
    async fn verify(&self, response: &str) -> PortalResult<bool> {
        let result: SiteVerifyResponse = self
            .client
            .post(&self.verify_url)
            .form(&[("secret", self.secret.as_str()), ("response", response)])
            .send()
            .await
            .map_err(|e| {
                error!("Captcha verification request failed: {}", e);
                PortalError::Internal(format!("Captcha verification failed: {}", e))
            })?
            .json()
            .await
            .map_err(|e| {
                PortalError::Internal(format!("Invalid captcha verification response: {}", e))
            })?;

        if !result.success {
            debug!("Captcha rejected: {:?}", result.error_codes);
        }

        Ok(result.success)
    }
}

/// Verifier that answers the same way for every response
#[derive(Debug, Clone, Copy)]
pub struct StaticCaptchaVerifier(pub bool);

#[async_trait]
impl CaptchaVerifier for StaticCaptchaVerifier {
    async fn verify(&self, _response: &str) -> PortalResult<bool> {
        Ok(self.0)
    }
}
