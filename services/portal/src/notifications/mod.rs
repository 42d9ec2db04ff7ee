//! Outbound email
//!
//! Request handlers never wait on email delivery. They hand an [`Email`] to
//! the [`Notifier`], which delivers it on a background task and retries
//! transient failures with exponential backoff.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::PortalResult;

mod smtp;
pub mod templates;

pub use smtp::{LogEmailSender, SmtpEmailSender};

/// A rendered HTML email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
}

impl Email {
    pub fn new(to: &str, subject: &str, html: String) -> Self {
        Self {
            to: to.to_string(),
            subject: subject.to_string(),
            html,
        }
    }
}

/// Transport that delivers a single email
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &Email) -> PortalResult<()>;
}

/// Delivery retry settings
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each attempt after that
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Handle to the background delivery queue
#[derive(Debug, Clone)]
pub struct Notifier {
    queue: mpsc::UnboundedSender<Email>,
}

impl Notifier {
    /// Start the delivery task and return a handle to it
    pub fn spawn(sender: Arc<dyn EmailSender>, policy: RetryPolicy) -> (Self, JoinHandle<()>) {
        let (queue, mut receiver) = mpsc::unbounded_channel::<Email>();

        let worker = tokio::spawn(async move {
            while let Some(email) = receiver.recv().await {
                let sender = Arc::clone(&sender);
                let policy = policy.clone();
                tokio::spawn(async move {
                    deliver(sender.as_ref(), &email, &policy).await;
                });
            }
            debug!("Notification queue closed");
        });

        (Self { queue }, worker)
    }

    /// Queue an email for delivery without waiting for it
    pub fn dispatch(&self, email: Email) {
        if let Err(e) = self.queue.send(email) {
            error!(
                "Notification queue is closed, dropping \"{}\" to {}",
                e.0.subject, e.0.to
            );
        }
    }
}

/// Try to deliver `email`, returning whether any attempt succeeded
pub async fn deliver(sender: &dyn EmailSender, email: &Email, policy: &RetryPolicy) -> bool {
    let mut delay = policy.base_delay;

    for attempt in 1..=policy.max_attempts {
        match sender.send(email).await {
            Ok(()) => return true,
            Err(e) => {
                warn!(
                    "Attempt {}/{} to email {} failed: {}",
                    attempt, policy.max_attempts, email.to, e
                );
                if attempt < policy.max_attempts {
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }

    error!(
        "Giving up on \"{}\" to {} after {} attempts",
        email.subject, email.to, policy.max_attempts
    );
    false
}

/// Sender that keeps every email in memory
#[derive(Debug, Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<Email>>,
}

impl RecordingEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Email> {
        self.sent.lock().await.clone()
    }

    /// Poll until at least `count` emails were sent or `timeout` elapses
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<Email> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let sent = self.sent().await;
            if sent.len() >= count || tokio::time::Instant::now() >= deadline {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, email: &Email) -> PortalResult<()> {
        self.sent.lock().await.push(email.clone());
        Ok(())
    }
}
