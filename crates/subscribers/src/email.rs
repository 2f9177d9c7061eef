//! Email port and recording fake.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::SubscriberError;

/// An outbound email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Trait for sending email.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Delivers one email.
    async fn send(&self, email: Email) -> Result<(), SubscriberError>;
}

#[derive(Debug, Default)]
struct RecordingMailerState {
    sent: Vec<Email>,
    fail: bool,
}

/// In-memory mailer that records what was sent.
#[derive(Debug, Clone, Default)]
pub struct RecordingMailer {
    state: Arc<RwLock<RecordingMailerState>>,
}

impl RecordingMailer {
    /// Creates an empty mailer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every send fail.
    pub fn set_fail(&self, fail: bool) {
        self.state.write().unwrap().fail = fail;
    }

    /// Everything sent so far, in order.
    pub fn sent(&self) -> Vec<Email> {
        self.state.read().unwrap().sent.clone()
    }

    /// Number of emails sent.
    pub fn sent_count(&self) -> usize {
        self.state.read().unwrap().sent.len()
    }
}

#[async_trait]
impl EmailSender for RecordingMailer {
    async fn send(&self, email: Email) -> Result<(), SubscriberError> {
        let mut state = self.state.write().unwrap();
        if state.fail {
            return Err(SubscriberError::Email("smtp connection refused".to_string()));
        }
        tracing::debug!(to = %email.to, subject = %email.subject, "email sent");
        state.sent.push(email);
        Ok(())
    }
}
