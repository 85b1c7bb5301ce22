//! Mailer that records signup emails instead of sending them.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::member::Member;
use crate::ports::SignupMailer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentSignupEmail {
    pub email: String,
    pub request_src: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<RwLock<Vec<SentSignupEmail>>>,
    failing: Arc<RwLock<bool>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent sends fail, to exercise best-effort callers.
    pub async fn fail_sending(&self, failing: bool) {
        *self.failing.write().await = failing;
    }

    pub async fn sent(&self) -> Vec<SentSignupEmail> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl SignupMailer for RecordingMailer {
    async fn send_signup_email(
        &self,
        member: &Member,
        request_src: Option<&str>,
    ) -> Result<(), DomainError> {
        if *self.failing.read().await {
            return Err(DomainError::new(ErrorCode::InternalError, "mail transport unavailable"));
        }
        self.sent.write().await.push(SentSignupEmail {
            email: member.email.clone(),
            request_src: request_src.map(str::to_string),
        });
        Ok(())
    }
}
