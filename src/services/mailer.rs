//! Mail sender
//!
//! Outbound email is a collaborator behind the `MailSender` trait. Senders
//! never return errors: delivery failure is reported as `false` so callers can
//! downgrade it to a status instead of failing the request.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// File attached to an outbound email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// A fully rendered email ready to hand to a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub attachments: Vec<Attachment>,
}

impl OutboundEmail {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            html: html.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

#[async_trait]
pub trait MailSender: Send + Sync {
    /// Deliver a message, returning whether the transport accepted it
    async fn send(&self, email: &OutboundEmail) -> bool;
}

/// Sender used when no transport is configured; messages are logged only
#[derive(Debug, Clone)]
pub struct LogMailSender {
    from: String,
}

impl LogMailSender {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl MailSender for LogMailSender {
    async fn send(&self, email: &OutboundEmail) -> bool {
        info!(
            from = %self.from,
            to = %email.to,
            subject = %email.subject,
            attachments = email.attachments.len(),
            html_bytes = email.html.len(),
            "Email logged (no mail transport configured)"
        );
        true
    }
}

/// Send with an upper bound on latency; a timeout counts as a failed delivery
pub async fn send_with_timeout(
    sender: &Arc<dyn MailSender>,
    email: &OutboundEmail,
    timeout: Duration,
) -> bool {
    match tokio::time::timeout(timeout, sender.send(email)).await {
        Ok(delivered) => {
            if !delivered {
                warn!("Mail transport rejected message to {}", email.to);
            }
            delivered
        }
        Err(_) => {
            warn!(
                "Mail delivery to {} timed out after {:?}",
                email.to, timeout
            );
            false
        }
    }
}

/// In-memory sender that records every message, for tests
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingMailSender {
    pub outbox: tokio::sync::Mutex<Vec<OutboundEmail>>,
    pub fail: bool,
    pub delay: Option<Duration>,
}

#[cfg(test)]
impl RecordingMailSender {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub async fn sent(&self) -> Vec<OutboundEmail> {
        self.outbox.lock().await.clone()
    }
}

#[cfg(test)]
#[async_trait]
impl MailSender for RecordingMailSender {
    async fn send(&self, email: &OutboundEmail) -> bool {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outbox.lock().await.push(email.clone());
        !self.fail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_sender_always_succeeds() {
        let sender = LogMailSender::new("noreply@example.com");
        let email = OutboundEmail::new("a@example.com", "Subject", "<p>hi</p>");
        assert!(sender.send(&email).await);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let sender: Arc<dyn MailSender> =
            Arc::new(RecordingMailSender::slow(Duration::from_millis(200)));
        let email = OutboundEmail::new("a@example.com", "Subject", "<p>hi</p>");

        let delivered = send_with_timeout(&sender, &email, Duration::from_millis(20)).await;
        assert!(!delivered);
    }

    #[tokio::test]
    async fn test_rejected_send_is_reported() {
        let sender: Arc<dyn MailSender> = Arc::new(RecordingMailSender::failing());
        let email = OutboundEmail::new("a@example.com", "Subject", "<p>hi</p>")
            .with_attachment(Attachment {
                filename: "r.pdf".into(),
                content_type: "application/pdf".into(),
                content: vec![1, 2, 3],
            });

        assert!(!send_with_timeout(&sender, &email, Duration::from_secs(1)).await);
    }
}
