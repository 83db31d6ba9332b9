//! Outbound e-mail hook. Rendering is the mail provider's job; the service only
//! names a template and supplies its key/value context.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ids::UserId;

/// Templates known to the mail provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmailTemplate {
    Welcome,
    VerifyEmail,
    EnrollmentConfirm,
    PaymentReceived,
    CertificateIssued,
}

impl EmailTemplate {
    pub const fn name(self) -> &'static str {
        match self {
            EmailTemplate::Welcome => "welcome",
            EmailTemplate::VerifyEmail => "verify-email",
            EmailTemplate::EnrollmentConfirm => "enrollment-confirm",
            EmailTemplate::PaymentReceived => "payment-received",
            EmailTemplate::CertificateIssued => "certificate-issued",
        }
    }
}

/// A single templated message addressed to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub template: EmailTemplate,
    pub recipient: UserId,
    pub context: BTreeMap<String, String>,
}

impl Notification {
    pub fn new(template: EmailTemplate, recipient: UserId) -> Self {
        Self {
            template,
            recipient,
            context: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.context.insert(key.to_string(), value.to_string());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("mail transport unavailable: {0}")]
    Transport(String),
}

/// Trait describing the outbound mail collaborator.
pub trait NotificationDispatcher: Send + Sync {
    fn dispatch(&self, notification: Notification) -> Result<(), DispatchError>;
}

/// Sends the notification and logs a failure instead of propagating it.
///
/// Returns whether the message was handed to the transport. Callers have
/// already committed their state change by the time mail goes out.
pub fn dispatch_logged<N>(dispatcher: &N, notification: Notification) -> bool
where
    N: NotificationDispatcher + ?Sized,
{
    let template = notification.template.name();
    let recipient = notification.recipient;
    match dispatcher.dispatch(notification) {
        Ok(()) => true,
        Err(err) => {
            warn!(template, %recipient, error = %err, "notification dispatch failed");
            false
        }
    }
}

/// Dispatcher that writes each message to the tracing pipeline.
#[derive(Debug, Clone)]
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

impl NotificationDispatcher for LogMailer {
    fn dispatch(&self, notification: Notification) -> Result<(), DispatchError> {
        info!(
            from = %self.from,
            template = notification.template.name(),
            recipient = %notification.recipient,
            context = ?notification.context,
            "email dispatched"
        );
        Ok(())
    }
}

/// Collects messages in memory so demos and tests can inspect them.
#[derive(Debug, Default, Clone)]
pub struct MemoryOutbox {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl MemoryOutbox {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn templates(&self) -> Vec<EmailTemplate> {
        self.sent().into_iter().map(|n| n.template).collect()
    }
}

impl NotificationDispatcher for MemoryOutbox {
    fn dispatch(&self, notification: Notification) -> Result<(), DispatchError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OfflineMailer;

    impl NotificationDispatcher for OfflineMailer {
        fn dispatch(&self, _notification: Notification) -> Result<(), DispatchError> {
            Err(DispatchError::Transport("smtp relay down".to_string()))
        }
    }

    #[test]
    fn template_names_match_provider_catalog() {
        assert_eq!(EmailTemplate::VerifyEmail.name(), "verify-email");
        let json = serde_json::to_string(&EmailTemplate::CertificateIssued).expect("serializes");
        assert_eq!(json, "\"certificate-issued\"");
    }

    #[test]
    fn dispatch_logged_reports_transport_failures() {
        let note = Notification::new(EmailTemplate::Welcome, UserId(3)).with("name", "Ada");
        assert!(!dispatch_logged(&OfflineMailer, note.clone()));

        let outbox = MemoryOutbox::default();
        assert!(dispatch_logged(&outbox, note));
        assert_eq!(outbox.templates(), vec![EmailTemplate::Welcome]);
        assert_eq!(outbox.sent()[0].context["name"], "Ada");
    }
}
