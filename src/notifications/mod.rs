//! Outbound email notifications.
//!
//! The credential service never talks to an [`EmailSender`] directly: it
//! hands a [`Notification`] to the [`NotificationQueue`] and returns. A
//! [`worker::NotificationWorker`] drains the queue on its own task.

pub mod logging;
pub mod worker;

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;

pub use logging::LoggingEmailSender;
pub use worker::NotificationWorker;

pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Email delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_verification_email(
        &self,
        to_email: &str,
        to_name: &str,
        token: &str,
    ) -> Result<(), EmailError>;

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        to_name: &str,
        token: &str,
    ) -> Result<(), EmailError>;

    async fn send_welcome_email(&self, to_email: &str, to_name: &str) -> Result<(), EmailError>;
}

#[derive(Clone, PartialEq, Eq)]
pub enum Notification {
    Verification {
        to_email: String,
        to_name: String,
        token: String,
    },
    PasswordReset {
        to_email: String,
        to_name: String,
        token: String,
    },
    Welcome {
        to_email: String,
        to_name: String,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Verification { .. } => "verification",
            Notification::PasswordReset { .. } => "password_reset",
            Notification::Welcome { .. } => "welcome",
        }
    }

    pub fn recipient(&self) -> &str {
        match self {
            Notification::Verification { to_email, .. }
            | Notification::PasswordReset { to_email, .. }
            | Notification::Welcome { to_email, .. } => to_email,
        }
    }

    pub(crate) async fn deliver(&self, sender: &dyn EmailSender) -> Result<(), EmailError> {
        match self {
            Notification::Verification {
                to_email,
                to_name,
                token,
            } => sender.send_verification_email(to_email, to_name, token).await,
            Notification::PasswordReset {
                to_email,
                to_name,
                token,
            } => {
                sender
                    .send_password_reset_email(to_email, to_name, token)
                    .await
            }
            Notification::Welcome { to_email, to_name } => {
                sender.send_welcome_email(to_email, to_name).await
            }
        }
    }
}

// Le token brut ne doit jamais finir dans les logs.
impl fmt::Debug for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notification")
            .field("kind", &self.kind())
            .field("to_email", &self.recipient())
            .finish_non_exhaustive()
    }
}

/// Producer side of the bounded notification channel.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    tx: mpsc::Sender<Notification>,
}

impl NotificationQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Never blocks. A full or closed queue drops the notification.
    pub fn enqueue(&self, notification: Notification) {
        let kind = notification.kind();
        match self.tx.try_send(notification) {
            Ok(()) => tracing::debug!(kind, "Notification queued"),
            Err(mpsc::error::TrySendError::Full(n)) => {
                tracing::warn!(kind, to_email = n.recipient(), "Notification queue full, dropping");
            }
            Err(mpsc::error::TrySendError::Closed(n)) => {
                tracing::error!(kind, to_email = n.recipient(), "Notification worker stopped, dropping");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::{EmailError, EmailSender, Notification, async_trait};

    /// Keeps every delivered notification; can be told to fail.
    #[derive(Default)]
    pub struct RecordingEmailSender {
        pub sent: Mutex<Vec<Notification>>,
        pub fail: bool,
    }

    impl RecordingEmailSender {
        pub fn failing() -> Self {
            Self {
                sent: Mutex::default(),
                fail: true,
            }
        }

        pub fn sent(&self) -> Vec<Notification> {
            self.sent.lock().unwrap().clone()
        }

        fn record(&self, n: Notification) -> Result<(), EmailError> {
            self.sent.lock().unwrap().push(n);
            if self.fail {
                return Err(EmailError::Delivery("smtp unavailable".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl EmailSender for RecordingEmailSender {
        async fn send_verification_email(
            &self,
            to_email: &str,
            to_name: &str,
            token: &str,
        ) -> Result<(), EmailError> {
            self.record(Notification::Verification {
                to_email: to_email.into(),
                to_name: to_name.into(),
                token: token.into(),
            })
        }

        async fn send_password_reset_email(
            &self,
            to_email: &str,
            to_name: &str,
            token: &str,
        ) -> Result<(), EmailError> {
            self.record(Notification::PasswordReset {
                to_email: to_email.into(),
                to_name: to_name.into(),
                token: token.into(),
            })
        }

        async fn send_welcome_email(
            &self,
            to_email: &str,
            to_name: &str,
        ) -> Result<(), EmailError> {
            self.record(Notification::Welcome {
                to_email: to_email.into(),
                to_name: to_name.into(),
            })
        }
    }
}
