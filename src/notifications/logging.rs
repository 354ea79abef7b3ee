use async_trait::async_trait;

use super::{EmailError, EmailSender};

/// Sender used when no delivery transport is configured: records that an
/// email would have gone out. The raw token is never logged.
#[derive(Debug, Clone, Default)]
pub struct LoggingEmailSender;

fn check_recipient(to_email: &str) -> Result<(), EmailError> {
    if to_email.trim().is_empty() {
        return Err(EmailError::Delivery("empty recipient address".into()));
    }
    Ok(())
}

#[async_trait]
impl EmailSender for LoggingEmailSender {
    async fn send_verification_email(
        &self,
        to_email: &str,
        to_name: &str,
        _token: &str,
    ) -> Result<(), EmailError> {
        check_recipient(to_email)?;
        tracing::info!(to_email, to_name, "📧 Verification email");
        Ok(())
    }

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        to_name: &str,
        _token: &str,
    ) -> Result<(), EmailError> {
        check_recipient(to_email)?;
        tracing::info!(to_email, to_name, "📧 Password reset email");
        Ok(())
    }

    async fn send_welcome_email(&self, to_email: &str, to_name: &str) -> Result<(), EmailError> {
        check_recipient(to_email)?;
        tracing::info!(to_email, to_name, "📧 Welcome email");
        Ok(())
    }
}
