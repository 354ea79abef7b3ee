use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{EmailSender, Notification};

/// Background consumer of the notification queue.
///
/// Runs on its own task with its own shutdown token, never a request's.
/// Delivery failures are logged and dropped; there are no retries.
pub struct NotificationWorker {
    sender: Arc<dyn EmailSender>,
}

impl NotificationWorker {
    pub fn new(sender: Arc<dyn EmailSender>) -> Self {
        Self { sender }
    }

    /// Consumes notifications until `shutdown` fires or every producer is
    /// gone. On shutdown, whatever is already queued is still delivered.
    pub async fn run(self, mut rx: mpsc::Receiver<Notification>, shutdown: CancellationToken) {
        tracing::info!("Notification worker started");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    rx.close();
                    while let Some(notification) = rx.recv().await {
                        self.deliver(&notification).await;
                    }
                    tracing::info!("Notification worker cancelled");
                    break;
                }
                next = rx.recv() => match next {
                    Some(notification) => self.deliver(&notification).await,
                    None => {
                        tracing::info!("Notification queue closed");
                        break;
                    }
                }
            }
        }
    }

    pub fn spawn(
        self,
        rx: mpsc::Receiver<Notification>,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(rx, shutdown))
    }

    async fn deliver(&self, notification: &Notification) {
        if let Err(e) = notification.deliver(self.sender.as_ref()).await {
            tracing::error!(
                kind = notification.kind(),
                to_email = notification.recipient(),
                error = %e,
                "Failed to send email"
            );
        }
    }
}
