use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;

/// Signal d'annulation et échéance d'une requête entrante.
///
/// Le travail en arrière-plan (envoi d'emails) ne reçoit jamais ce contexte :
/// il doit survivre à la déconnexion du client.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new(cancel: CancellationToken, deadline: Option<Instant>) -> Self {
        Self { cancel, deadline }
    }

    /// Contexte sans annulation externe, borné par `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(CancellationToken::new(), Some(Instant::now() + timeout))
    }

    /// Runs `fut` until it completes, the token is cancelled or the
    /// deadline passes, whichever comes first. The future is dropped on
    /// abort, so no partial result escapes.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let deadline = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(AppError::Cancelled),
            () = deadline => Err(AppError::DeadlineExceeded),
            result = fut => result,
        }
    }
}
