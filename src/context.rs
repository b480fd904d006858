//! Cancellation and deadlines for database calls

use crate::error::{Result, StoreError};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Caller-supplied scope for a store operation.
///
/// Every database call made on behalf of the operation goes through
/// [`OpContext::run`], so cancelling the token or passing the deadline aborts
/// the in-flight call and surfaces an error instead of a partial success.
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl OpContext {
    /// No deadline, never cancelled unless [`OpContext::cancel`] is called.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().deadline_at(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self::background().deadline_at(deadline)
    }

    pub fn with_cancel(cancel: CancellationToken) -> Self {
        Self { cancel, deadline: None }
    }

    /// Keeps the earlier of the current and the given deadline.
    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        });
        self
    }

    /// Context cancelled together with this one, but which can also be cancelled on its own.
    pub fn child(&self) -> Self {
        Self { cancel: self.cancel.child_token(), deadline: self.deadline }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fails if the context is already cancelled or past its deadline.
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(StoreError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Drive `fut` unless the context is cancelled or times out first.
    pub async fn run<T, E, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: Into<StoreError>,
    {
        self.check()?;

        let guarded = async {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(StoreError::Cancelled),
                res = fut => res.map_err(Into::into),
            }
        };

        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, guarded)
                .await
                .unwrap_or(Err(StoreError::DeadlineExceeded)),
            None => guarded.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_to_completion_when_unbounded() {
        let ctx = OpContext::background();
        let out = ctx.run(async { Ok::<_, StoreError>(42) }).await.unwrap();
        assert_eq!(out, 42);
    }

    #[tokio::test]
    async fn cancelled_context_refuses_work() {
        let ctx = OpContext::background();
        ctx.cancel();
        let res = ctx.run(async { Ok::<_, StoreError>(()) }).await;
        assert!(matches!(res, Err(StoreError::Cancelled)));
    }

    #[tokio::test]
    async fn cancellation_aborts_in_flight_call() {
        let ctx = OpContext::background();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });
        let res = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, StoreError>(())
            })
            .await;
        assert!(matches!(res, Err(StoreError::Cancelled)));
    }

    #[tokio::test]
    async fn deadline_aborts_slow_call() {
        let ctx = OpContext::with_timeout(Duration::from_millis(20));
        let res = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, StoreError>(())
            })
            .await;
        assert!(matches!(res, Err(StoreError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn elapsed_deadline_fails_before_polling() {
        let ctx = OpContext::with_deadline(Instant::now() - Duration::from_millis(1));
        let res = ctx.run(async { Ok::<_, StoreError>(()) }).await;
        assert!(matches!(res, Err(StoreError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn child_follows_parent_cancellation() {
        let parent = OpContext::background();
        let child = parent.child();
        child.cancel();
        assert!(parent.check().is_ok());
        parent.cancel();
        assert!(matches!(parent.child().check(), Err(StoreError::Cancelled)));
    }

    #[test]
    fn deadline_at_keeps_the_earliest() {
        let now = Instant::now();
        let ctx = OpContext::with_deadline(now + Duration::from_secs(1)).deadline_at(now + Duration::from_secs(10));
        assert_eq!(ctx.deadline(), Some(now + Duration::from_secs(1)));
    }
}
