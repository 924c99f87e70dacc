//! Request-scoped cancellation.
//!
//! A [`RequestScope`] travels with one pipeline run and is consulted at
//! every suspension point: rate-limit waits, upstream calls and backoff
//! sleeps.

use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a scoped wait ended early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    Cancelled,
    DeadlineExceeded,
}

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interrupted::Cancelled => f.write_str("cancelled by caller"),
            Interrupted::DeadlineExceeded => f.write_str("request deadline exceeded"),
        }
    }
}

/// Cancellation token plus optional deadline for one request.
#[derive(Debug, Clone, Default)]
pub struct RequestScope {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestScope {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    /// Scope that is never cancelled and has no deadline.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Already cancelled or past the deadline.
    pub fn interrupted(&self) -> Option<Interrupted> {
        if self.cancel.is_cancelled() {
            Some(Interrupted::Cancelled)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(Interrupted::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Run `fut` until it completes, the scope is cancelled, or the deadline
    /// passes. `fut` is dropped on interruption.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Interrupted> {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interrupted::Cancelled),
            _ = deadline => Err(Interrupted::DeadlineExceeded),
            output = fut => Ok(output),
        }
    }

    pub async fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        self.run(tokio::time::sleep(duration)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_completes() {
        let scope = RequestScope::unbounded();
        assert_eq!(scope.run(async { 7 }).await, Ok(7));
        assert!(scope.interrupted().is_none());
    }

    #[tokio::test]
    async fn test_cancelled_before_run() {
        let scope = RequestScope::unbounded();
        scope.cancel();
        assert_eq!(scope.run(async { 7 }).await, Err(Interrupted::Cancelled));
        assert_eq!(scope.interrupted(), Some(Interrupted::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_interrupts_sleep() {
        let scope = RequestScope::unbounded().with_timeout(Duration::from_millis(100));
        let start = Instant::now();
        assert_eq!(
            scope.sleep(Duration::from_secs(10)).await,
            Err(Interrupted::DeadlineExceeded)
        );
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_wakes_waiter() {
        let scope = RequestScope::unbounded();
        let waiter = {
            let scope = scope.clone();
            tokio::spawn(async move { scope.sleep(Duration::from_secs(60)).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        scope.cancel();
        assert_eq!(waiter.await.unwrap(), Err(Interrupted::Cancelled));
    }
}
