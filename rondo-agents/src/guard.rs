//! Run-scoped cancellation and wall-clock deadline.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation handle shared between a run and whoever may cancel it.
pub type RunCancellationToken = CancellationToken;

/// Why a run was interrupted between or during governed calls.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum Interrupt {
    #[error("run cancelled")]
    Cancelled,

    #[error("run timed out after {timeout_ms}ms")]
    TimedOut { timeout_ms: u64 },
}

/// Checks and races a run's cancellation token and deadline.
///
/// Checked before each turn and before each gateway or tool call; in-flight
/// calls are raced against both so a hung collaborator cannot outlive the
/// run's budget.
#[derive(Debug, Clone, Default)]
pub struct RunGuard {
    cancellation: Option<RunCancellationToken>,
    deadline: Option<(Instant, Duration)>,
}

impl RunGuard {
    /// A guard that never interrupts.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Start the clock now for `timeout`, if given.
    pub fn new(cancellation: Option<RunCancellationToken>, timeout: Option<Duration>) -> Self {
        Self {
            cancellation,
            deadline: timeout.map(|t| (Instant::now() + t, t)),
        }
    }

    fn timed_out(&self) -> Interrupt {
        let timeout_ms = self
            .deadline
            .map(|(_, t)| t.as_millis() as u64)
            .unwrap_or_default();
        Interrupt::TimedOut { timeout_ms }
    }

    /// Fail if the run has been cancelled or its deadline has passed.
    pub fn check(&self) -> Result<(), Interrupt> {
        if self
            .cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            return Err(Interrupt::Cancelled);
        }
        if let Some((deadline, _)) = self.deadline {
            if Instant::now() >= deadline {
                return Err(self.timed_out());
            }
        }
        Ok(())
    }

    /// Await `fut` unless the run is cancelled or times out first.
    pub async fn race<F>(&self, fut: F) -> Result<F::Output, Interrupt>
    where
        F: Future,
    {
        let cancelled = async {
            match &self.cancellation {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some((deadline, _)) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(Interrupt::Cancelled),
            _ = expired => Err(self.timed_out()),
            value = fut => Ok(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unbounded_guard_passes_through() {
        let guard = RunGuard::unbounded();
        guard.check().unwrap();
        assert_eq!(guard.race(async { 7 }).await, Ok(7));
    }

    #[tokio::test]
    async fn test_cancelled_token_interrupts() {
        let token = RunCancellationToken::new();
        let guard = RunGuard::new(Some(token.clone()), None);
        guard.check().unwrap();

        token.cancel();
        assert_eq!(guard.check(), Err(Interrupt::Cancelled));
        assert_eq!(
            guard.race(std::future::pending::<()>()).await,
            Err(Interrupt::Cancelled)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_interrupts_in_flight_call() {
        let guard = RunGuard::new(None, Some(Duration::from_secs(50)));
        let slow = tokio::time::sleep(Duration::from_secs(120));
        assert_eq!(
            guard.race(slow).await,
            Err(Interrupt::TimedOut { timeout_ms: 50_000 })
        );
        assert!(guard.check().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_call_beats_deadline() {
        let guard = RunGuard::new(None, Some(Duration::from_secs(50)));
        let fast = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            "done"
        };
        assert_eq!(guard.race(fast).await, Ok("done"));
        guard.check().unwrap();
    }
}
