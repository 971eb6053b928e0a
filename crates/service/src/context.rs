//! Per-operation cancellation and deadline signal.
//!
//! Every storage call receives an [`OpContext`]. Network-bound adapters run
//! each round trip through [`OpContext::run`], which drops the in-flight
//! future as soon as the caller cancels or the deadline passes.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::errors::StorageError;

#[derive(Clone, Debug, Default)]
pub struct OpContext {
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

/// Cancels every [`OpContext`] cloned from the one it was created with.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl OpContext {
    /// Never cancelled, no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().timeout(timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self { deadline: Some(deadline), cancel: None }
    }

    pub fn cancellable() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (Self { deadline: None, cancel: Some(rx) }, CancelHandle { tx })
    }

    /// Narrow the deadline to at most `timeout` from now. An earlier existing
    /// deadline is kept.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        if let Some(candidate) = Instant::now().checked_add(timeout) {
            self.deadline = Some(match self.deadline {
                Some(existing) => existing.min(candidate),
                None => candidate,
            });
        }
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Fail fast when the signal has already fired.
    pub fn check(&self) -> Result<(), StorageError> {
        if self.is_cancelled() {
            return Err(StorageError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(StorageError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Drive `fut` to completion unless the signal fires first, in which case
    /// `fut` is dropped and `Cancelled` or `DeadlineExceeded` is returned.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, StorageError>
    where
        F: Future<Output = Result<T, StorageError>>,
    {
        self.check()?;
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(StorageError::Cancelled),
            _ = expired => Err(StorageError::DeadlineExceeded),
            res = fut => res,
        }
    }

    async fn cancelled(&self) {
        let Some(mut rx) = self.cancel.clone() else {
            return std::future::pending().await;
        };
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // handle dropped without cancelling
                return std::future::pending().await;
            }
        }
    }
}
