//! Cancellation signal shared between the host and in-flight phases
//!
//! A phase races each remote call against the signal; when the signal fires
//! the call's future is dropped, which aborts it. Anything mutated only in
//! local memory before the write is simply discarded.

use std::future::Future;

use tokio::sync::watch;

use crate::error::{Phase, ReconcileError, Result};

/// Fires a [`CancelSignal`]
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Cancel every phase observing the paired signal
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Observed by phases to abort in-flight remote calls
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

/// Create a connected handle and signal
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

impl CancelSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        let (_handle, signal) = cancel_pair();
        signal
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation has been requested
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            // Handle dropped without cancelling: never fires.
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Run `fut` unless cancellation fires first
    pub(crate) async fn guard<F, T>(&self, phase: Phase, fut: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        if self.is_cancelled() {
            return Err(ReconcileError::Cancelled { phase });
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(ReconcileError::Cancelled { phase }),
            out = fut => Ok(out),
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::never()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_guard_passes_through_when_not_cancelled() {
        let signal = CancelSignal::never();
        let out = signal.guard(Phase::Observe, async { 7 }).await.unwrap();
        assert_eq!(out, 7);
    }

    #[tokio::test]
    async fn test_guard_short_circuits_after_cancel() {
        let (handle, signal) = cancel_pair();
        handle.cancel();
        assert!(signal.is_cancelled());

        let err = signal
            .guard(Phase::Delete, async { unreachable!("future must not run") })
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Cancelled { phase: Phase::Delete }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_aborts_in_flight_future() {
        let (handle, signal) = cancel_pair();

        let task = tokio::spawn(async move {
            signal
                .guard(Phase::Update, tokio::time::sleep(Duration::from_secs(60)))
                .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert_eq!(err.phase(), Phase::Update);
    }
}
