//! Caller-driven cancellation for a run.
//!
//! [`cancel_pair`] returns a [`CancelHandle`] for the caller and a cloneable
//! [`CancelSignal`] for the dispatcher. A signal can also carry a deadline,
//! after which it reads as cancelled.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Trigger side. Dropping it does not cancel the run.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Observer side, shared by every worker of a dispatch.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

/// Create a linked handle/signal pair.
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (
        CancelHandle { tx },
        CancelSignal {
            rx: Some(rx),
            deadline: None,
        },
    )
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::never()
    }
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self {
            rx: None,
            deadline: None,
        }
    }

    /// Also fire once `timeout` has elapsed from now.
    pub fn with_deadline(mut self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn is_cancelled(&self) -> bool {
        if self.rx.as_ref().is_some_and(|rx| *rx.borrow()) {
            return true;
        }
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves once the signal fires. Pending forever for [`never`](Self::never).
    pub async fn cancelled(&self) {
        let flag = async {
            match &self.rx {
                Some(rx) => {
                    let mut rx = rx.clone();
                    // A dropped handle can no longer cancel.
                    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                        std::future::pending::<()>().await;
                    }
                }
                None => std::future::pending::<()>().await,
            }
        };
        let deadline = async {
            match self.deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            _ = flag => {}
            _ = deadline => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handle_fires_signal() {
        let (handle, signal) = cancel_pair();
        assert!(!signal.is_cancelled());
        handle.cancel();
        assert!(signal.is_cancelled());
        signal.cancelled().await;
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_fires_signal() {
        let signal = CancelSignal::never().with_deadline(Duration::from_secs(5));
        assert!(!signal.is_cancelled());
        signal.cancelled().await;
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn dropped_handle_never_cancels() {
        let (handle, signal) = cancel_pair();
        drop(handle);
        let waited =
            tokio::time::timeout(Duration::from_millis(20), signal.cancelled()).await;
        assert!(waited.is_err());
        assert!(!signal.is_cancelled());
    }
}
