//! Cancellable request context threaded through every connector and schema
//! operation.
//!
//! A [`Context`] is cheap to clone. Backend futures are driven through
//! [`Context::run`], which drops the in-flight future as soon as the context
//! is canceled or its deadline passes.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::{Result, StrandError};

#[derive(Debug, Clone)]
pub struct Context {
    cancel: watch::Receiver<bool>,
    deadline: Option<Instant>,
}

/// Cancels every [`Context`] derived from the one it was created with.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        // Receivers may all be gone already; nothing left to cancel then.
        let _ = self.tx.send(true);
    }
}

impl Context {
    /// A context that is never canceled and has no deadline.
    pub fn background() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self {
            cancel: rx,
            deadline: None,
        }
    }

    /// A context plus the handle that cancels it.
    pub fn with_cancel() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                cancel: rx,
                deadline: None,
            },
            CancelHandle { tx },
        )
    }

    /// Derive a context that additionally expires after `timeout`. An earlier
    /// existing deadline is kept.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        Self {
            cancel: self.cancel.clone(),
            deadline: Some(match self.deadline {
                Some(existing) if existing < deadline => existing,
                _ => deadline,
            }),
        }
    }

    pub fn is_canceled(&self) -> bool {
        *self.cancel.borrow() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Fail with `Canceled` if the context is already done.
    pub fn check(&self) -> Result<()> {
        if *self.cancel.borrow() {
            return Err(StrandError::Canceled("context canceled".to_string()));
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(StrandError::Canceled("deadline exceeded".to_string()));
        }
        Ok(())
    }

    /// Drive `fut` to completion unless the context is canceled first, in
    /// which case the future is dropped and `Canceled` is returned.
    pub async fn run<F, T, E>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: Into<StrandError>,
    {
        self.check()?;

        let deadline = async {
            match self.deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.canceled() => Err(StrandError::Canceled("context canceled".to_string())),
            _ = deadline => Err(StrandError::Canceled("deadline exceeded".to_string())),
            res = fut => res.map_err(Into::into),
        }
    }

    /// Resolves once the context is canceled. Never resolves for a context
    /// whose handle was dropped without canceling.
    async fn canceled(&self) {
        let mut rx = self.cancel.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn background_context_runs_to_completion() {
        let ctx = Context::background();
        let value = ctx.run(async { Ok::<_, StrandError>(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn cancel_aborts_in_flight_future() {
        let (ctx, handle) = Context::with_cancel();

        let task = tokio::spawn(async move {
            ctx.run(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, StrandError>(())
            })
            .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.cancel();

        let res = task.await.unwrap();
        assert!(matches!(res, Err(StrandError::Canceled(_))));
    }

    #[tokio::test]
    async fn already_canceled_context_never_polls_the_future() {
        let (ctx, handle) = Context::with_cancel();
        handle.cancel();

        let polled = std::sync::atomic::AtomicBool::new(false);
        let res = ctx
            .run(async {
                polled.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok::<_, StrandError>(())
            })
            .await;

        assert!(matches!(res, Err(StrandError::Canceled(_))));
        assert!(!polled.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn deadline_expires() {
        let ctx = Context::background().with_timeout(Duration::from_millis(5));
        let res = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, StrandError>(())
            })
            .await;
        assert!(matches!(res, Err(StrandError::Canceled(_))));
    }
}
