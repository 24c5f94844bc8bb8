//! Delivery loop shared by every live feed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AppError;

/// What a change notification means for a feed.
pub(crate) enum Refresh<T> {
    /// The notification already carries the new view.
    Ready(T),
    /// The view has to be read again from the store.
    Reread,
    /// The change cannot affect this feed.
    Skip,
}

/// Handle to a live feed. Cancelling, or dropping the handle, stops callback
/// delivery and releases the store watch.
pub struct Subscription {
    id: Uuid,
    cancelled: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cancel(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(task) = self.task.take() {
            task.abort();
            info!(subscription_id = %self.id, "subscription cancelled");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Delivers `initial`, then a fresh view after every notification on
/// `changes`. A lagged receiver re-reads instead of replaying stale
/// notifications. A failed read is delivered as `Err` and ends the feed.
/// Deliveries for one feed never overlap.
pub(crate) fn spawn_feed<N, T, C, R, F>(
    kind: &'static str,
    mut changes: broadcast::Receiver<N>,
    initial: T,
    mut classify: C,
    reread: R,
    mut on_change: F,
) -> Subscription
where
    N: Clone + Send + 'static,
    T: Send + 'static,
    C: FnMut(N) -> Refresh<T> + Send + 'static,
    R: Fn() -> BoxFuture<'static, Result<T, AppError>> + Send + 'static,
    F: FnMut(Result<T, AppError>) + Send + 'static,
{
    let id = Uuid::new_v4();
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = cancelled.clone();

    let task = tokio::spawn(async move {
        let mut deliver = |update: Result<T, AppError>| {
            if flag.load(Ordering::Acquire) {
                return false;
            }
            let healthy = update.is_ok();
            on_change(update);
            healthy
        };

        if !deliver(Ok(initial)) {
            return;
        }

        loop {
            let update = match changes.recv().await {
                Ok(notice) => match classify(notice) {
                    Refresh::Ready(view) => Ok(view),
                    Refresh::Reread => reread().await,
                    Refresh::Skip => continue,
                },
                Err(RecvError::Lagged(skipped)) => {
                    debug!(subscription_id = %id, feed = kind, skipped, "feed lagged; re-reading");
                    reread().await
                }
                Err(RecvError::Closed) => {
                    info!(subscription_id = %id, feed = kind, "change feed closed");
                    break;
                }
            };

            if let Err(err) = &update {
                warn!(subscription_id = %id, feed = kind, error = %err, "feed read failed; closing");
            }
            if !deliver(update) {
                break;
            }
        }
    });

    info!(subscription_id = %id, feed = kind, "subscription started");

    Subscription {
        id,
        cancelled,
        task: Some(task),
    }
}
