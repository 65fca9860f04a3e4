use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use super::SyncReconciler;
use crate::remote::RemoteBackend;

/// A one-shot "sync all pending projects" scheduled after a delay.
///
/// Dropping or cancelling the handle before the delay elapses prevents the
/// sync. Once the sync has started it runs to completion.
pub struct DelayedSync {
    cancel: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

impl DelayedSync {
    /// Must be called inside a tokio runtime.
    pub fn schedule<R: RemoteBackend>(reconciler: Arc<SyncReconciler<R>>, delay: Duration) -> Self {
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel_rx => {
                    tracing::debug!("Delayed sync cancelled");
                    return;
                }
            }

            tracing::info!("Delayed sync firing after {:?}", delay);
            if let Err(e) = reconciler.sync_pending().await {
                tracing::error!("Delayed sync failed: {}", e);
            }
        });

        Self {
            cancel: Some(cancel_tx),
            handle,
        }
    }

    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for DelayedSync {
    fn drop(&mut self) {
        self.cancel();
    }
}
