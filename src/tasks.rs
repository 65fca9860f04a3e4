//! Background queue for fire-and-forget side effects.
//!
//! Editor actions mutate the session synchronously and hand any network
//! work to this queue. Task failures are logged and dropped; they never
//! reach the code that dispatched them.

use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;

use tokio::sync::{mpsc, oneshot};

type Job = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;

enum Message {
    Run { label: String, job: Job },
    Barrier(oneshot::Sender<()>),
}

/// Handle to a worker running queued tasks one at a time, in dispatch order.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<Message>,
}

impl TaskQueue {
    /// Spawn the worker. Must be called inside a tokio runtime.
    ///
    /// The worker exits once every handle has been dropped.
    pub fn start() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx));
        Self { tx }
    }

    pub fn dispatch<F, E>(&self, label: impl Into<String>, task: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display,
    {
        let label = label.into();
        let job: Job = Box::pin(async move { task.await.map_err(|e| e.to_string()) });
        if self.tx.send(Message::Run { label, job }).is_err() {
            tracing::warn!("Background worker has stopped; dropping task");
        }
    }

    /// Wait until every task dispatched before this call has finished.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Message::Barrier(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

async fn run(mut rx: mpsc::UnboundedReceiver<Message>) {
    while let Some(message) = rx.recv().await {
        match message {
            Message::Run { label, job } => {
                if let Err(e) = job.await {
                    tracing::warn!("Background task '{}' failed: {}", label, e);
                } else {
                    tracing::debug!("Background task '{}' done", label);
                }
            }
            Message::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }
}
