//! Bounded outbox queue and its delivery worker

use metrics::counter;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::{Notification, NotificationSink};

/// What happened to one notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Enqueued,
    Delivered,
    Failed,
    Dropped,
}

impl DispatchOutcome {
    /// Metric label value
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchOutcome::Enqueued => "enqueued",
            DispatchOutcome::Delivered => "delivered",
            DispatchOutcome::Failed => "failed",
            DispatchOutcome::Dropped => "dropped",
        }
    }
}

/// Counters shared by the queue handle and the worker
#[derive(Debug, Default)]
pub struct DispatchStats {
    enqueued: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSnapshot {
    pub enqueued: u64,
    pub delivered: u64,
    pub failed: u64,
    pub dropped: u64,
}

impl DispatchStats {
    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    pub fn record(&self, outcome: DispatchOutcome) {
        let cell = match outcome {
            DispatchOutcome::Enqueued => &self.enqueued,
            DispatchOutcome::Delivered => &self.delivered,
            DispatchOutcome::Failed => &self.failed,
            DispatchOutcome::Dropped => &self.dropped,
        };
        cell.fetch_add(1, Ordering::Relaxed);
        counter!("marketplace_notifications_total", "outcome" => outcome.as_str()).increment(1);
    }
}

/// Producer handle; cheap to clone
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    sender: mpsc::Sender<Notification>,
    stats: Arc<DispatchStats>,
}

impl NotificationQueue {
    /// Create a queue and the worker that drains it
    pub fn new<K>(capacity: usize, sink: K) -> (Self, NotificationWorker<K>)
    where
        K: NotificationSink,
    {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let stats = Arc::new(DispatchStats::default());

        let queue = Self {
            sender,
            stats: stats.clone(),
        };
        let worker = NotificationWorker {
            receiver,
            sink,
            stats,
        };
        (queue, worker)
    }

    /// Hand a notification to the worker without waiting.
    ///
    /// Never fails: a full or closed queue drops the notification.
    pub fn enqueue(&self, notification: Notification) {
        let notification_id = notification.id;
        let kind = notification.kind.as_str();

        match self.sender.try_send(notification) {
            Ok(()) => self.stats.record(DispatchOutcome::Enqueued),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.record(DispatchOutcome::Dropped);
                warn!(%notification_id, kind, "Notification queue full, dropping notification");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.record(DispatchOutcome::Dropped);
                warn!(%notification_id, kind, "Notification worker stopped, dropping notification");
            }
        }
    }

    pub fn enqueue_all(&self, notifications: impl IntoIterator<Item = Notification>) {
        for notification in notifications {
            self.enqueue(notification);
        }
    }

    pub fn stats(&self) -> DispatchSnapshot {
        self.stats.snapshot()
    }
}

/// Drains the queue into a [`NotificationSink`]
pub struct NotificationWorker<K: NotificationSink> {
    receiver: mpsc::Receiver<Notification>,
    sink: K,
    stats: Arc<DispatchStats>,
}

impl<K: NotificationSink> NotificationWorker<K> {
    /// Start the worker in the background
    pub fn start(self, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run(shutdown).await;
        })
    }

    /// Deliver until every producer is gone or shutdown is signalled.
    ///
    /// On shutdown, notifications already queued are still delivered.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Notification worker started");

        loop {
            tokio::select! {
                next = self.receiver.recv() => match next {
                    Some(notification) => self.deliver(notification).await,
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        self.receiver.close();
                        while let Some(notification) = self.receiver.recv().await {
                            self.deliver(notification).await;
                        }
                        break;
                    }
                }
            }
        }

        info!(stats = ?self.stats.snapshot(), "Notification worker stopped");
    }

    async fn deliver(&self, notification: Notification) {
        match self.sink.deliver(&notification).await {
            Ok(()) => {
                self.stats.record(DispatchOutcome::Delivered);
                debug!(
                    notification_id = %notification.id,
                    user_id = %notification.user_id,
                    kind = notification.kind.as_str(),
                    "Notification delivered"
                );
            }
            Err(e) => {
                self.stats.record(DispatchOutcome::Failed);
                warn!(
                    notification_id = %notification.id,
                    user_id = %notification.user_id,
                    error = %e,
                    "Notification delivery failed"
                );
            }
        }
    }
}
