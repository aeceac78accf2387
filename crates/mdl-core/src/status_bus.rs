//! Broadcast channel of job status events.
//!
//! Backed by `tokio::sync::broadcast`: publishing never blocks, the buffer is
//! bounded, and a subscriber that falls behind loses the oldest entries
//! rather than slowing the engine down. Each subscriber sees every update
//! published after it subscribed, in publish order.

use tokio::sync::broadcast;

use crate::model::JobStatusUpdate;

/// Default buffer size when none is configured.
pub const DEFAULT_STATUS_BUFFER: usize = 256;

/// Cloneable handle to the status channel. All clones publish into the same stream.
#[derive(Clone, Debug)]
pub struct StatusBus {
    tx: broadcast::Sender<JobStatusUpdate>,
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new(DEFAULT_STATUS_BUFFER)
    }
}

impl StatusBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an update. Having no subscribers is not an error.
    pub fn publish(&self, update: JobStatusUpdate) {
        let _ = self.tx.send(update);
    }

    pub fn subscribe(&self) -> StatusSubscription {
        StatusSubscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// One subscriber's view of the bus.
#[derive(Debug)]
pub struct StatusSubscription {
    rx: broadcast::Receiver<JobStatusUpdate>,
}

impl StatusSubscription {
    /// Next update, skipping entries dropped on overflow. `None` once every
    /// `StatusBus` handle is gone and the buffer is drained.
    pub async fn recv(&mut self) -> Option<JobStatusUpdate> {
        loop {
            match self.rx.recv().await {
                Ok(update) => return Some(update),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "status subscriber lagged; oldest updates dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of `recv`; `None` when nothing is buffered.
    pub fn try_recv(&mut self) -> Option<JobStatusUpdate> {
        loop {
            match self.rx.try_recv() {
                Ok(update) => return Some(update),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Wait for the final update of `job_id` (the one with `is_finished`).
    pub async fn wait_finished(&mut self, job_id: &str) -> Option<JobStatusUpdate> {
        while let Some(update) = self.recv().await {
            if update.job_id == job_id && update.is_finished {
                return Some(update);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(job: &str, p: f32) -> JobStatusUpdate {
        JobStatusUpdate::new(job).with_progress(p)
    }

    #[tokio::test]
    async fn every_subscriber_sees_every_update_in_order() {
        let bus = StatusBus::new(16);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        for i in 0..5 {
            bus.publish(update("j1", i as f32 / 10.0));
        }
        for sub in [&mut a, &mut b] {
            for i in 0..5 {
                let u = sub.recv().await.unwrap();
                assert_eq!(u.progress, Some(i as f32 / 10.0));
            }
        }
    }

    #[tokio::test]
    async fn late_subscriber_starts_at_subscription_point() {
        let bus = StatusBus::new(16);
        bus.publish(update("j1", 0.1));
        let mut late = bus.subscribe();
        bus.publish(update("j1", 0.2));
        assert_eq!(late.recv().await.unwrap().progress, Some(0.2));
        assert!(late.try_recv().is_none());
    }

    #[tokio::test]
    async fn overflow_drops_oldest() {
        let bus = StatusBus::new(4);
        let mut sub = bus.subscribe();
        for i in 0..10 {
            bus.publish(update("j1", i as f32 / 10.0));
        }
        let first = sub.recv().await.unwrap();
        assert_eq!(first.progress, Some(0.6));
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_fine() {
        let bus = StatusBus::new(2);
        bus.publish(update("j1", 0.5));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn recv_returns_none_when_bus_dropped() {
        let bus = StatusBus::new(2);
        let mut sub = bus.subscribe();
        drop(bus);
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn wait_finished_filters_by_job() {
        let bus = StatusBus::new(16);
        let mut sub = bus.subscribe();
        bus.publish(JobStatusUpdate::new("other").finished());
        bus.publish(update("mine", 0.5));
        bus.publish(JobStatusUpdate::new("mine").with_status("Completed").finished());
        let done = sub.wait_finished("mine").await.unwrap();
        assert_eq!(done.status.as_deref(), Some("Completed"));
    }
}
