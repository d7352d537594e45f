//! Non-blocking publish queue.

use super::{DoorEvent, EventPublisher};
use crate::config::PublishConfig;
use crate::stats::{Counter, SharedPipelineStats};
use crossbeam_channel::{bounded, Sender, TrySendError};
use std::thread::JoinHandle;
use std::time::Duration;

/// Queue and retry settings for [`AsyncPublisher`].
#[derive(Debug, Clone)]
pub struct PublisherOptions {
    pub topic: String,
    pub queue_capacity: usize,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl From<&PublishConfig> for PublisherOptions {
    fn from(config: &PublishConfig) -> Self {
        Self {
            topic: config.topic.clone(),
            queue_capacity: config.queue_capacity,
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff,
        }
    }
}

/// Owns a sink on a worker thread and feeds it from a bounded queue.
///
/// `submit` never blocks the caller. Events that arrive while the queue is
/// full are dropped. Dropping the publisher drains what is already queued.
pub struct AsyncPublisher {
    sender: Option<Sender<DoorEvent>>,
    worker: Option<JoinHandle<()>>,
    stats: SharedPipelineStats,
}

impl AsyncPublisher {
    pub fn spawn(
        publisher: Box<dyn EventPublisher>,
        options: PublisherOptions,
        stats: SharedPipelineStats,
    ) -> std::io::Result<Self> {
        let (sender, receiver) = bounded::<DoorEvent>(options.queue_capacity.max(1));
        let worker_stats = stats.clone();

        let worker = std::thread::Builder::new()
            .name("doorsense-publish".to_string())
            .spawn(move || {
                // Ends once every sender is gone and the queue is empty
                for event in receiver.iter() {
                    deliver(publisher.as_ref(), &options, &event, &worker_stats);
                }
                tracing::debug!("Publish worker stopped");
            })?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            stats,
        })
    }

    /// Queue an event. Returns false if it was dropped.
    pub fn submit(&self, event: DoorEvent) -> bool {
        let Some(sender) = self.sender.as_ref() else {
            self.stats.incr(Counter::Dropped);
            return false;
        };
        match sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                self.stats.incr(Counter::Dropped);
                tracing::warn!(door_state = %event.door_state, "Publish queue full, dropping event");
                false
            }
            Err(TrySendError::Disconnected(event)) => {
                self.stats.incr(Counter::Dropped);
                tracing::warn!(door_state = %event.door_state, "Publish worker gone, dropping event");
                false
            }
        }
    }

    /// Number of events waiting for the worker.
    pub fn pending(&self) -> usize {
        self.sender.as_ref().map(|s| s.len()).unwrap_or(0)
    }

    /// Close the queue and wait for the worker to drain it.
    pub fn shutdown(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Publish worker panicked");
            }
        }
    }
}

impl Drop for AsyncPublisher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn deliver(
    publisher: &dyn EventPublisher,
    options: &PublisherOptions,
    event: &DoorEvent,
    stats: &SharedPipelineStats,
) {
    let attempts = options.max_retries.saturating_add(1);
    for attempt in 1..=attempts {
        match publisher.publish(&options.topic, event) {
            Ok(()) => {
                stats.incr(Counter::Published);
                return;
            }
            Err(e) if attempt < attempts => {
                tracing::debug!(attempt, "Publish attempt failed: {e}");
                std::thread::sleep(options.retry_backoff);
            }
            Err(e) => {
                stats.incr(Counter::PublishFailures);
                tracing::warn!(
                    attempts,
                    door_state = %event.door_state,
                    "Dropping event after failed publish: {e}"
                );
            }
        }
    }
}
