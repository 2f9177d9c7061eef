//! In-memory broker implementation.
//!
//! Provides the same durable-queue semantics as a production broker for
//! tests and single-process wiring: messages published before a consumer
//! registers are buffered, delivery requires manual acknowledgment, and
//! failed deliveries are requeued up to a bound before being routed to the
//! queue's dead-letter sibling.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::Event;
use tokio::sync::RwLock;

use crate::error::BrokerError;
use crate::handler::EventHandler;
use crate::pubsub::MessageBroker;

/// Redelivery bound before a message is dead-lettered.
pub const DEFAULT_MAX_REDELIVERIES: u32 = 5;

/// Returns the dead-letter sibling queue name for a queue.
pub fn dead_letter_queue(queue: &str) -> String {
    format!("{queue}.dlq")
}

/// A message waiting on a queue, with its redelivery count.
#[derive(Debug, Clone)]
struct Delivery {
    event: Event,
    redeliveries: u32,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Delivery>,
    consumer: Option<Arc<dyn EventHandler>>,
}

/// In-memory durable broker.
///
/// Cloning is cheap; clones share the same queues.
#[derive(Clone)]
pub struct InMemoryBroker {
    queues: Arc<RwLock<HashMap<String, QueueState>>>,
    max_redeliveries: u32,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    /// Creates a broker with the default redelivery bound.
    pub fn new() -> Self {
        Self::with_max_redeliveries(DEFAULT_MAX_REDELIVERIES)
    }

    /// Creates a broker with a custom redelivery bound.
    pub fn with_max_redeliveries(max_redeliveries: u32) -> Self {
        Self {
            queues: Arc::new(RwLock::new(HashMap::new())),
            max_redeliveries,
        }
    }

    /// Number of messages waiting on a queue.
    pub async fn pending_count(&self, queue: &str) -> usize {
        self.queues
            .read()
            .await
            .get(queue)
            .map(|state| state.pending.len())
            .unwrap_or(0)
    }

    /// Snapshot of the events waiting on a queue, oldest first.
    pub async fn pending_events(&self, queue: &str) -> Vec<Event> {
        self.queues
            .read()
            .await
            .get(queue)
            .map(|state| state.pending.iter().map(|d| d.event.clone()).collect())
            .unwrap_or_default()
    }

    /// Number of messages on a queue's dead-letter sibling.
    pub async fn dead_letter_count(&self, queue: &str) -> usize {
        self.pending_count(&dead_letter_queue(queue)).await
    }

    /// Delivers every pending message to its registered consumer.
    ///
    /// Runs until no queue has a deliverable message. Failed deliveries
    /// are requeued with an incremented redelivery count; once the count
    /// exceeds the bound the message moves to the dead-letter sibling, so
    /// the loop always terminates. Returns the number of acknowledged
    /// deliveries.
    pub async fn dispatch_pending(&self) -> usize {
        let mut acked = 0;

        loop {
            let next = {
                let mut queues = self.queues.write().await;
                let mut found = None;
                for (name, state) in queues.iter_mut() {
                    if let Some(handler) = state.consumer.as_ref()
                        && let Some(delivery) = state.pending.pop_front()
                    {
                        found = Some((name.clone(), Arc::clone(handler), delivery));
                        break;
                    }
                }
                found
            };

            let Some((queue, handler, mut delivery)) = next else {
                break;
            };

            match handler.handle(delivery.event.clone()).await {
                Ok(()) => {
                    acked += 1;
                    metrics::counter!("broker_messages_acked").increment(1);
                }
                Err(err) => {
                    delivery.redeliveries += 1;
                    if delivery.redeliveries > self.max_redeliveries {
                        tracing::warn!(
                            %queue,
                            handler = handler.name(),
                            redeliveries = delivery.redeliveries,
                            error = %err,
                            "redelivery bound exceeded, dead-lettering message"
                        );
                        metrics::counter!("broker_messages_dead_lettered").increment(1);
                        let dlq = dead_letter_queue(&queue);
                        self.queues
                            .write()
                            .await
                            .entry(dlq)
                            .or_default()
                            .pending
                            .push_back(delivery);
                    } else {
                        tracing::warn!(
                            %queue,
                            handler = handler.name(),
                            redeliveries = delivery.redeliveries,
                            error = %err,
                            "handler failed, requeueing message"
                        );
                        metrics::counter!("broker_messages_requeued").increment(1);
                        if let Some(state) = self.queues.write().await.get_mut(&queue) {
                            state.pending.push_back(delivery);
                        }
                    }
                }
            }
        }

        acked
    }

    /// Dispatches pending messages on an interval, forever.
    pub async fn run_dispatcher(&self, interval: Duration) {
        loop {
            self.dispatch_pending().await;
            tokio::time::sleep(interval).await;
        }
    }
}

#[async_trait]
impl crate::client::Transport for InMemoryBroker {
    async fn connect(&self) -> Result<(), BrokerError> {
        // The in-memory broker lives in-process; there is nothing to dial.
        Ok(())
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn publish(&self, queue: &str, event: &Event) -> Result<(), BrokerError> {
        let mut queues = self.queues.write().await;
        let state = queues.entry(queue.to_string()).or_default();
        state.pending.push_back(Delivery {
            event: event.clone(),
            redeliveries: 0,
        });
        metrics::counter!("broker_messages_published").increment(1);
        tracing::debug!(%queue, event_type = %event.event_type, "published message");
        Ok(())
    }

    async fn subscribe(
        &self,
        queue: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<(), BrokerError> {
        let mut queues = self.queues.write().await;
        let state = queues.entry(queue.to_string()).or_default();
        if state.consumer.is_some() {
            return Err(BrokerError::ConsumerAlreadyRegistered {
                queue: queue.to_string(),
            });
        }
        tracing::debug!(%queue, handler = handler.name(), "registered consumer");
        state.consumer = Some(handler);
        Ok(())
    }
}
