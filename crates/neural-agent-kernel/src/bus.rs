//! Topic-based event bus
//!
//! Every subscription owns an unbounded queue registered under each of its
//! topics. Publishing never waits on subscribers and never drops an event for
//! a subscriber that is still subscribed; a slow subscriber only grows its own
//! backlog. Queues of dropped subscriptions are pruned on the next publish.

use std::collections::BTreeSet;
use std::future::Future;

use async_stream::stream;
use dashmap::DashMap;
use futures::stream::BoxStream;
use futures::StreamExt;
use neural_types::{event, Event};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

pub type EventStream = BoxStream<'static, Event>;

#[derive(Debug)]
pub struct EventBus {
    namespace: String,
    topics: DashMap<String, Vec<mpsc::UnboundedSender<Event>>>,
}

impl EventBus {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            topics: DashMap::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn topic(&self, event_type: &str) -> String {
        event::topic(&self.namespace, event_type)
    }

    /// Publish an event; returns the number of subscribers it reached
    pub fn publish(&self, event: Event) -> usize {
        let topic = self.topic(&event.event_type);
        let delivered = match self.topics.get_mut(&topic) {
            Some(mut senders) => {
                senders.retain(|sender| sender.send(event.clone()).is_ok());
                senders.len()
            }
            None => 0,
        };
        tracing::debug!(topic = %topic, delivered, "Published event");
        metrics::counter!("neural_bus_events_published_total", "topic" => topic).increment(1);
        delivered
    }

    /// Subscribers currently registered on `event_type`
    pub fn subscriber_count(&self, event_type: &str) -> usize {
        self.topics
            .get(&self.topic(event_type))
            .map_or(0, |senders| senders.iter().filter(|s| !s.is_closed()).count())
    }

    /// Stream of every listed event type, in publish order, starting from now
    pub fn subscribe(&self, event_types: &[&str]) -> EventStream {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let topics: BTreeSet<String> = event_types.iter().map(|t| self.topic(t)).collect();
        for topic in topics {
            self.topics.entry(topic).or_default().push(sender.clone());
        }
        drop(sender);

        stream! {
            while let Some(event) = receiver.recv().await {
                yield event;
            }
        }
        .boxed()
    }

    /// Run `callback` for every matching event on a supervised task
    ///
    /// The subscription is registered before this returns, so events published
    /// afterwards are observed. Callbacks for one subscription run one at a time.
    pub fn spawn_listener<F, Fut>(
        &self,
        owner: &str,
        event_types: &[&str],
        callback: F,
    ) -> Subscription
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let topics: Vec<String> = event_types.iter().map(|t| self.topic(t)).collect();
        let mut events = self.subscribe(event_types);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let owner = owner.to_string();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    next = events.next() => match next {
                        Some(event) => callback(event).await,
                        None => break,
                    },
                }
            }
            tracing::debug!(owner = %owner, "Event listener stopped");
        });

        Subscription {
            topics,
            stop: Some(stop_tx),
            handle: Some(handle),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(event::DEFAULT_NAMESPACE)
    }
}

/// A running listener; dropping it aborts the task
#[derive(Debug)]
pub struct Subscription {
    topics: Vec<String>,
    stop: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// Stop the listener and wait for any in-flight callback to finish
    pub async fn cancel(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
