//! Single-topic, in-process mutation bus.
//!
//! Every subscriber receives every event published after it subscribed, in
//! publish order. Delivery is decoupled through a bounded ring per
//! subscriber ([`tokio::sync::broadcast`]): the publisher never waits, and a
//! subscriber that falls more than `capacity` events behind loses the
//! oldest ones and resumes from the newest retained event. This is a live
//! view feed, not a durable log; a lagging client reconciles with a chunk
//! read.

use std::sync::Arc;

use futures::Stream;
use gridsync_types::MutationEvent;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, warn};

/// Default per-subscriber buffer, in events.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

/// Fan-out hub for committed mutations.
///
/// Cloning yields another handle to the same bus.
#[derive(Debug, Clone)]
pub struct MutationBus {
    tx: broadcast::Sender<Arc<MutationEvent>>,
}

impl MutationBus {
    /// Create a bus whose subscribers each buffer up to `capacity` events.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Register a new subscriber.
    ///
    /// The subscription sees only events published after this call returns.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: Some(self.tx.subscribe()),
            skipped: 0,
        }
    }

    /// Deliver `event` to every current subscriber.
    ///
    /// Returns the number of subscribers it was queued for. Zero subscribers
    /// is not an error.
    pub fn publish(&self, event: MutationEvent) -> usize {
        let kind = event.kind_name();
        let cells = event.len();
        // send returns Err only when there are zero receivers.
        let receivers = self.tx.send(Arc::new(event)).unwrap_or(0);
        debug!(kind, cells, receivers, "Mutation published");
        receivers
    }

    /// Stop `subscription` from receiving further events.
    ///
    /// Idempotent; equivalent to [`Subscription::unsubscribe`].
    pub fn unsubscribe(&self, subscription: &mut Subscription) {
        subscription.unsubscribe();
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for MutationBus {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

/// One subscriber's view of the bus.
///
/// Dropping the subscription unsubscribes it.
#[derive(Debug)]
pub struct Subscription {
    rx: Option<broadcast::Receiver<Arc<MutationEvent>>>,
    skipped: u64,
}

impl Subscription {
    /// Wait for the next event.
    ///
    /// Returns `None` once unsubscribed or when the bus is gone. Events
    /// dropped because this subscriber lagged are skipped and counted in
    /// [`Subscription::skipped`].
    pub async fn recv(&mut self) -> Option<Arc<MutationEvent>> {
        loop {
            let rx = self.rx.as_mut()?;
            match rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(n)) => {
                    warn!(skipped = n, "Subscriber lagged, dropping oldest events");
                    self.skipped = self.skipped.saturating_add(n);
                }
                Err(RecvError::Closed) => {
                    debug!("Mutation bus closed");
                    self.rx = None;
                    return None;
                }
            }
        }
    }

    /// Take the next event if one is already buffered.
    pub fn try_recv(&mut self) -> Option<Arc<MutationEvent>> {
        loop {
            let rx = self.rx.as_mut()?;
            match rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(n)) => {
                    self.skipped = self.skipped.saturating_add(n);
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Closed) => {
                    self.rx = None;
                    return None;
                }
            }
        }
    }

    /// Stop receiving. Idempotent.
    ///
    /// Events already buffered for this subscriber are discarded.
    pub fn unsubscribe(&mut self) {
        if self.rx.take().is_some() {
            debug!("Subscriber unsubscribed");
        }
    }

    /// Whether the subscription can still yield events.
    pub const fn is_active(&self) -> bool {
        self.rx.is_some()
    }

    /// Total events dropped because this subscriber lagged.
    pub const fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Consume the subscription as a lazy, unbounded stream of events.
    pub fn into_stream(self) -> impl Stream<Item = Arc<MutationEvent>> + Send {
        futures::stream::unfold(self, |mut sub| async move {
            let event = sub.recv().await?;
            Some((event, sub))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;
    use gridsync_types::{Cell, Position};

    use super::*;

    fn set(x: i32, y: i32, color: u32) -> MutationEvent {
        MutationEvent::SetCells {
            cells: vec![Cell::new(x, y, color)],
        }
    }

    #[tokio::test]
    async fn every_subscriber_sees_events_in_publish_order() {
        let bus = MutationBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        assert_eq!(bus.publish(set(0, 0, 1)), 2);
        assert_eq!(
            bus.publish(MutationEvent::RemoveCells {
                positions: vec![Position::new(0, 0)]
            }),
            2
        );

        for sub in [&mut a, &mut b] {
            assert_eq!(sub.recv().await.as_deref(), Some(&set(0, 0, 1)));
            assert!(matches!(
                sub.recv().await.as_deref(),
                Some(MutationEvent::RemoveCells { .. })
            ));
        }
    }

    #[tokio::test]
    async fn late_subscriber_gets_no_backlog() {
        let bus = MutationBus::default();
        let mut early = bus.subscribe();
        bus.publish(set(2, 2, 7));

        let mut late = bus.subscribe();
        assert!(late.try_recv().is_none());
        assert_eq!(early.try_recv().as_deref(), Some(&set(2, 2, 7)));

        bus.publish(set(3, 3, 8));
        assert_eq!(late.recv().await.as_deref(), Some(&set(3, 3, 8)));
    }

    #[tokio::test]
    async fn idle_subscriber_does_not_block_publisher_or_peers() {
        let bus = MutationBus::new(8);
        let _idle = bus.subscribe();
        let mut active = bus.subscribe();

        let run = async {
            for i in 0..1_000 {
                bus.publish(set(i, 0, 1));
                let event = active.recv().await;
                assert_eq!(event.as_deref(), Some(&set(i, 0, 1)));
            }
        };
        assert!(
            tokio::time::timeout(Duration::from_secs(5), run)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn lagging_subscriber_drops_oldest() {
        let bus = MutationBus::new(4);
        let mut slow = bus.subscribe();
        for i in 0..10 {
            bus.publish(set(i, 0, 1));
        }

        // The four newest events survive.
        let first = slow.recv().await;
        assert_eq!(first.as_deref(), Some(&set(6, 0, 1)));
        assert_eq!(slow.skipped(), 6);
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent_and_final() {
        let bus = MutationBus::default();
        let mut sub = bus.subscribe();
        bus.publish(set(1, 1, 1));

        bus.unsubscribe(&mut sub);
        sub.unsubscribe();
        assert!(!sub.is_active());
        assert_eq!(bus.subscriber_count(), 0);

        bus.publish(set(2, 2, 2));
        assert!(sub.recv().await.is_none());
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn stream_ends_when_bus_is_dropped() {
        let bus = MutationBus::default();
        let stream = bus.subscribe().into_stream();
        bus.publish(set(4, 4, 4));
        drop(bus);

        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 1);
    }
}
