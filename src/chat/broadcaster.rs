//! Event broadcaster with history replay.
//!
//! Every published event is appended to an in-memory history and pushed to
//! all live subscribers. A new subscriber first receives the history as it
//! was at registration time, then every later event, with no gap and no
//! duplicate. History snapshotting and subscriber registration happen under
//! the same lock as publishing, which gives all subscribers one total order.
//!
//! Delivery never blocks the publisher: each subscriber owns a bounded
//! queue, and a subscriber whose queue is full or closed is dropped.

use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use super::message::{Event, Frame};

/// Default per-subscriber queue size.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

/// Unique identifier for a subscriber (server-generated).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(uuid::Uuid);

impl SubscriberId {
    fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct State {
    history: VecDeque<Arc<Frame>>,
    next_id: u64,
    subscribers: HashMap<SubscriberId, mpsc::Sender<Arc<Frame>>>,
}

struct Inner {
    state: Mutex<State>,
    /// Maximum retained events (0 = unbounded).
    history_limit: usize,
    subscriber_buffer: usize,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock cannot leave a torn frame behind:
        // frames are fully built before insertion.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: Event) -> u64 {
        let mut state = self.lock();

        let id = state.next_id;
        state.next_id += 1;

        let frame = Arc::new(Frame { id, event });
        state.history.push_back(Arc::clone(&frame));
        if self.history_limit > 0 && state.history.len() > self.history_limit {
            state.history.pop_front();
        }

        let mut failed = Vec::new();
        for (subscriber_id, sender) in state.subscribers.iter() {
            match sender.try_send(Arc::clone(&frame)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(
                        subscriber = %subscriber_id,
                        event_id = id,
                        "Subscriber queue full, dropping subscriber"
                    );
                    failed.push(*subscriber_id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(subscriber = %subscriber_id, "Subscriber closed");
                    failed.push(*subscriber_id);
                }
            }
        }

        for subscriber_id in failed {
            state.subscribers.remove(&subscriber_id);
        }

        id
    }

    fn remove(&self, id: SubscriberId) -> bool {
        let removed = self.lock().subscribers.remove(&id).is_some();
        if removed {
            debug!(subscriber = %id, "Unsubscribed");
        }
        removed
    }
}

/// Broadcasts events to subscribers and replays history to late joiners.
///
/// Cloning is cheap; all clones share the same history and subscriber set.
#[derive(Clone)]
pub struct Broadcaster {
    inner: Arc<Inner>,
}

impl Broadcaster {
    /// Create a broadcaster with unbounded history.
    pub fn new() -> Self {
        Self::with_limits(0, DEFAULT_SUBSCRIBER_BUFFER)
    }

    /// Create a broadcaster with a history cap and per-subscriber queue size.
    ///
    /// With `history_limit > 0`, replay to late joiners is truncated to the
    /// most recent `history_limit` events. `subscriber_buffer` is clamped to
    /// at least 1.
    pub fn with_limits(history_limit: usize, subscriber_buffer: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    history: VecDeque::new(),
                    next_id: 0,
                    subscribers: HashMap::new(),
                }),
                history_limit,
                subscriber_buffer: subscriber_buffer.max(1),
            }),
        }
    }

    /// Publish an event and return its sequence id.
    ///
    /// Delivery failures are handled per subscriber and never reported to
    /// the caller.
    pub fn publish(&self, event: impl Into<Event>) -> u64 {
        self.inner.publish(event.into())
    }

    /// Register a new subscriber that replays the full retained history.
    pub fn subscribe(&self) -> Subscription {
        self.subscribe_after(None)
    }

    /// Register a new subscriber that replays only events after `last_event_id`.
    ///
    /// Used to resume a stream from the id a client last saw. An id that was
    /// never issued (the client saw an earlier process) replays everything.
    pub fn subscribe_after(&self, last_event_id: Option<u64>) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.inner.subscriber_buffer);
        let id = SubscriberId::new();

        let replay: VecDeque<Arc<Frame>> = {
            let mut state = self.inner.lock();
            let last_event_id = match last_event_id {
                Some(last) if last >= state.next_id => {
                    debug!(
                        subscriber = %id,
                        last_event_id = last,
                        next_id = state.next_id,
                        "Stale resume id, replaying full history"
                    );
                    None
                }
                other => other,
            };
            let replay = state
                .history
                .iter()
                .filter(|frame| last_event_id.map_or(true, |last| frame.id > last))
                .cloned()
                .collect();
            state.subscribers.insert(id, sender);
            replay
        };

        debug!(subscriber = %id, replay = replay.len(), "Subscribed");

        Subscription {
            id,
            replay,
            receiver,
            broadcaster: Arc::downgrade(&self.inner),
        }
    }

    /// Remove a subscriber.
    ///
    /// Returns true if the subscriber was registered. Calling this again, or
    /// after the subscriber was dropped, is a no-op.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.inner.remove(id)
    }

    /// Get the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    /// Get the number of retained events.
    pub fn history_len(&self) -> usize {
        self.inner.lock().history.len()
    }

    /// Get the id of the most recently published event.
    pub fn last_sequence(&self) -> Option<u64> {
        self.inner.lock().next_id.checked_sub(1)
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// A live subscription: replayed history followed by live events.
///
/// Dropping the subscription unsubscribes it.
pub struct Subscription {
    id: SubscriberId,
    replay: VecDeque<Arc<Frame>>,
    receiver: mpsc::Receiver<Arc<Frame>>,
    broadcaster: Weak<Inner>,
}

impl Subscription {
    /// Get the subscriber ID.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Number of replayed frames not yet consumed.
    pub fn pending_replay(&self) -> usize {
        self.replay.len()
    }

    /// Receive the next frame.
    ///
    /// Returns `None` once the subscriber has been removed and its queue is
    /// drained.
    pub async fn recv(&mut self) -> Option<Arc<Frame>> {
        if let Some(frame) = self.replay.pop_front() {
            return Some(frame);
        }
        self.receiver.recv().await
    }
}

impl Stream for Subscription {
    type Item = Arc<Frame>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(frame) = self.replay.pop_front() {
            return Poll::Ready(Some(frame));
        }
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.broadcaster.upgrade() {
            inner.remove(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::Message;
    use futures::StreamExt;
    use std::time::Duration;

    fn text(i: usize) -> Event {
        Event::from(Message::new("tester", format!("msg {i}")))
    }

    async fn next_id(sub: &mut Subscription) -> u64 {
        tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("timed out")
            .expect("stream ended")
            .id
    }

    #[test]
    fn test_publish_assigns_sequential_ids() {
        let broadcaster = Broadcaster::new();
        assert_eq!(broadcaster.last_sequence(), None);
        assert_eq!(broadcaster.publish(text(0)), 0);
        assert_eq!(broadcaster.publish(text(1)), 1);
        assert_eq!(broadcaster.publish(Event::heartbeat()), 2);
        assert_eq!(broadcaster.history_len(), 3);
        assert_eq!(broadcaster.last_sequence(), Some(2));
    }

    #[test]
    fn test_publish_without_subscribers() {
        let broadcaster = Broadcaster::new();
        broadcaster.publish(text(0));
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_late_joiner_gets_replay_then_live() {
        let broadcaster = Broadcaster::new();
        for i in 0..5 {
            broadcaster.publish(text(i));
        }
        broadcaster.publish(Event::heartbeat());

        let mut sub = broadcaster.subscribe();
        assert_eq!(sub.pending_replay(), 6);

        broadcaster.publish(text(99));

        for expected in 0..6 {
            let frame = sub.recv().await.unwrap();
            assert_eq!(frame.id, expected);
        }
        let frame = sub.recv().await.unwrap();
        assert_eq!(frame.id, 6);
        assert_eq!(frame.event.as_message().unwrap().body, "msg 99");
    }

    #[tokio::test]
    async fn test_all_subscribers_see_same_order() {
        let broadcaster = Broadcaster::new();
        let mut a = broadcaster.subscribe();
        broadcaster.publish(text(0));
        let mut b = broadcaster.subscribe();
        broadcaster.publish(text(1));
        broadcaster.publish(Event::heartbeat());

        let seen_a: Vec<u64> = vec![next_id(&mut a).await, next_id(&mut a).await, next_id(&mut a).await];
        let seen_b: Vec<u64> = vec![next_id(&mut b).await, next_id(&mut b).await, next_id(&mut b).await];
        assert_eq!(seen_a, vec![0, 1, 2]);
        assert_eq!(seen_b, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_subscribe_after_resumes() {
        let broadcaster = Broadcaster::new();
        for i in 0..4 {
            broadcaster.publish(text(i));
        }

        let mut sub = broadcaster.subscribe_after(Some(1));
        assert_eq!(sub.pending_replay(), 2);
        assert_eq!(next_id(&mut sub).await, 2);
        assert_eq!(next_id(&mut sub).await, 3);

        let sub = broadcaster.subscribe_after(Some(3));
        assert_eq!(sub.pending_replay(), 0);
    }

    #[tokio::test]
    async fn test_subscribe_after_stale_id_replays_everything() {
        let broadcaster = Broadcaster::new();
        for i in 0..5 {
            broadcaster.publish(text(i));
        }

        // Id from a previous process, beyond anything issued here.
        let mut sub = broadcaster.subscribe_after(Some(900));
        assert_eq!(sub.pending_replay(), 5);
        assert_eq!(next_id(&mut sub).await, 0);

        let sub = broadcaster.subscribe_after(Some(5));
        assert_eq!(sub.pending_replay(), 5);

        let empty = Broadcaster::new();
        assert_eq!(empty.subscribe_after(Some(0)).pending_replay(), 0);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let broadcaster = Broadcaster::new();
        let sub = broadcaster.subscribe();
        let other = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 2);

        assert!(broadcaster.unsubscribe(sub.id()));
        assert!(!broadcaster.unsubscribe(sub.id()));
        assert_eq!(broadcaster.subscriber_count(), 1);

        drop(sub);
        assert_eq!(broadcaster.subscriber_count(), 1);
        drop(other);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_unsubscribed_stream_ends_after_replay() {
        let broadcaster = Broadcaster::new();
        broadcaster.publish(text(0));
        let mut sub = broadcaster.subscribe();
        broadcaster.unsubscribe(sub.id());
        broadcaster.publish(text(1));

        assert_eq!(sub.recv().await.unwrap().id, 0);
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_slow_subscriber_is_dropped_without_affecting_others() {
        let broadcaster = Broadcaster::with_limits(0, 2);
        let slow = broadcaster.subscribe();
        let mut fast = broadcaster.subscribe();

        for i in 0..5 {
            broadcaster.publish(text(i));
            assert_eq!(next_id(&mut fast).await, i as u64);
        }

        assert_eq!(broadcaster.subscriber_count(), 1);
        assert!(!broadcaster.unsubscribe(slow.id()));
    }

    #[tokio::test]
    async fn test_history_limit_truncates_replay() {
        let broadcaster = Broadcaster::with_limits(3, 16);
        for i in 0..10 {
            broadcaster.publish(text(i));
        }
        assert_eq!(broadcaster.history_len(), 3);

        let mut sub = broadcaster.subscribe();
        assert_eq!(next_id(&mut sub).await, 7);
        assert_eq!(next_id(&mut sub).await, 8);
        assert_eq!(next_id(&mut sub).await, 9);
    }

    #[tokio::test]
    async fn test_subscription_is_a_stream() {
        let broadcaster = Broadcaster::new();
        broadcaster.publish(text(0));
        broadcaster.publish(text(1));

        let sub = broadcaster.subscribe();
        let frames: Vec<_> = sub.take(2).collect().await;
        assert_eq!(frames.iter().map(|f| f.id).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }
}
