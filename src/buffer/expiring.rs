//! Self-expiring message buffer.
//!
//! Every inserted message gets its own removal timer armed at
//! `created_at + visibility_window`, so eviction lands within a small
//! scheduling slack (≤ 50ms) of the true deadline no matter how bursty
//! insertion is. A single mutex serialises insert, remove, clear and the
//! snapshot read; timer tasks never sleep while holding it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;

use crate::common::{BufferEvent, ChatMessage};

/// Default visibility window, matching the 3 second message lifetime of the UI.
pub const DEFAULT_VISIBILITY_WINDOW: Duration = Duration::from_millis(3000);

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Errors returned by [`ExpiringBuffer::insert`].
#[derive(Debug, thiserror::Error)]
pub enum InsertError {
    /// No async runtime is available to arm the removal timer. A message
    /// without a removal guarantee is rejected rather than left to linger.
    #[error("no runtime available to schedule message removal")]
    NoScheduler,
    #[error("message {0} is already live")]
    DuplicateId(String),
}

/// Ordered buffer of live chat messages, each evicted when its window elapses.
///
/// Cloning is cheap and shares the same underlying sequence.
#[derive(Debug, Clone)]
pub struct ExpiringBuffer {
    inner: Arc<Mutex<Inner>>,
    visibility_window: Duration,
    events: broadcast::Sender<BufferEvent>,
}

#[derive(Debug)]
struct Inner {
    /// Live messages ascending by `created_at`, the authoritative display order.
    live: Vec<ChatMessage>,
    /// One outstanding removal timer per live message, keyed by message id.
    timers: HashMap<String, AbortHandle>,
}

impl ExpiringBuffer {
    pub fn new(visibility_window: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                live: Vec::new(),
                timers: HashMap::new(),
            })),
            visibility_window,
            events,
        }
    }

    pub fn visibility_window(&self) -> Duration {
        self.visibility_window
    }

    /// Subscribe to change notifications for re-rendering.
    pub fn subscribe(&self) -> broadcast::Receiver<BufferEvent> {
        self.events.subscribe()
    }

    /// Append a message and arm its removal timer.
    ///
    /// The sequence stays ordered by `created_at` regardless of call order.
    /// A message whose deadline already passed is still accepted and evicted
    /// immediately rather than skipped.
    pub fn insert(&self, message: ChatMessage) -> Result<(), InsertError> {
        let runtime = Handle::try_current().map_err(|_| InsertError::NoScheduler)?;

        let deadline = message.created_at + self.visibility_window.as_millis() as i64;
        let delay = Duration::from_millis((deadline - Utc::now().timestamp_millis()).max(0) as u64);

        let mut inner = self.lock();
        if inner.timers.contains_key(&message.id) {
            return Err(InsertError::DuplicateId(message.id));
        }

        let position = inner
            .live
            .iter()
            .rposition(|live| live.created_at <= message.created_at)
            .map_or(0, |found| found + 1);
        inner.live.insert(position, message.clone());

        let buffer = self.clone();
        let id = message.id.clone();
        let timer = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            buffer.expire(&id);
        });
        inner.timers.insert(message.id.clone(), timer.abort_handle());
        drop(inner);

        let _ = self.events.send(BufferEvent::Inserted(message));
        Ok(())
    }

    /// Remove a message explicitly, cancelling its timer.
    ///
    /// Removing an id that is not live is a no-op, not an error, and emits
    /// no notification. Returns whether a removal actually occurred.
    pub fn remove(&self, id: &str) -> bool {
        let mut inner = self.lock();
        let Some(position) = inner.live.iter().position(|live| live.id == id) else {
            return false;
        };
        inner.live.remove(position);
        if let Some(timer) = inner.timers.remove(id) {
            timer.abort();
        }
        drop(inner);

        let _ = self.events.send(BufferEvent::Removed(id.to_string()));
        true
    }

    /// Point-in-time copy of the live sequence in display order.
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.lock().live.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().live.is_empty()
    }

    /// Session teardown: cancel every outstanding timer and empty the buffer.
    ///
    /// Timers are aborted before the lock is released, so a timer task racing
    /// this call finds its message gone and does nothing.
    pub fn clear(&self) {
        let mut inner = self.lock();
        for (_, timer) in inner.timers.drain() {
            timer.abort();
        }
        let was_empty = inner.live.is_empty();
        inner.live.clear();
        drop(inner);

        if !was_empty {
            let _ = self.events.send(BufferEvent::Cleared);
        }
    }

    /// Timer path: evict a message whose window elapsed, if still live.
    fn expire(&self, id: &str) {
        let mut inner = self.lock();
        let Some(position) = inner.live.iter().position(|live| live.id == id) else {
            return;
        };
        inner.live.remove(position);
        inner.timers.remove(id);
        drop(inner);

        log::debug!("Message {id} expired");
        let _ = self.events.send(BufferEvent::Expired(id.to_string()));
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // The lock is never held across an await point, so poisoning only
        // follows a panic that is already fatal to the session.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ExpiringBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_VISIBILITY_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    fn message(body: &str) -> ChatMessage {
        ChatMessage::new("alice", body).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn message_is_evicted_when_window_elapses() {
        let buffer = ExpiringBuffer::default();
        buffer.insert(message("hello")).unwrap();

        tokio::time::sleep(Duration::from_millis(2900)).await;
        assert_eq!(buffer.snapshot().len(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(buffer.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn overdue_message_is_evicted_immediately() {
        let buffer = ExpiringBuffer::default();
        let stale = chrono::Utc::now().timestamp_millis() - 5000;
        let overdue = ChatMessage::with_created_at("alice", "late", stale).unwrap();

        buffer.insert(overdue).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(buffer.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_orders_by_created_at_not_call_order() {
        let buffer = ExpiringBuffer::default();
        let base = chrono::Utc::now().timestamp_millis();
        let early = ChatMessage::with_created_at("alice", "first", base).unwrap();
        let middle = ChatMessage::with_created_at("bob", "second", base + 10).unwrap();
        let late = ChatMessage::with_created_at("carol", "third", base + 20).unwrap();

        buffer.insert(middle).unwrap();
        buffer.insert(late).unwrap();
        buffer.insert(early).unwrap();

        let bodies: Vec<_> = buffer.snapshot().into_iter().map(|m| m.body).collect();
        assert_eq!(bodies, ["first", "second", "third"]);
    }

    #[tokio::test(start_paused = true)]
    async fn remove_is_idempotent() {
        let buffer = ExpiringBuffer::default();
        let mut events = buffer.subscribe();
        let msg = message("hello");
        let id = msg.id.clone();
        buffer.insert(msg).unwrap();

        assert!(buffer.remove(&id));
        assert!(!buffer.remove(&id));
        assert!(buffer.snapshot().is_empty());

        assert!(matches!(events.try_recv(), Ok(BufferEvent::Inserted(_))));
        assert!(matches!(events.try_recv(), Ok(BufferEvent::Removed(_))));
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_id_is_rejected() {
        let buffer = ExpiringBuffer::default();
        let msg = message("hello");
        buffer.insert(msg.clone()).unwrap();

        assert!(matches!(
            buffer.insert(msg),
            Err(InsertError::DuplicateId(_))
        ));
        assert_eq!(buffer.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_cancels_all_timers_and_stays_silent() {
        let buffer = ExpiringBuffer::default();
        let mut events = buffer.subscribe();
        for n in 0..5 {
            buffer.insert(message(&format!("msg {n}"))).unwrap();
        }
        buffer.clear();
        assert!(buffer.is_empty());

        for _ in 0..5 {
            assert!(matches!(events.try_recv(), Ok(BufferEvent::Inserted(_))));
        }
        assert!(matches!(events.try_recv(), Ok(BufferEvent::Cleared)));

        // Let every original deadline pass; the aborted timers must not fire.
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
        assert!(buffer.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_emits_a_distinct_reason() {
        let buffer = ExpiringBuffer::default();
        let mut events = buffer.subscribe();
        buffer.insert(message("hello")).unwrap();

        tokio::time::sleep(Duration::from_millis(3100)).await;
        assert!(matches!(events.try_recv(), Ok(BufferEvent::Inserted(_))));
        assert!(matches!(events.try_recv(), Ok(BufferEvent::Expired(_))));
    }

    #[test]
    fn insert_without_runtime_is_refused() {
        let buffer = ExpiringBuffer::default();
        assert!(matches!(
            buffer.insert(message("hello")),
            Err(InsertError::NoScheduler)
        ));
        assert!(buffer.is_empty());
    }
}
