//! FIFO hand-off between the network-facing and decode-facing tasks.
//!
//! [`IngressQueue`] owns its lock and wake-up discipline: producers and consumers may
//! be any number of tasks. `pop` suspends until an item genuinely exists and is woken
//! as soon as one is pushed. What happens at capacity is an explicit
//! [`BackpressurePolicy`].

use crate::error::PushError;
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// Behavior of [`IngressQueue::push`] when the queue holds `capacity` items.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackpressurePolicy {
    /// Suspend the producer until a consumer frees a slot.
    #[default]
    Block,
    /// Refuse the item immediately with [`PushError::Full`].
    Reject,
    /// Ignore capacity and grow.
    Unbounded,
}

impl FromStr for BackpressurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("block") {
            Ok(BackpressurePolicy::Block)
        } else if s.eq_ignore_ascii_case("reject") || s.eq_ignore_ascii_case("drop") {
            Ok(BackpressurePolicy::Reject)
        } else if s.eq_ignore_ascii_case("unbounded") || s.eq_ignore_ascii_case("grow") {
            Ok(BackpressurePolicy::Unbounded)
        } else {
            Err(format!("unknown back-pressure policy: {}", s))
        }
    }
}

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Multi-producer, multi-consumer FIFO queue.
pub struct IngressQueue<T> {
    state: Mutex<State<T>>,
    capacity: usize,
    policy: BackpressurePolicy,
    not_empty: Notify,
    not_full: Notify,
}

impl<T> fmt::Debug for IngressQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngressQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("policy", &self.policy)
            .finish()
    }
}

impl<T> IngressQueue<T> {
    /// Queue holding at most `capacity` items (at least 1) under `policy`.
    pub fn new(capacity: usize, policy: BackpressurePolicy) -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                closed: false,
            }),
            capacity: capacity.max(1),
            policy,
            not_empty: Notify::new(),
            not_full: Notify::new(),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(usize::MAX, BackpressurePolicy::Unbounded)
    }

    pub fn policy(&self) -> BackpressurePolicy {
        self.policy
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn has_room(&self, state: &State<T>) -> bool {
        self.policy == BackpressurePolicy::Unbounded || state.items.len() < self.capacity
    }

    /// Append `item`. Under [`BackpressurePolicy::Block`] this waits for space.
    pub async fn push(&self, item: T) -> Result<(), PushError<T>> {
        loop {
            let notified = self.not_full.notified();
            tokio::pin!(notified);
            // Register before checking so a pop between check and await is not missed.
            notified.as_mut().enable();
            {
                let mut state = self.lock();
                if state.closed {
                    return Err(PushError::Closed(item));
                }
                if self.has_room(&state) {
                    state.items.push_back(item);
                    drop(state);
                    self.not_empty.notify_one();
                    return Ok(());
                }
                if self.policy == BackpressurePolicy::Reject {
                    return Err(PushError::Full(item));
                }
            }
            notified.await;
        }
    }

    /// Append `item` without waiting; a full queue yields [`PushError::Full`] under any bounded policy.
    pub fn try_push(&self, item: T) -> Result<(), PushError<T>> {
        let mut state = self.lock();
        if state.closed {
            return Err(PushError::Closed(item));
        }
        if !self.has_room(&state) {
            return Err(PushError::Full(item));
        }
        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Oldest item, waiting until one exists. `None` once the queue is closed and drained.
    pub async fn pop(&self) -> Option<T> {
        loop {
            let notified = self.not_empty.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut state = self.lock();
                if let Some(item) = state.items.pop_front() {
                    let more = !state.items.is_empty();
                    drop(state);
                    if more {
                        // Pass the wake-up on so a notify absorbed by this consumer is not lost.
                        self.not_empty.notify_one();
                    }
                    self.not_full.notify_one();
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop accepting items and wake every waiter. Items already queued can still be popped.
    pub fn close(&self) {
        self.lock().closed = true;
        self.not_empty.notify_waiters();
        self.not_full.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn fifo_order() {
        let q = IngressQueue::new(8, BackpressurePolicy::Block);
        for i in 0..5 {
            q.push(i).await.unwrap();
        }
        assert_eq!(q.len(), 5);
        for i in 0..5 {
            assert_eq!(q.pop().await, Some(i));
        }
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn pop_waits_until_push() {
        let q = Arc::new(IngressQueue::new(4, BackpressurePolicy::Block));
        let consumer = {
            let q = Arc::clone(&q);
            tokio::spawn(async move { q.pop().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!consumer.is_finished(), "pop must not return on an empty queue");
        q.push("x").await.unwrap();
        let got = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .expect("consumer woken promptly")
            .unwrap();
        assert_eq!(got, Some("x"));
    }

    #[tokio::test]
    async fn reject_policy_hands_item_back() {
        let q = IngressQueue::new(2, BackpressurePolicy::Reject);
        q.push(1).await.unwrap();
        q.push(2).await.unwrap();
        assert_eq!(q.push(3).await, Err(PushError::Full(3)));
        assert_eq!(q.try_push(4), Err(PushError::Full(4)));
        assert_eq!(q.pop().await, Some(1));
        q.push(3).await.unwrap();
        assert_eq!(q.len(), 2);
    }

    #[tokio::test]
    async fn block_policy_waits_for_space() {
        let q = Arc::new(IngressQueue::new(1, BackpressurePolicy::Block));
        q.push(1).await.unwrap();
        let producer = {
            let q = Arc::clone(&q);
            tokio::spawn(async move { q.push(2).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!producer.is_finished(), "push must wait while full");
        assert_eq!(q.pop().await, Some(1));
        tokio::time::timeout(Duration::from_secs(1), producer)
            .await
            .expect("producer woken")
            .unwrap()
            .unwrap();
        assert_eq!(q.pop().await, Some(2));
    }

    #[tokio::test]
    async fn unbounded_policy_ignores_capacity() {
        let q = IngressQueue::new(1, BackpressurePolicy::Unbounded);
        for i in 0..100 {
            q.try_push(i).unwrap();
        }
        assert_eq!(q.len(), 100);
    }

    #[tokio::test]
    async fn close_drains_then_ends_and_refuses_pushes() {
        let q = IngressQueue::new(4, BackpressurePolicy::Block);
        q.push(1).await.unwrap();
        q.close();
        assert!(q.is_closed());
        assert_eq!(q.push(2).await, Err(PushError::Closed(2)));
        assert_eq!(q.pop().await, Some(1));
        assert_eq!(q.pop().await, None);
    }

    #[tokio::test]
    async fn close_wakes_blocked_consumers() {
        let q = Arc::new(IngressQueue::<u32>::new(4, BackpressurePolicy::Block));
        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let q = Arc::clone(&q);
                tokio::spawn(async move { q.pop().await })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(20)).await;
        q.close();
        for c in consumers {
            let got = tokio::time::timeout(Duration::from_secs(1), c).await.unwrap().unwrap();
            assert_eq!(got, None);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn many_producers_many_consumers_lose_nothing() {
        const PRODUCERS: usize = 8;
        const PER_PRODUCER: usize = 2_000;
        let q = Arc::new(IngressQueue::new(64, BackpressurePolicy::Block));
        let consumers: Vec<_> = (0..8)
            .map(|_| {
                let q = Arc::clone(&q);
                tokio::spawn(async move {
                    let mut got = Vec::new();
                    while let Some(v) = q.pop().await {
                        got.push(v);
                    }
                    got
                })
            })
            .collect();
        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let q = Arc::clone(&q);
                tokio::spawn(async move {
                    for i in 0..PER_PRODUCER {
                        q.push(p * PER_PRODUCER + i).await.unwrap();
                    }
                })
            })
            .collect();
        for p in producers {
            p.await.unwrap();
        }
        q.close();
        let mut seen = HashSet::new();
        for c in consumers {
            let got = c.await.unwrap();
            // Per-consumer view of any one producer is still FIFO.
            let mut last = vec![None; PRODUCERS];
            for v in got {
                let p = v / PER_PRODUCER;
                if let Some(prev) = last[p] {
                    assert!(v > prev);
                }
                last[p] = Some(v);
                assert!(seen.insert(v), "duplicate item {}", v);
            }
        }
        assert_eq!(seen.len(), PRODUCERS * PER_PRODUCER);
    }

    #[test]
    fn policy_parses_from_config_strings() {
        assert_eq!("block".parse::<BackpressurePolicy>(), Ok(BackpressurePolicy::Block));
        assert_eq!("DROP".parse::<BackpressurePolicy>(), Ok(BackpressurePolicy::Reject));
        assert_eq!("grow".parse::<BackpressurePolicy>(), Ok(BackpressurePolicy::Unbounded));
        assert!("lossy".parse::<BackpressurePolicy>().is_err());
    }
}
