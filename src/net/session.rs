//! Addressed send: peer identity to session outbox.

use crate::types::PeerAddr;
use log::debug;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, Notify};

/// Sends one framed reply to a previously seen originator.
///
/// Delivery is best-effort: returns `false` when the peer's session is gone, in which
/// case the reply is dropped.
pub trait ReplySink: Send + Sync {
    fn send_to(&self, peer: &PeerAddr, line: String) -> bool;
}

struct SessionHandle {
    id: u64,
    outbox: mpsc::UnboundedSender<String>,
}

/// Live sessions keyed by peer. Each session's outbox is drained, in order, by that
/// session's writer task only.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<PeerAddr, SessionHandle>>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PeerAddr, SessionHandle>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `peer`'s outbox and returns the session id needed to unregister it.
    pub fn register(&self, peer: PeerAddr, outbox: mpsc::UnboundedSender<String>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(peer, SessionHandle { id, outbox });
        id
    }

    /// Removes `peer` only if it is still the session `id`, so a late teardown cannot
    /// evict a newer session that reused the address.
    pub fn unregister(&self, peer: &PeerAddr, id: u64) {
        let mut sessions = self.lock();
        if sessions.get(peer).map(|h| h.id) == Some(id) {
            sessions.remove(peer);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplySink for SessionRegistry {
    fn send_to(&self, peer: &PeerAddr, line: String) -> bool {
        let mut sessions = self.lock();
        let Some(handle) = sessions.get(peer) else {
            debug!("reply dropped peer={} reason=no_session", peer);
            return false;
        };
        if handle.outbox.send(line).is_err() {
            // Writer already gone; forget the session.
            sessions.remove(peer);
            debug!("reply dropped peer={} reason=session_closed", peer);
            return false;
        }
        true
    }
}

/// Payloads one session has handed on that are not yet fully processed.
#[derive(Debug, Default)]
pub struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Counts one payload until the returned guard is dropped.
    pub fn begin(self: &Arc<Self>) -> InFlightGuard {
        self.count.fetch_add(1, Ordering::AcqRel);
        InFlightGuard(Arc::clone(self))
    }

    pub fn pending(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Resolves once no payload is pending.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[derive(Debug)]
pub struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// In-memory sink that records every reply, for tests. Clone shares the same buffer.
#[derive(Clone, Default)]
pub struct InMemoryReplySink {
    sent: Arc<Mutex<Vec<(PeerAddr, String)>>>,
}

impl InMemoryReplySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(PeerAddr, String)> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl ReplySink for InMemoryReplySink {
    fn send_to(&self, peer: &PeerAddr, line: String) -> bool {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((peer.clone(), line));
        true
    }
}
