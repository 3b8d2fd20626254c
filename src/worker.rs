//! Decode worker pool: N tasks draining the ingress queue into the router.

use crate::net::InFlightGuard;
use crate::queue::IngressQueue;
use crate::router::RequestRouter;
use crate::shutdown::ShutdownSignal;
use crate::types::PeerAddr;
use log::{debug, error, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// One raw line and the session it came from.
#[derive(Debug)]
pub struct InboundPayload {
    pub peer: PeerAddr,
    pub payload: String,
    /// Keeps the originating session open for replies until this payload is processed.
    pub inflight: Option<InFlightGuard>,
}

impl InboundPayload {
    pub fn new(peer: PeerAddr, payload: impl Into<String>) -> Self {
        Self {
            peer,
            payload: payload.into(),
            inflight: None,
        }
    }

    pub fn tracked(peer: PeerAddr, payload: impl Into<String>, guard: InFlightGuard) -> Self {
        Self {
            inflight: Some(guard),
            ..Self::new(peer, payload)
        }
    }
}

/// Fixed set of worker tasks sharing one queue and one router.
pub struct DecodeWorkerPool {
    workers: Vec<JoinHandle<u64>>,
}

impl DecodeWorkerPool {
    /// Spawns `size` workers (at least one). Each runs until `shutdown` fires or the
    /// queue is closed and drained.
    pub fn spawn(
        size: usize,
        queue: Arc<IngressQueue<InboundPayload>>,
        router: Arc<RequestRouter>,
        shutdown: ShutdownSignal,
    ) -> Self {
        let workers = (0..size.max(1))
            .map(|index| {
                tokio::spawn(worker_loop(
                    index,
                    Arc::clone(&queue),
                    Arc::clone(&router),
                    shutdown.clone(),
                ))
            })
            .collect();
        Self { workers }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Waits for every worker to exit and returns the number of payloads they processed.
    pub async fn join(self) -> u64 {
        let mut total = 0;
        for handle in self.workers {
            match handle.await {
                Ok(n) => total += n,
                Err(e) => warn!("worker task failed: {}", e),
            }
        }
        total
    }
}

async fn worker_loop(
    index: usize,
    queue: Arc<IngressQueue<InboundPayload>>,
    router: Arc<RequestRouter>,
    mut shutdown: ShutdownSignal,
) -> u64 {
    let mut processed = 0u64;
    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.wait() => break,
            item = queue.pop() => item,
        };
        let Some(item) = next else {
            break;
        };
        // A panic in one message must not take the worker down with it.
        if panic::catch_unwind(AssertUnwindSafe(|| router.process_msg(&item.peer, &item.payload))).is_err() {
            error!("worker={} panicked processing payload from peer={}", index, item.peer);
        }
        // Releases the session's in-flight slot only after the reply is queued.
        drop(item);
        processed += 1;
    }
    debug!("worker={} exiting processed={}", index, processed);
    processed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{CancelOrder, MatchingBoundary, RecordingBoundary};
    use crate::id_gen::IdGenerator;
    use crate::net::{InFlight, InMemoryReplySink};
    use crate::queue::BackpressurePolicy;
    use crate::shutdown::Shutdown;
    use crate::types::Order;
    use serde_json::json;
    use std::time::Duration;

    fn new_order(client_order_id: u64, symbol: &str) -> String {
        json!({
            "header": {"type": 1, "seq": client_order_id, "client_id": 1},
            "body": {"client_order_id": client_order_id, "symbol": symbol, "side": "B", "ord_type": "MKT", "qty": 1}
        })
        .to_string()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn pool_drains_queue_then_exits_on_close() {
        let replies = InMemoryReplySink::new();
        let boundary = RecordingBoundary::new();
        let router = Arc::new(RequestRouter::new(
            Arc::new(IdGenerator::default()),
            Arc::new(boundary.clone()),
            Arc::new(replies.clone()),
        ));
        let queue = Arc::new(IngressQueue::new(64, BackpressurePolicy::Block));
        let shutdown = Shutdown::new();
        let pool = DecodeWorkerPool::spawn(4, Arc::clone(&queue), router, shutdown.signal());
        assert_eq!(pool.size(), 4);

        let peer = PeerAddr::from("127.0.0.1:7000");
        for i in 1..=200u64 {
            let payload = if i % 10 == 0 { "garbage".to_string() } else { new_order(i, "AAPL") };
            queue.push(InboundPayload::new(peer.clone(), payload)).await.unwrap();
        }
        queue.close();

        let processed = tokio::time::timeout(Duration::from_secs(5), pool.join()).await.unwrap();
        assert_eq!(processed, 200);
        assert_eq!(replies.len(), 200);
        assert_eq!(boundary.orders().len(), 180);
    }

    struct Exploding;

    impl MatchingBoundary for Exploding {
        fn submit_order(&self, order: Order) {
            if order.symbol == "BOOM" {
                panic!("boundary failure");
            }
        }
        fn cancel_order(&self, _cancel: CancelOrder) {}
    }

    #[tokio::test]
    async fn panic_in_one_message_does_not_stop_worker() {
        let replies = InMemoryReplySink::new();
        let router = Arc::new(RequestRouter::new(
            Arc::new(IdGenerator::default()),
            Arc::new(Exploding),
            Arc::new(replies.clone()),
        ));
        let queue = Arc::new(IngressQueue::unbounded());
        let shutdown = Shutdown::new();
        let pool = DecodeWorkerPool::spawn(1, Arc::clone(&queue), router, shutdown.signal());

        let peer = PeerAddr::from("127.0.0.1:7001");
        queue.try_push(InboundPayload::new(peer.clone(), new_order(1, "BOOM"))).unwrap();
        queue.try_push(InboundPayload::new(peer.clone(), new_order(2, "AAPL"))).unwrap();
        queue.close();

        assert_eq!(pool.join().await, 2);
        // Ack for the first order went out before the boundary panicked.
        assert_eq!(replies.len(), 2);
    }

    #[tokio::test]
    async fn in_flight_slot_released_after_processing() {
        let replies = InMemoryReplySink::new();
        let router = Arc::new(RequestRouter::new(
            Arc::new(IdGenerator::default()),
            Arc::new(RecordingBoundary::new()),
            Arc::new(replies.clone()),
        ));
        let queue = Arc::new(IngressQueue::unbounded());
        let inflight = InFlight::new();
        let peer = PeerAddr::from("127.0.0.1:7002");
        for i in 1..=3 {
            queue
                .try_push(InboundPayload::tracked(peer.clone(), new_order(i, "AAPL"), inflight.begin()))
                .unwrap();
        }
        assert_eq!(inflight.pending(), 3);

        let shutdown = Shutdown::new();
        let pool = DecodeWorkerPool::spawn(2, Arc::clone(&queue), router, shutdown.signal());
        tokio::time::timeout(Duration::from_secs(2), inflight.wait_idle()).await.unwrap();
        assert_eq!(replies.len(), 3);
        queue.close();
        assert_eq!(pool.join().await, 3);
    }

    #[tokio::test]
    async fn shutdown_stops_idle_workers() {
        let router = Arc::new(RequestRouter::new(
            Arc::new(IdGenerator::default()),
            Arc::new(RecordingBoundary::new()),
            Arc::new(InMemoryReplySink::new()),
        ));
        let queue: Arc<IngressQueue<InboundPayload>> = Arc::new(IngressQueue::new(8, BackpressurePolicy::Block));
        let shutdown = Shutdown::new();
        let pool = DecodeWorkerPool::spawn(3, Arc::clone(&queue), router, shutdown.signal());
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.trigger();
        let processed = tokio::time::timeout(Duration::from_secs(2), pool.join()).await.unwrap();
        assert_eq!(processed, 0);
        assert!(!queue.is_closed());
    }
}
