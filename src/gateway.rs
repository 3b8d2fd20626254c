//! Gateway assembly: listener, session registry, router, and either a worker pool or
//! in-line dispatch, plus the start/stop lifecycle.

use crate::boundary::MatchingBoundary;
use crate::config::GatewayConfig;
use crate::error::{PushError, TransportError};
use crate::id_gen::IdGenerator;
use crate::net::{run_acceptor, InFlightGuard, ReplySink, SessionRegistry};
use crate::queue::IngressQueue;
use crate::router::RequestRouter;
use crate::shutdown::Shutdown;
use crate::types::PeerAddr;
use crate::worker::{DecodeWorkerPool, InboundPayload};
use log::{debug, error, info};
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Where a session hands each received line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DispatchMode {
    /// Ingress queue drained by the decode worker pool.
    #[default]
    Pooled,
    /// Router runs on the session task itself; no queue.
    Inline,
}

impl FromStr for DispatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pooled" | "pool" | "workers" => Ok(DispatchMode::Pooled),
            "inline" | "direct" => Ok(DispatchMode::Inline),
            other => Err(format!("unknown dispatch mode: {}", other)),
        }
    }
}

/// Session-side entry point for received payloads.
pub enum Ingress {
    Inline(Arc<RequestRouter>),
    Queued {
        queue: Arc<IngressQueue<InboundPayload>>,
        router: Arc<RequestRouter>,
    },
}

impl Ingress {
    /// Hands one payload on. `guard` is held until the payload has been processed
    /// or dropped.
    pub async fn deliver(&self, peer: &PeerAddr, payload: String, guard: InFlightGuard) {
        match self {
            Ingress::Inline(router) => {
                if panic::catch_unwind(AssertUnwindSafe(|| router.process_msg(peer, &payload))).is_err() {
                    error!("panic processing payload from peer={}", peer);
                }
                drop(guard);
            }
            Ingress::Queued { queue, router } => {
                match queue.push(InboundPayload::tracked(peer.clone(), payload, guard)).await {
                    Ok(()) => {}
                    Err(PushError::Full(item)) => {
                        debug!("ingress full peer={} len={}", item.peer, queue.len());
                        router.reject_busy(&item.peer, &item.payload);
                    }
                    Err(PushError::Closed(item)) => {
                        debug!("ingress closed, dropping payload from peer={}", item.peer);
                    }
                }
            }
        }
    }
}

/// A configured, not yet listening gateway.
pub struct Gateway {
    config: GatewayConfig,
    ids: Arc<IdGenerator>,
    boundary: Arc<dyn MatchingBoundary>,
}

impl Gateway {
    pub fn new(config: GatewayConfig, boundary: Arc<dyn MatchingBoundary>) -> Self {
        let ids = Arc::new(IdGenerator::new(config.id_offset));
        Self {
            config,
            ids,
            boundary,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn ids(&self) -> Arc<IdGenerator> {
        Arc::clone(&self.ids)
    }

    /// Binds the listener and spawns the accept loop (and workers in pooled mode).
    /// Must be called within a tokio runtime. A bind failure is the only fatal error.
    pub async fn start(self) -> Result<RunningGateway, TransportError> {
        let addr = self.config.listen_addr.clone();
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(source) => return Err(TransportError::Bind { addr, source }),
        };
        let local_addr = listener.local_addr()?;

        let registry = Arc::new(SessionRegistry::new());
        let replies: Arc<dyn ReplySink> = registry.clone();
        let router = Arc::new(RequestRouter::new(
            Arc::clone(&self.ids),
            self.boundary,
            replies,
        ));
        let shutdown = Shutdown::new();

        let (ingress, queue, pool) = match self.config.mode {
            DispatchMode::Inline => (Ingress::Inline(Arc::clone(&router)), None, None),
            DispatchMode::Pooled => {
                let queue = Arc::new(IngressQueue::new(
                    self.config.queue_capacity,
                    self.config.backpressure,
                ));
                let pool = DecodeWorkerPool::spawn(
                    self.config.workers,
                    Arc::clone(&queue),
                    Arc::clone(&router),
                    shutdown.signal(),
                );
                let ingress = Ingress::Queued {
                    queue: Arc::clone(&queue),
                    router: Arc::clone(&router),
                };
                (ingress, Some(queue), Some(pool))
            }
        };

        let acceptor = tokio::spawn(run_acceptor(
            listener,
            Arc::clone(&registry),
            Arc::new(ingress),
            self.config.max_line_bytes,
            shutdown.signal(),
        ));

        info!(
            "gateway listening addr={} mode={:?} workers={} queue_capacity={} backpressure={:?} id_offset={}",
            local_addr,
            self.config.mode,
            pool.as_ref().map_or(0, DecodeWorkerPool::size),
            self.config.queue_capacity,
            self.config.backpressure,
            self.config.id_offset
        );

        Ok(RunningGateway {
            local_addr,
            ids: self.ids,
            router,
            registry,
            queue,
            pool,
            acceptor,
            shutdown,
        })
    }
}

/// Handle to a listening gateway. Dropping it without [`stop`](Self::stop) also
/// signals shutdown, but does not wait for the tasks to finish.
pub struct RunningGateway {
    local_addr: SocketAddr,
    ids: Arc<IdGenerator>,
    router: Arc<RequestRouter>,
    registry: Arc<SessionRegistry>,
    queue: Option<Arc<IngressQueue<InboundPayload>>>,
    pool: Option<DecodeWorkerPool>,
    acceptor: JoinHandle<()>,
    shutdown: Shutdown,
}

impl RunningGateway {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn ids(&self) -> Arc<IdGenerator> {
        Arc::clone(&self.ids)
    }

    /// Router shared with the sessions; the matching side sends Fills through it.
    pub fn router(&self) -> Arc<RequestRouter> {
        Arc::clone(&self.router)
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Payloads waiting for a worker; always 0 in inline mode.
    pub fn queued(&self) -> usize {
        self.queue.as_ref().map_or(0, |q| q.len())
    }

    /// Stops accepting, ends every session and worker, and releases the listening
    /// socket. Payloads still queued are dropped. Returns the number processed by workers.
    pub async fn stop(self) -> u64 {
        self.shutdown.trigger();
        if let Some(queue) = &self.queue {
            queue.close();
        }
        if let Err(e) = self.acceptor.await {
            error!("acceptor task failed: {}", e);
        }
        let processed = match self.pool {
            Some(pool) => pool.join().await,
            None => 0,
        };
        info!(
            "gateway stopped addr={} processed={} last_order_id={}",
            self.local_addr,
            processed,
            self.ids.last_issued()
        );
        processed
    }
}
