//! Transport session layer: newline-delimited JSON over TCP.
//!
//! The accept loop lives in [`net::acceptor`](acceptor); [`SessionRegistry`] maps each
//! remote peer to its session outbox and provides the addressed-send primitive that
//! the router and workers reply through.

mod acceptor;
pub mod session;

pub use acceptor::run_acceptor;
pub use session::{InFlight, InFlightGuard, InMemoryReplySink, ReplySink, SessionRegistry};
