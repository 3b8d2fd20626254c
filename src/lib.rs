//! # Venue Gateway
//!
//! Order-entry gateway for a trading venue: accepts newline-delimited JSON envelopes
//! over TCP, decodes and validates them, assigns venue order ids, replies with an Ack
//! or Reject to the originating session, and forwards accepted orders to an external
//! matching component.
//!
//! ## Entry point
//!
//! Build a [`Gateway`] from a [`GatewayConfig`] and a [`MatchingBoundary`], then
//! [`Gateway::start`] it inside a tokio runtime. [`RunningGateway::stop`] shuts it down.
//!
//! ## Example
//!
//! The request pipeline can be driven without a socket:
//!
//! ```rust
//! use std::sync::Arc;
//! use venue_gateway::{Disposition, IdGenerator, InMemoryReplySink, OrderId, PeerAddr, RecordingBoundary, RequestRouter};
//!
//! let replies = InMemoryReplySink::new();
//! let boundary = RecordingBoundary::new();
//! let router = RequestRouter::new(
//!     Arc::new(IdGenerator::new(0)),
//!     Arc::new(boundary.clone()),
//!     Arc::new(replies.clone()),
//! );
//! let raw = r#"{"header":{"version":1,"type":1,"seq":12,"client_id":7},"body":{"client_order_id":999,"symbol":"AAPL","side":"B","ord_type":"LMT","qty":10,"limit_price":10123}}"#;
//! let outcome = router.process_msg(&PeerAddr::from("127.0.0.1:40000"), raw);
//! assert_eq!(outcome, Disposition::Acked { order_id: OrderId(1) });
//! assert_eq!(boundary.orders()[0].price, 10123);
//! assert!(replies.sent()[0].1.contains(r#""order_id":1"#));
//! ```
//!
//! ## Lower-level API
//!
//! [`codec`] handles the wire format on its own; [`IngressQueue`] and
//! [`DecodeWorkerPool`] are usable outside the gateway.

pub mod boundary;
pub mod codec;
pub mod config;
pub mod error;
pub mod gateway;
pub mod id_gen;
pub mod loadgen;
pub mod messages;
pub mod net;
pub mod queue;
pub mod router;
pub mod shutdown;
pub mod types;
pub mod worker;

pub use boundary::{CancelOrder, DownstreamCommand, MatchingBoundary, OrderQueueBoundary, RecordingBoundary};
pub use codec::{decode_envelope, decode_outbound, encode_envelope, encode_inbound};
pub use config::GatewayConfig;
pub use error::{DecodeError, PushError, TransportError, ValidationError};
pub use gateway::{DispatchMode, Gateway, RunningGateway};
pub use id_gen::IdGenerator;
pub use loadgen::{Expect, ExpectedTally, GeneratedPayload, PayloadGenerator, PayloadGeneratorConfig};
pub use messages::{
    reject_code, Ack, CancelRequest, EnvelopeIn, EnvelopeOut, Fill, Header, InboundMsg, NewOrderRequest,
    OutboundMsg, Reject,
};
pub use net::{InMemoryReplySink, ReplySink, SessionRegistry};
pub use queue::{BackpressurePolicy, IngressQueue};
pub use router::{Disposition, RequestRouter};
pub use shutdown::{Shutdown, ShutdownSignal};
pub use types::{MsgType, Order, OrderId, OrderType, PeerAddr, Side, TimeInForce};
pub use worker::{DecodeWorkerPool, InboundPayload};
