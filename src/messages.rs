//! Envelope, inbound requests and outbound responses.
//!
//! Every unit on the wire is an envelope `{ header, body }`; the body variant is
//! selected by `header.type`. See [`crate::codec`] for the text encoding.

use crate::types::{MsgType, OrderId, OrderType, Side, TimeInForce};
use serde::Serialize;

/// Reject codes carried in [`Reject::code`].
pub mod reject_code {
    /// Undecodable payload: bad JSON, missing header/body, unknown type, bad field.
    pub const MALFORMED: u16 = 400;
    pub const INVALID_QUANTITY: u16 = 101;
    pub const INVALID_PRICE: u16 = 102;
    pub const INVALID_SYMBOL: u16 = 103;
    pub const MISSING_CANCEL_TARGET: u16 = 104;
    /// Ingress queue full under the reject back-pressure policy.
    pub const GATEWAY_BUSY: u16 = 503;
}

pub const PROTOCOL_VERSION: u16 = 1;

/// Envelope header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Header {
    pub version: u16,
    #[serde(rename = "type")]
    pub msg_type: MsgType,
    pub seq: u64,
    pub client_id: u32,
}

impl Header {
    pub fn new(msg_type: MsgType, seq: u64, client_id: u32) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            msg_type,
            seq,
            client_id,
        }
    }
}

/// New order request (client to venue).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NewOrderRequest {
    pub client_order_id: u64,
    pub symbol: String,
    pub side: Side,
    pub ord_type: OrderType,
    pub qty: i64,
    /// Ignored for market orders.
    pub limit_price: i64,
    #[serde(skip_serializing_if = "TimeInForce::is_day")]
    pub tif: TimeInForce,
}

/// Cancel request (client to venue). Either id may identify the order; both may be given.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CancelRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<u64>,
    pub symbol: String,
}

/// Inbound body: exactly one variant per envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum InboundMsg {
    NewOrder(NewOrderRequest),
    Cancel(CancelRequest),
}

impl InboundMsg {
    pub fn msg_type(&self) -> MsgType {
        match self {
            InboundMsg::NewOrder(_) => MsgType::NewOrder,
            InboundMsg::Cancel(_) => MsgType::Cancel,
        }
    }
}

/// Request accepted for processing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub client_order_id: u64,
    pub order_id: OrderId,
    pub symbol: String,
}

/// Request not accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Reject {
    pub client_order_id: u64,
    pub symbol: String,
    pub reason: String,
    pub code: u16,
}

/// Executed quantity against an order. `complete` marks the terminal fill.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Fill {
    pub order_id: OrderId,
    pub symbol: String,
    pub side: Side,
    pub fill_qty: i64,
    pub fill_price: i64,
    pub complete: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OutboundMsg {
    Ack(Ack),
    Reject(Reject),
    Fill(Fill),
}

impl OutboundMsg {
    pub fn msg_type(&self) -> MsgType {
        match self {
            OutboundMsg::Ack(_) => MsgType::Ack,
            OutboundMsg::Reject(_) => MsgType::Reject,
            OutboundMsg::Fill(_) => MsgType::Fill,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvelopeIn {
    pub header: Header,
    pub body: InboundMsg,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvelopeOut {
    pub header: Header,
    pub body: OutboundMsg,
}

impl EnvelopeOut {
    /// Response to `request`: echoes version, seq and client_id; `type` follows `body`.
    pub fn reply(request: &Header, body: OutboundMsg) -> Self {
        Self {
            header: Header {
                version: request.version,
                msg_type: body.msg_type(),
                seq: request.seq,
                client_id: request.client_id,
            },
            body,
        }
    }
}
