//! Core types and IDs shared by the codec, router and matching boundary.
//!
//! Enums serialize to their canonical wire spelling only; the permissive
//! spellings accepted on decode live in [`crate::codec`].

use serde::{Serialize, Serializer};
use std::fmt;
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Venue-assigned order identifier. Unique for the process lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct OrderId(pub u64);

/// Transport-assigned identity of a remote client, e.g. `"127.0.0.1:50312"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PeerAddr(pub String);

impl From<SocketAddr> for PeerAddr {
    fn from(addr: SocketAddr) -> Self {
        PeerAddr(addr.to_string())
    }
}

impl From<&str> for PeerAddr {
    fn from(s: &str) -> Self {
        PeerAddr(s.to_string())
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Order side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Side {
    #[serde(rename = "B")]
    Buy,
    #[serde(rename = "S")]
    Sell,
}

/// Order type: limit (with price) or market (take best available).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum OrderType {
    #[serde(rename = "MKT")]
    Market,
    #[serde(rename = "LMT")]
    Limit,
}

/// Time-in-force. `Day` is the default and is omitted on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum TimeInForce {
    #[default]
    #[serde(rename = "DAY")]
    Day,
    /// Immediate-or-Cancel: fill what you can immediately; cancel the rest.
    #[serde(rename = "IOC")]
    IOC,
}

impl TimeInForce {
    pub fn is_day(&self) -> bool {
        matches!(self, TimeInForce::Day)
    }
}

/// Message kind carried in the envelope header `type` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MsgType {
    NewOrder,
    Cancel,
    Ack,
    Reject,
    Fill,
    Heartbeat,
}

impl MsgType {
    pub fn code(self) -> u16 {
        match self {
            MsgType::NewOrder => 1,
            MsgType::Cancel => 2,
            MsgType::Ack => 100,
            MsgType::Reject => 101,
            MsgType::Fill => 102,
            MsgType::Heartbeat => 900,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(MsgType::NewOrder),
            2 => Some(MsgType::Cancel),
            100 => Some(MsgType::Ack),
            101 => Some(MsgType::Reject),
            102 => Some(MsgType::Fill),
            900 => Some(MsgType::Heartbeat),
            _ => None,
        }
    }
}

impl Serialize for MsgType {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u16(self.code())
    }
}

/// Domain order handed to the matching boundary.
///
/// Created only by the router after a successful decode and validation. `price` is
/// in integer ticks and is 0 for market orders. `origin` identifies the session the
/// order arrived on so that execution reports can be addressed back to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub order_id: OrderId,
    pub client_order_id: u64,
    pub client_id: u32,
    pub origin: PeerAddr,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub price: i64,
    pub quantity: i64,
    /// Ingestion time, nanoseconds since the Unix epoch.
    pub timestamp: u64,
}

impl Order {
    pub fn is_limit(&self) -> bool {
        matches!(self.order_type, OrderType::Limit)
    }

    pub fn is_market(&self) -> bool {
        matches!(self.order_type, OrderType::Market)
    }
}

/// Nanoseconds since the Unix epoch; 0 if the clock is before the epoch.
pub fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
