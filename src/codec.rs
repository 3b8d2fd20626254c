//! JSON wire codec: envelope framing, enum canonicalization, optional and aliased fields.
//!
//! ```text
//! {"header":{"version":1,"type":1,"seq":12,"client_id":7},
//!  "body":{"client_order_id":999,"symbol":"AAPL","side":"B","ord_type":"LMT","qty":10,"limit_price":10123}}
//! ```
//!
//! Decoding is permissive: enum fields accept an integer code, the canonical short code,
//! or a case-insensitive long form, and `price` stands in for a missing `limit_price`.
//! Encoding is strict and emits exactly one canonical form per value.

use crate::error::DecodeError;
use crate::messages::{
    Ack, CancelRequest, EnvelopeIn, EnvelopeOut, Fill, Header, InboundMsg, NewOrderRequest,
    OutboundMsg, Reject, PROTOCOL_VERSION,
};
use crate::types::{MsgType, OrderId, OrderType, Side, TimeInForce};
use serde::Serialize;
use serde_json::{Map, Value};

/// Symbol reported in a Reject when none could be recovered from the payload.
pub const UNKNOWN_SYMBOL: &str = "UNKNOWN";

const HEADER: &str = "header";
const NEW_ORDER: &str = "NewOrderRequest";
const CANCEL: &str = "CancelRequest";
const ACK: &str = "Ack";
const REJECT: &str = "Reject";
const FILL: &str = "Fill";

/// Decode one inbound envelope. The body variant is selected by `header.type`.
pub fn decode_envelope(raw: &str) -> Result<EnvelopeIn, DecodeError> {
    let (header, body) = split_envelope(raw)?;
    let body = match header.msg_type {
        MsgType::NewOrder => InboundMsg::NewOrder(decode_new_order(&body)?),
        MsgType::Cancel => InboundMsg::Cancel(decode_cancel(&body)?),
        other => return Err(DecodeError::UnsupportedMessageType(other.code().to_string())),
    };
    Ok(EnvelopeIn { header, body })
}

/// Encode an outbound envelope. The header `type` always follows the body variant.
pub fn encode_envelope(envelope: &EnvelopeOut) -> String {
    encode_parts(&envelope.header, envelope.body.msg_type(), &envelope.body)
}

/// Encode an inbound envelope (client side).
pub fn encode_inbound(envelope: &EnvelopeIn) -> String {
    encode_parts(&envelope.header, envelope.body.msg_type(), &envelope.body)
}

/// Decode an outbound envelope (client side).
pub fn decode_outbound(raw: &str) -> Result<EnvelopeOut, DecodeError> {
    let (header, body) = split_envelope(raw)?;
    let body = match header.msg_type {
        MsgType::Ack => OutboundMsg::Ack(decode_ack(&body)?),
        MsgType::Reject => OutboundMsg::Reject(decode_reject(&body)?),
        MsgType::Fill => OutboundMsg::Fill(decode_fill(&body)?),
        other => return Err(DecodeError::UnsupportedMessageType(other.code().to_string())),
    };
    Ok(EnvelopeOut { header, body })
}

/// What could be recovered from a payload that failed to decode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RejectContext {
    pub header: Header,
    pub client_order_id: u64,
    pub symbol: String,
}

/// Best-effort salvage of correlation fields from an undecodable payload.
pub fn reject_context(raw: &str) -> RejectContext {
    let root: Value = serde_json::from_str(raw).unwrap_or(Value::Null);
    let header = root.get(HEADER);
    let body = root.get("body");
    let num = |v: Option<&Value>, key: &str| v.and_then(|v| v.get(key)).and_then(Value::as_u64);

    RejectContext {
        header: Header {
            version: num(header, "version")
                .and_then(|v| u16::try_from(v).ok())
                .unwrap_or(PROTOCOL_VERSION),
            msg_type: MsgType::Reject,
            seq: num(header, "seq").unwrap_or(0),
            client_id: num(header, "client_id")
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(0),
        },
        client_order_id: num(body, "client_order_id").unwrap_or(0),
        symbol: body
            .and_then(|b| b.get("symbol"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN_SYMBOL)
            .to_string(),
    }
}

fn encode_parts<B: Serialize>(header: &Header, msg_type: MsgType, body: &B) -> String {
    let header = Header {
        msg_type,
        ..header.clone()
    };
    serde_json::json!({ "header": header, "body": body }).to_string()
}

fn split_envelope(raw: &str) -> Result<(Header, Value), DecodeError> {
    let mut root: Value =
        serde_json::from_str(raw).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
    let obj = root.as_object_mut().ok_or(DecodeError::MissingEnvelope)?;
    let (header, body) = match (obj.remove(HEADER), obj.remove("body")) {
        (Some(h), Some(b)) if !h.is_null() && !b.is_null() => (h, b),
        _ => return Err(DecodeError::MissingEnvelope),
    };
    Ok((decode_header(&header)?, body))
}

fn decode_header(value: &Value) -> Result<Header, DecodeError> {
    let f = Fields::of(value, HEADER, HEADER)?;
    let msg_type = parse_msg_type(&f, f.required("type")?)?;
    let seq = f.req_u64("seq")?;
    let version = match f.opt_u64("version")? {
        Some(v) => u16::try_from(v).map_err(|_| f.invalid("version", "out of range"))?,
        None => PROTOCOL_VERSION,
    };
    let client_id = match f.opt_u64("client_id")? {
        Some(v) => u32::try_from(v).map_err(|_| f.invalid("client_id", "out of range"))?,
        None => 0,
    };
    Ok(Header {
        version,
        msg_type,
        seq,
        client_id,
    })
}

fn decode_new_order(body: &Value) -> Result<NewOrderRequest, DecodeError> {
    let f = Fields::of(body, NEW_ORDER, "body")?;
    let client_order_id = f.req_u64("client_order_id")?;
    let symbol = f.req_string("symbol")?;
    let side = f.req_enum("side", parse_side)?;
    let ord_type = f.req_enum("ord_type", parse_ord_type)?;
    let qty = f.req_i64("qty")?;
    // Canonical field wins; the alias is only consulted when it is absent.
    let limit_price = match f
        .get("limit_price")
        .map(|v| ("limit_price", v))
        .or_else(|| f.get("price").map(|v| ("price", v)))
    {
        Some((name, v)) => f.i64_value(name, v)?,
        None if ord_type == OrderType::Limit => {
            return Err(DecodeError::MissingField {
                kind: NEW_ORDER,
                field: "limit_price",
            })
        }
        None => 0,
    };
    let tif = f.opt_enum("tif", parse_tif)?.unwrap_or_default();
    Ok(NewOrderRequest {
        client_order_id,
        symbol,
        side,
        ord_type,
        qty,
        limit_price,
        tif,
    })
}

fn decode_cancel(body: &Value) -> Result<CancelRequest, DecodeError> {
    let f = Fields::of(body, CANCEL, "body")?;
    Ok(CancelRequest {
        order_id: f.opt_u64("order_id")?.map(OrderId),
        client_order_id: f.opt_u64("client_order_id")?,
        symbol: f.req_string("symbol")?,
    })
}

fn decode_ack(body: &Value) -> Result<Ack, DecodeError> {
    let f = Fields::of(body, ACK, "body")?;
    Ok(Ack {
        client_order_id: f.req_u64("client_order_id")?,
        order_id: OrderId(f.req_u64("order_id")?),
        symbol: f.req_string("symbol")?,
    })
}

fn decode_reject(body: &Value) -> Result<Reject, DecodeError> {
    let f = Fields::of(body, REJECT, "body")?;
    // Older peers nest reason/code under "info".
    let info = match f.get("info") {
        Some(v) => Fields::of(v, REJECT, "info")?,
        None => f.clone(),
    };
    let code = info.req_u64("code")?;
    Ok(Reject {
        client_order_id: f.opt_u64("client_order_id")?.unwrap_or(0),
        symbol: f.opt_string("symbol")?.unwrap_or_default(),
        reason: info.req_string("reason")?,
        code: u16::try_from(code).map_err(|_| info.invalid("code", "out of range"))?,
    })
}

fn decode_fill(body: &Value) -> Result<Fill, DecodeError> {
    let f = Fields::of(body, FILL, "body")?;
    let complete = f.required("complete")?;
    Ok(Fill {
        order_id: OrderId(f.req_u64("order_id")?),
        symbol: f.req_string("symbol")?,
        side: f.req_enum("side", parse_side)?,
        fill_qty: f.req_i64("fill_qty")?,
        fill_price: f.req_i64("fill_price")?,
        complete: complete
            .as_bool()
            .ok_or_else(|| f.invalid("complete", "expected boolean"))?,
    })
}

fn parse_msg_type(f: &Fields<'_>, v: &Value) -> Result<MsgType, DecodeError> {
    match v {
        Value::Number(n) => n
            .as_u64()
            .and_then(MsgType::from_code)
            .ok_or_else(|| DecodeError::UnsupportedMessageType(n.to_string())),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "neworder" | "neworderrequest" | "new_order" => Ok(MsgType::NewOrder),
            "cancel" | "cancelrequest" => Ok(MsgType::Cancel),
            "ack" => Ok(MsgType::Ack),
            "reject" => Ok(MsgType::Reject),
            "fill" => Ok(MsgType::Fill),
            "heartbeat" => Ok(MsgType::Heartbeat),
            _ => Err(DecodeError::UnsupportedMessageType(s.clone())),
        },
        _ => Err(f.invalid("type", "expected integer or string")),
    }
}

fn parse_side(v: &Value) -> Option<Side> {
    match v {
        Value::Number(n) => match n.as_u64()? {
            1 => Some(Side::Buy),
            2 => Some(Side::Sell),
            _ => None,
        },
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "b" | "buy" | "bid" => Some(Side::Buy),
            "s" | "sell" | "ask" => Some(Side::Sell),
            _ => None,
        },
        _ => None,
    }
}

fn parse_ord_type(v: &Value) -> Option<OrderType> {
    match v {
        Value::Number(n) => match n.as_u64()? {
            1 => Some(OrderType::Market),
            2 => Some(OrderType::Limit),
            _ => None,
        },
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "mkt" | "market" => Some(OrderType::Market),
            "lmt" | "limit" => Some(OrderType::Limit),
            _ => None,
        },
        _ => None,
    }
}

fn parse_tif(v: &Value) -> Option<TimeInForce> {
    match v {
        Value::Number(n) => match n.as_u64()? {
            1 => Some(TimeInForce::Day),
            2 => Some(TimeInForce::IOC),
            _ => None,
        },
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "day" => Some(TimeInForce::Day),
            "ioc" | "immediateorcancel" | "immediate_or_cancel" => Some(TimeInForce::IOC),
            _ => None,
        },
        _ => None,
    }
}

/// Field accessor over one JSON object, attributing errors to `kind`.
/// `null` counts as absent.
#[derive(Clone)]
struct Fields<'a> {
    kind: &'static str,
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    fn of(value: &'a Value, kind: &'static str, field: &'static str) -> Result<Self, DecodeError> {
        value
            .as_object()
            .map(|map| Fields { kind, map })
            .ok_or_else(|| DecodeError::InvalidField {
                kind,
                field,
                reason: "expected object".into(),
            })
    }

    fn invalid(&self, field: &'static str, reason: impl Into<String>) -> DecodeError {
        DecodeError::InvalidField {
            kind: self.kind,
            field,
            reason: reason.into(),
        }
    }

    fn get(&self, name: &str) -> Option<&'a Value> {
        self.map.get(name).filter(|v| !v.is_null())
    }

    fn required(&self, name: &'static str) -> Result<&'a Value, DecodeError> {
        self.get(name).ok_or(DecodeError::MissingField {
            kind: self.kind,
            field: name,
        })
    }

    fn u64_value(&self, name: &'static str, v: &Value) -> Result<u64, DecodeError> {
        v.as_u64()
            .ok_or_else(|| self.invalid(name, "expected non-negative integer"))
    }

    fn i64_value(&self, name: &'static str, v: &Value) -> Result<i64, DecodeError> {
        v.as_i64().ok_or_else(|| self.invalid(name, "expected integer"))
    }

    fn string_value(&self, name: &'static str, v: &Value) -> Result<String, DecodeError> {
        v.as_str()
            .map(str::to_string)
            .ok_or_else(|| self.invalid(name, "expected string"))
    }

    fn req_u64(&self, name: &'static str) -> Result<u64, DecodeError> {
        self.u64_value(name, self.required(name)?)
    }

    fn opt_u64(&self, name: &'static str) -> Result<Option<u64>, DecodeError> {
        self.get(name).map(|v| self.u64_value(name, v)).transpose()
    }

    fn req_i64(&self, name: &'static str) -> Result<i64, DecodeError> {
        self.i64_value(name, self.required(name)?)
    }

    fn req_string(&self, name: &'static str) -> Result<String, DecodeError> {
        self.string_value(name, self.required(name)?)
    }

    fn opt_string(&self, name: &'static str) -> Result<Option<String>, DecodeError> {
        self.get(name).map(|v| self.string_value(name, v)).transpose()
    }

    fn req_enum<T>(&self, name: &'static str, parse: fn(&Value) -> Option<T>) -> Result<T, DecodeError> {
        let v = self.required(name)?;
        parse(v).ok_or_else(|| self.invalid(name, format!("unrecognized value {}", v)))
    }

    fn opt_enum<T>(
        &self,
        name: &'static str,
        parse: fn(&Value) -> Option<T>,
    ) -> Result<Option<T>, DecodeError> {
        match self.get(name) {
            Some(v) => parse(v)
                .map(Some)
                .ok_or_else(|| self.invalid(name, format!("unrecognized value {}", v))),
            None => Ok(None),
        }
    }
}
