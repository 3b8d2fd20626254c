//! Request router: decode, validate, assign a venue id, reply, forward.
//!
//! [`RequestRouter::process_msg`] handles one payload start to finish on the calling
//! task. Every new-order or cancel attempt that fails decoding or validation yields
//! exactly one Reject and nothing downstream; every accepted new order yields exactly
//! one Ack, sent before the order reaches the matching boundary.

use crate::boundary::{CancelOrder, MatchingBoundary};
use crate::codec;
use crate::error::ValidationError;
use crate::id_gen::IdGenerator;
use crate::messages::{
    reject_code, Ack, CancelRequest, EnvelopeOut, Fill, Header, InboundMsg, NewOrderRequest,
    OutboundMsg, Reject,
};
use crate::net::ReplySink;
use crate::types::{now_nanos, MsgType, Order, OrderId, OrderType, PeerAddr};
use log::{debug, info, warn};
use std::sync::Arc;

/// What happened to one inbound payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    Acked { order_id: OrderId },
    Rejected { code: u16 },
    /// Forwarded without an immediate reply; confirmation comes from the matching side.
    CancelForwarded,
}

pub struct RequestRouter {
    ids: Arc<IdGenerator>,
    boundary: Arc<dyn MatchingBoundary>,
    replies: Arc<dyn ReplySink>,
}

impl RequestRouter {
    pub fn new(
        ids: Arc<IdGenerator>,
        boundary: Arc<dyn MatchingBoundary>,
        replies: Arc<dyn ReplySink>,
    ) -> Self {
        Self {
            ids,
            boundary,
            replies,
        }
    }

    pub fn ids(&self) -> &Arc<IdGenerator> {
        &self.ids
    }

    /// Handles one raw payload from `peer`. Never panics on bad input; failures become Rejects.
    pub fn process_msg(&self, peer: &PeerAddr, payload: &str) -> Disposition {
        match codec::decode_envelope(payload) {
            Ok(envelope) => match envelope.body {
                InboundMsg::NewOrder(req) => self.handle_new_order(peer, &envelope.header, req),
                InboundMsg::Cancel(req) => self.handle_cancel(peer, &envelope.header, req),
            },
            Err(e) => {
                warn!(
                    "decode failed peer={} field={} reason={}",
                    peer,
                    e.field().unwrap_or("-"),
                    e
                );
                let ctx = codec::reject_context(payload);
                self.send_reject(
                    peer,
                    &ctx.header,
                    ctx.client_order_id,
                    ctx.symbol,
                    e.reason(),
                    e.code(),
                )
            }
        }
    }

    /// Rejects `payload` without processing it, used when the ingress queue is full.
    pub fn reject_busy(&self, peer: &PeerAddr, payload: &str) -> Disposition {
        let ctx = codec::reject_context(payload);
        self.send_reject(
            peer,
            &ctx.header,
            ctx.client_order_id,
            ctx.symbol,
            "Gateway Busy".into(),
            reject_code::GATEWAY_BUSY,
        )
    }

    /// Execution report from the matching side, addressed to the order's originating session.
    /// `seq` is the matching side's report sequence, carried in the header for correlation.
    pub fn send_fill(&self, origin: &PeerAddr, client_id: u32, seq: u64, fill: Fill) -> bool {
        let header = Header::new(MsgType::Fill, seq, client_id);
        self.send(origin, EnvelopeOut::reply(&header, OutboundMsg::Fill(fill)))
    }

    fn handle_new_order(&self, peer: &PeerAddr, header: &Header, req: NewOrderRequest) -> Disposition {
        if let Err(e) = validate_new_order(&req) {
            info!(
                "order rejected peer={} client_order_id={} code={} reason={}",
                peer,
                req.client_order_id,
                e.code(),
                e
            );
            return self.send_reject(peer, header, req.client_order_id, req.symbol, e.to_string(), e.code());
        }

        let order_id = self.ids.next();
        let order = Order {
            order_id,
            client_order_id: req.client_order_id,
            client_id: header.client_id,
            origin: peer.clone(),
            symbol: req.symbol,
            side: req.side,
            order_type: req.ord_type,
            time_in_force: req.tif,
            price: match req.ord_type {
                OrderType::Limit => req.limit_price,
                OrderType::Market => 0,
            },
            quantity: req.qty,
            timestamp: now_nanos(),
        };

        self.send(
            peer,
            EnvelopeOut::reply(
                header,
                OutboundMsg::Ack(Ack {
                    client_order_id: order.client_order_id,
                    order_id,
                    symbol: order.symbol.clone(),
                }),
            ),
        );
        debug!(
            "order accepted order_id={} client_order_id={} symbol={} side={:?} quantity={} price={}",
            order_id.0, order.client_order_id, order.symbol, order.side, order.quantity, order.price
        );
        self.boundary.submit_order(order);
        Disposition::Acked { order_id }
    }

    fn handle_cancel(&self, peer: &PeerAddr, header: &Header, req: CancelRequest) -> Disposition {
        if let Err(e) = validate_cancel(&req) {
            return self.send_reject(
                peer,
                header,
                req.client_order_id.unwrap_or(0),
                req.symbol,
                e.to_string(),
                e.code(),
            );
        }
        debug!(
            "cancel forwarded peer={} order_id={:?} client_order_id={:?} symbol={}",
            peer, req.order_id, req.client_order_id, req.symbol
        );
        self.boundary.cancel_order(CancelOrder {
            order_id: req.order_id,
            client_order_id: req.client_order_id,
            symbol: req.symbol,
            client_id: header.client_id,
            origin: peer.clone(),
        });
        Disposition::CancelForwarded
    }

    fn send_reject(
        &self,
        peer: &PeerAddr,
        header: &Header,
        client_order_id: u64,
        symbol: String,
        reason: String,
        code: u16,
    ) -> Disposition {
        self.send(
            peer,
            EnvelopeOut::reply(
                header,
                OutboundMsg::Reject(Reject {
                    client_order_id,
                    symbol,
                    reason,
                    code,
                }),
            ),
        );
        Disposition::Rejected { code }
    }

    fn send(&self, peer: &PeerAddr, envelope: EnvelopeOut) -> bool {
        let line = codec::encode_envelope(&envelope);
        let delivered = self.replies.send_to(peer, line);
        if !delivered {
            debug!(
                "reply not delivered peer={} type={}",
                peer,
                envelope.header.msg_type.code()
            );
        }
        delivered
    }
}

/// Semantic checks on a decoded new order.
pub fn validate_new_order(req: &NewOrderRequest) -> Result<(), ValidationError> {
    if req.qty <= 0 {
        return Err(ValidationError::InvalidQuantity(req.qty));
    }
    if req.symbol.trim().is_empty() {
        return Err(ValidationError::InvalidSymbol);
    }
    if req.ord_type == OrderType::Limit && req.limit_price <= 0 {
        return Err(ValidationError::InvalidPrice(req.limit_price));
    }
    Ok(())
}

pub fn validate_cancel(req: &CancelRequest) -> Result<(), ValidationError> {
    if req.order_id.is_none() && req.client_order_id.is_none() {
        return Err(ValidationError::MissingCancelTarget);
    }
    if req.symbol.trim().is_empty() {
        return Err(ValidationError::InvalidSymbol);
    }
    Ok(())
}
