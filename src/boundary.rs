//! Matching boundary: the narrow interface validated orders and cancels are forwarded to.
//!
//! The order book itself lives outside this crate. [`OrderQueueBoundary`] hands
//! commands to it over an outbound processing queue; [`RecordingBoundary`] keeps them
//! in memory for tests.

use crate::queue::IngressQueue;
use crate::types::{Order, OrderId, PeerAddr};
use log::warn;
use std::sync::{Arc, Mutex, PoisonError};

/// Cancel forwarded to the matching component. Resolution of the target order
/// (venue id vs. client id when both are present) is decided there.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CancelOrder {
    pub order_id: Option<OrderId>,
    pub client_order_id: Option<u64>,
    pub symbol: String,
    pub client_id: u32,
    pub origin: PeerAddr,
}

/// Order-processing component the gateway forwards into.
///
/// Called from worker tasks and session tasks concurrently; implementations must
/// not block for long.
pub trait MatchingBoundary: Send + Sync {
    fn submit_order(&self, order: Order);
    fn cancel_order(&self, cancel: CancelOrder);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DownstreamCommand {
    Submit(Order),
    Cancel(CancelOrder),
}

/// Forwards commands onto an unbounded outbound processing queue.
pub struct OrderQueueBoundary {
    queue: Arc<IngressQueue<DownstreamCommand>>,
}

impl OrderQueueBoundary {
    /// Returns the boundary and the queue the matching component should drain.
    pub fn new() -> (Self, Arc<IngressQueue<DownstreamCommand>>) {
        let queue = Arc::new(IngressQueue::unbounded());
        (
            Self {
                queue: Arc::clone(&queue),
            },
            queue,
        )
    }

    fn forward(&self, command: DownstreamCommand) {
        if let Err(e) = self.queue.try_push(command) {
            warn!("downstream queue refused command: {:?}", e.into_inner());
        }
    }
}

impl MatchingBoundary for OrderQueueBoundary {
    fn submit_order(&self, order: Order) {
        self.forward(DownstreamCommand::Submit(order));
    }

    fn cancel_order(&self, cancel: CancelOrder) {
        self.forward(DownstreamCommand::Cancel(cancel));
    }
}

/// In-memory boundary that records every command, for tests. Clone shares the same buffer.
#[derive(Clone, Default)]
pub struct RecordingBoundary {
    commands: Arc<Mutex<Vec<DownstreamCommand>>>,
}

impl RecordingBoundary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<DownstreamCommand> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn orders(&self) -> Vec<Order> {
        self.commands()
            .into_iter()
            .filter_map(|c| match c {
                DownstreamCommand::Submit(o) => Some(o),
                DownstreamCommand::Cancel(_) => None,
            })
            .collect()
    }

    pub fn cancels(&self) -> Vec<CancelOrder> {
        self.commands()
            .into_iter()
            .filter_map(|c| match c {
                DownstreamCommand::Cancel(c) => Some(c),
                DownstreamCommand::Submit(_) => None,
            })
            .collect()
    }

    fn record(&self, command: DownstreamCommand) {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command);
    }
}

impl MatchingBoundary for RecordingBoundary {
    fn submit_order(&self, order: Order) {
        self.record(DownstreamCommand::Submit(order));
    }

    fn cancel_order(&self, cancel: CancelOrder) {
        self.record(DownstreamCommand::Cancel(cancel));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OrderType, Side, TimeInForce};

    fn order(id: u64) -> Order {
        Order {
            order_id: OrderId(id),
            client_order_id: 10 + id,
            client_id: 1,
            origin: PeerAddr::from("127.0.0.1:1"),
            symbol: "AAPL".into(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Day,
            price: 100,
            quantity: 5,
            timestamp: 1,
        }
    }

    #[tokio::test]
    async fn queue_boundary_forwards_in_order() {
        let (boundary, queue) = OrderQueueBoundary::new();
        boundary.submit_order(order(1));
        boundary.cancel_order(CancelOrder {
            order_id: Some(OrderId(1)),
            client_order_id: None,
            symbol: "AAPL".into(),
            client_id: 1,
            origin: PeerAddr::from("127.0.0.1:1"),
        });
        boundary.submit_order(order(2));
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop().await, Some(DownstreamCommand::Submit(order(1))));
        assert!(matches!(queue.pop().await, Some(DownstreamCommand::Cancel(_))));
        assert_eq!(queue.pop().await, Some(DownstreamCommand::Submit(order(2))));
    }

    #[test]
    fn queue_boundary_survives_closed_queue() {
        let (boundary, queue) = OrderQueueBoundary::new();
        queue.close();
        boundary.submit_order(order(1));
        assert!(queue.is_empty());
    }

    #[test]
    fn recording_boundary_splits_orders_and_cancels() {
        let rec = RecordingBoundary::new();
        let shared = rec.clone();
        rec.submit_order(order(1));
        rec.cancel_order(CancelOrder {
            order_id: None,
            client_order_id: Some(11),
            symbol: "AAPL".into(),
            client_id: 1,
            origin: PeerAddr::from("127.0.0.1:1"),
        });
        assert_eq!(shared.orders(), vec![order(1)]);
        assert_eq!(shared.cancels().len(), 1);
        assert_eq!(shared.commands().len(), 2);
    }
}
