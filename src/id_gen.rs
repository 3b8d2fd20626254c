//! Venue order id service.

use crate::types::OrderId;
use std::sync::atomic::{AtomicU64, Ordering};

/// Issues strictly increasing order ids starting at `offset + 1`.
///
/// Shared by handle (`Arc<IdGenerator>`) between the router and every worker. The
/// counter is the only mutable state the gateway shares across tasks.
#[derive(Debug, Default)]
pub struct IdGenerator {
    current: AtomicU64,
}

impl IdGenerator {
    pub fn new(offset: u64) -> Self {
        Self {
            current: AtomicU64::new(offset),
        }
    }

    /// Next id. Never repeats and never goes backwards within the process lifetime.
    pub fn next(&self) -> OrderId {
        OrderId(self.current.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Most recently issued id, or the offset if none has been issued.
    pub fn last_issued(&self) -> u64 {
        self.current.load(Ordering::Relaxed)
    }
}
