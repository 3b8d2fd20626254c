//! Gateway settings, read from `GATEWAY_*` environment variables.

use crate::gateway::DispatchMode;
use crate::queue::BackpressurePolicy;
use log::warn;
use std::str::FromStr;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:5555";
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Address the acceptor binds; port 0 picks a free one.
    pub listen_addr: String,
    pub mode: DispatchMode,
    /// Decode workers in [`DispatchMode::Pooled`].
    pub workers: usize,
    pub queue_capacity: usize,
    pub backpressure: BackpressurePolicy,
    /// Venue order ids start at `id_offset + 1`.
    pub id_offset: u64,
    /// Longest accepted line; a longer one closes the session.
    pub max_line_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            mode: DispatchMode::Pooled,
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            backpressure: BackpressurePolicy::Block,
            id_offset: 0,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

impl GatewayConfig {
    /// Defaults overridden by whatever `GATEWAY_*` variables are set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    /// Unparsable values are logged and the default is kept.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        Self {
            listen_addr: lookup("GATEWAY_LISTEN_ADDR")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(d.listen_addr),
            mode: parse_or(&lookup, "GATEWAY_MODE", d.mode),
            workers: parse_or(&lookup, "GATEWAY_WORKERS", d.workers).max(1),
            queue_capacity: parse_or(&lookup, "GATEWAY_QUEUE_CAPACITY", d.queue_capacity).max(1),
            backpressure: parse_or(&lookup, "GATEWAY_BACKPRESSURE", d.backpressure),
            id_offset: parse_or(&lookup, "GATEWAY_ID_OFFSET", d.id_offset),
            max_line_bytes: parse_or(&lookup, "GATEWAY_MAX_LINE_BYTES", d.max_line_bytes).max(1),
        }
    }

    pub fn with_listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = addr.into();
        self
    }

    pub fn with_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_queue(mut self, capacity: usize, backpressure: BackpressurePolicy) -> Self {
        self.queue_capacity = capacity.max(1);
        self.backpressure = backpressure;
        self
    }

    pub fn with_id_offset(mut self, offset: u64) -> Self {
        self.id_offset = offset;
        self
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                warn!("ignoring {}={:?}: not a valid value", key, raw);
                default
            }
        },
    }
}
