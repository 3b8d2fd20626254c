//! Synthetic request stream for load tests, benches and the `gateway_loadgen` binary.
//!
//! Deterministic: the same config (including seed) gives the same sequence of payloads. Every
//! payload is tagged with the response the gateway must produce for it.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

use crate::messages::reject_code;

/// Response the gateway owes a generated payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Expect {
    Ack,
    Reject(u16),
    /// Cancels are forwarded without an immediate reply.
    NoReply,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedPayload {
    pub seq: u64,
    pub client_order_id: u64,
    pub text: String,
    pub expect: Expect,
}

/// All ranges are inclusive. Ratios are probabilities in 0.0..=1.0; cancel, invalid
/// and malformed are drawn in that order, new orders take the remainder.
#[derive(Clone, Debug)]
pub struct PayloadGeneratorConfig {
    pub seed: u64,
    pub num_messages: usize,
    pub client_id: u32,
    pub symbols: Vec<String>,
    pub buy_ratio: f64,
    pub limit_ratio: f64,
    pub price_min: i64,
    pub price_max: i64,
    pub quantity_min: i64,
    pub quantity_max: i64,
    pub ioc_ratio: f64,
    pub cancel_ratio: f64,
    /// Decodable but semantically invalid (bad quantity or limit price).
    pub invalid_ratio: f64,
    /// Undecodable payloads.
    pub malformed_ratio: f64,
}

impl Default for PayloadGeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            num_messages: 1000,
            client_id: 1,
            symbols: vec!["AAPL".into(), "MSFT".into(), "TSLA".into()],
            buy_ratio: 0.5,
            limit_ratio: 0.8,
            price_min: 9_500,
            price_max: 10_500,
            quantity_min: 1,
            quantity_max: 500,
            ioc_ratio: 0.1,
            cancel_ratio: 0.05,
            invalid_ratio: 0.05,
            malformed_ratio: 0.05,
        }
    }
}

pub struct PayloadGenerator {
    rng: StdRng,
    config: PayloadGeneratorConfig,
    next_seq: u64,
}

impl PayloadGenerator {
    pub fn new(config: PayloadGeneratorConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            next_seq: 1,
        }
    }

    pub fn next_payload(&mut self) -> GeneratedPayload {
        let seq = self.next_seq;
        self.next_seq += 1;
        let client_order_id = seq;
        let header = json!({"version": 1, "type": 1, "seq": seq, "client_id": self.config.client_id});

        let r = self.rng.gen::<f64>();
        let cancel_to = self.config.cancel_ratio;
        let invalid_to = cancel_to + self.config.invalid_ratio;
        let malformed_to = invalid_to + self.config.malformed_ratio;
        let (text, expect) = if r < cancel_to {
            self.cancel(seq, client_order_id)
        } else if r < invalid_to {
            self.invalid_order(header, client_order_id)
        } else if r < malformed_to {
            self.malformed(header, client_order_id)
        } else {
            let body = self.order_body(client_order_id);
            (json!({"header": header, "body": body}).to_string(), Expect::Ack)
        };

        GeneratedPayload {
            seq,
            client_order_id,
            text,
            expect,
        }
    }

    pub fn take_payloads(&mut self, n: usize) -> Vec<GeneratedPayload> {
        (0..n).map(|_| self.next_payload()).collect()
    }

    pub fn all_payloads(&mut self) -> Vec<GeneratedPayload> {
        self.take_payloads(self.config.num_messages)
    }

    fn symbol(&mut self) -> String {
        if self.config.symbols.is_empty() {
            return "AAPL".into();
        }
        let i = self.rng.gen_range(0..self.config.symbols.len());
        self.config.symbols[i].clone()
    }

    /// Valid new-order body using a random mix of the accepted spellings.
    fn order_body(&mut self, client_order_id: u64) -> Value {
        let buy = self.rng.gen::<f64>() < self.config.buy_ratio;
        let side = pick(&mut self.rng, if buy { &["B", "buy", "BUY"] } else { &["S", "sell", "Sell"] });
        let limit = self.rng.gen::<f64>() < self.config.limit_ratio;
        let ord_type = pick(&mut self.rng, if limit { &["LMT", "limit"] } else { &["MKT", "market"] });
        let qty = self
            .rng
            .gen_range(self.config.quantity_min.max(1)..=self.config.quantity_max.max(1));
        let symbol = self.symbol();
        let mut body = json!({
            "client_order_id": client_order_id,
            "symbol": symbol,
            "side": side,
            "ord_type": ord_type,
            "qty": qty,
        });
        if limit {
            let price = self
                .rng
                .gen_range(self.config.price_min.max(1)..=self.config.price_max.max(1));
            let key = if self.rng.gen_bool(0.5) { "limit_price" } else { "price" };
            body[key] = json!(price);
        }
        if self.rng.gen::<f64>() < self.config.ioc_ratio {
            body["tif"] = json!("IOC");
        }
        body
    }

    fn cancel(&mut self, seq: u64, client_order_id: u64) -> (String, Expect) {
        let symbol = self.symbol();
        let target = self.rng.gen_range(1..=seq);
        let text = json!({
            "header": {"version": 1, "type": 2, "seq": seq, "client_id": self.config.client_id},
            "body": {"order_id": target, "client_order_id": client_order_id, "symbol": symbol},
        })
        .to_string();
        (text, Expect::NoReply)
    }

    fn invalid_order(&mut self, header: Value, client_order_id: u64) -> (String, Expect) {
        let mut body = self.order_body(client_order_id);
        let expect = if self.rng.gen_bool(0.5) {
            body["qty"] = json!(-self.rng.gen_range(0..=10i64));
            Expect::Reject(reject_code::INVALID_QUANTITY)
        } else {
            body["ord_type"] = json!("LMT");
            if let Some(obj) = body.as_object_mut() {
                obj.remove("price");
            }
            body["limit_price"] = json!(0);
            Expect::Reject(reject_code::INVALID_PRICE)
        };
        (json!({"header": header, "body": body}).to_string(), expect)
    }

    fn malformed(&mut self, header: Value, client_order_id: u64) -> (String, Expect) {
        let text = match self.rng.gen_range(0..4) {
            0 => {
                // Truncated mid-object.
                let full = json!({"header": header, "body": {"client_order_id": client_order_id}}).to_string();
                full[..full.len() / 2].to_string()
            }
            1 => json!({"header": header}).to_string(),
            2 => {
                let mut h = header;
                h["type"] = json!(900);
                json!({"header": h, "body": {}}).to_string()
            }
            _ => {
                let mut body = self.order_body(client_order_id);
                if let Some(obj) = body.as_object_mut() {
                    obj.remove("symbol");
                }
                json!({"header": header, "body": body}).to_string()
            }
        };
        (text, Expect::Reject(reject_code::MALFORMED))
    }
}

fn pick(rng: &mut StdRng, options: &[&'static str]) -> &'static str {
    options[rng.gen_range(0..options.len())]
}

/// Counts of the responses a batch of payloads must produce.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExpectedTally {
    pub acks: usize,
    pub rejects: usize,
    pub silent: usize,
}

impl ExpectedTally {
    pub fn of(payloads: &[GeneratedPayload]) -> Self {
        payloads.iter().fold(Self::default(), |mut t, p| {
            match p.expect {
                Expect::Ack => t.acks += 1,
                Expect::Reject(_) => t.rejects += 1,
                Expect::NoReply => t.silent += 1,
            }
            t
        })
    }

    /// Replies the gateway will send for the batch.
    pub fn replies(&self) -> usize {
        self.acks + self.rejects
    }
}
