//! Drives a running gateway with a synthetic payload stream and tallies the replies.
//!
//! Usage: `gateway_loadgen [addr] [messages] [seed]` (defaults `127.0.0.1:5555 10000 0`).

use log::{error, info, warn};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use venue_gateway::{codec, ExpectedTally, OutboundMsg, PayloadGenerator, PayloadGeneratorConfig};

#[derive(Debug, Default)]
struct Received {
    acks: usize,
    rejects: usize,
    fills: usize,
    undecodable: usize,
}

impl Received {
    fn total(&self) -> usize {
        self.acks + self.rejects + self.fills + self.undecodable
    }
}

#[tokio::main]
async fn main() {
    let _ = env_logger::try_init();
    let mut args = std::env::args().skip(1);
    let addr = args.next().unwrap_or_else(|| "127.0.0.1:5555".to_string());
    let messages: usize = args.next().and_then(|s| s.parse().ok()).unwrap_or(10_000);
    let seed: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(0);

    let payloads = PayloadGenerator::new(PayloadGeneratorConfig {
        seed,
        num_messages: messages,
        ..Default::default()
    })
    .all_payloads();
    let expected = ExpectedTally::of(&payloads);

    let stream = match TcpStream::connect(&addr).await {
        Ok(s) => s,
        Err(e) => {
            error!("connect failed addr={} error={}", addr, e);
            std::process::exit(1);
        }
    };
    let (read_half, mut write_half) = stream.into_split();
    let want = expected.replies();

    let reader = tokio::spawn(async move {
        let mut received = Received::default();
        let mut lines = BufReader::new(read_half).lines();
        while received.total() < want {
            match lines.next_line().await {
                Ok(Some(line)) => match codec::decode_outbound(&line) {
                    Ok(env) => match env.body {
                        OutboundMsg::Ack(_) => received.acks += 1,
                        OutboundMsg::Reject(_) => received.rejects += 1,
                        OutboundMsg::Fill(_) => received.fills += 1,
                    },
                    Err(e) => {
                        warn!("undecodable reply: {}", e);
                        received.undecodable += 1;
                    }
                },
                Ok(None) => break,
                Err(e) => {
                    warn!("read error: {}", e);
                    break;
                }
            }
        }
        received
    });

    let started = Instant::now();
    for p in &payloads {
        let mut line = p.text.clone();
        line.push('\n');
        if let Err(e) = write_half.write_all(line.as_bytes()).await {
            error!("write failed after seq={} error={}", p.seq, e);
            break;
        }
    }
    let sent_in = started.elapsed();

    let received = match tokio::time::timeout(Duration::from_secs(30), reader).await {
        Ok(Ok(r)) => r,
        Ok(Err(e)) => {
            error!("reader task failed: {}", e);
            std::process::exit(1);
        }
        Err(_) => {
            error!("timed out waiting for {} replies", want);
            std::process::exit(1);
        }
    };
    let elapsed = started.elapsed();

    info!(
        "sent={} send_time_ms={} round_trip_ms={} acks={}/{} rejects={}/{} cancels_forwarded={} undecodable={}",
        payloads.len(),
        sent_in.as_millis(),
        elapsed.as_millis(),
        received.acks,
        expected.acks,
        received.rejects,
        expected.rejects,
        expected.silent,
        received.undecodable
    );
    println!(
        "{} msgs in {:?} ({:.0} msg/s): acks {}/{} rejects {}/{}",
        payloads.len(),
        elapsed,
        payloads.len() as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
        received.acks,
        expected.acks,
        received.rejects,
        expected.rejects
    );
    if received.acks != expected.acks || received.rejects != expected.rejects {
        std::process::exit(2);
    }
}
