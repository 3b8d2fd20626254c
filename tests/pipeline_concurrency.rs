//! Queue + worker pool + router under concurrent producers, without sockets.
//!
//! Asserts no lost or duplicated replies, no misrouted replies, and unique venue ids.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use venue_gateway::{
    codec, BackpressurePolicy, DecodeWorkerPool, ExpectedTally, IdGenerator, InMemoryReplySink,
    InboundPayload, IngressQueue, OutboundMsg, PayloadGenerator, PayloadGeneratorConfig, PeerAddr,
    RecordingBoundary, RequestRouter, Shutdown,
};

const PRODUCERS: usize = 8;
const WORKERS: usize = 8;
const PER_PRODUCER: usize = 1250;

fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn ten_thousand_payloads_eight_producers_eight_workers() {
    init_log();
    let replies = InMemoryReplySink::new();
    let boundary = RecordingBoundary::new();
    let ids = Arc::new(IdGenerator::new(1_000));
    let router = Arc::new(RequestRouter::new(
        Arc::clone(&ids),
        Arc::new(boundary.clone()),
        Arc::new(replies.clone()),
    ));
    // Small capacity so producers actually block on a full queue.
    let queue = Arc::new(IngressQueue::new(64, BackpressurePolicy::Block));
    let shutdown = Shutdown::new();
    let pool = DecodeWorkerPool::spawn(WORKERS, Arc::clone(&queue), router, shutdown.signal());

    let mut expected_per_peer = HashMap::new();
    let mut total = ExpectedTally::default();
    let mut producers = Vec::new();
    for p in 0..PRODUCERS {
        let payloads = PayloadGenerator::new(PayloadGeneratorConfig {
            seed: p as u64,
            num_messages: PER_PRODUCER,
            client_id: p as u32,
            ..Default::default()
        })
        .all_payloads();
        let tally = ExpectedTally::of(&payloads);
        total.acks += tally.acks;
        total.rejects += tally.rejects;
        total.silent += tally.silent;
        let peer = PeerAddr(format!("10.0.0.{}:4000", p));
        expected_per_peer.insert(peer.clone(), tally.replies());

        let queue = Arc::clone(&queue);
        producers.push(tokio::spawn(async move {
            for payload in payloads {
                queue
                    .push(InboundPayload::new(peer.clone(), payload.text))
                    .await
                    .unwrap();
            }
        }));
    }
    for p in producers {
        p.await.unwrap();
    }
    queue.close();
    let processed = tokio::time::timeout(Duration::from_secs(30), pool.join())
        .await
        .expect("workers drain the queue");
    assert_eq!(processed as usize, PRODUCERS * PER_PRODUCER);

    let sent = replies.sent();
    assert_eq!(sent.len(), total.replies());

    let mut per_peer: HashMap<PeerAddr, usize> = HashMap::new();
    let mut acked_ids = HashSet::new();
    for (peer, line) in &sent {
        *per_peer.entry(peer.clone()).or_default() += 1;
        let env = codec::decode_outbound(line).unwrap();
        if let OutboundMsg::Ack(ack) = env.body {
            // client_id travels in the header and identifies the producer.
            assert_eq!(PeerAddr(format!("10.0.0.{}:4000", env.header.client_id)), *peer);
            assert!(acked_ids.insert(ack.order_id), "duplicate id {:?}", ack.order_id);
        }
    }
    assert_eq!(per_peer, expected_per_peer);
    assert_eq!(acked_ids.len(), total.acks);

    let orders = boundary.orders();
    assert_eq!(orders.len(), total.acks);
    assert_eq!(boundary.cancels().len(), total.silent);
    let order_ids: HashSet<_> = orders.iter().map(|o| o.order_id).collect();
    assert_eq!(order_ids, acked_ids);
    assert!(order_ids.iter().all(|id| id.0 > 1_000 && id.0 <= 1_000 + total.acks as u64));
    assert_eq!(ids.last_issued(), 1_000 + total.acks as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reject_policy_never_blocks_producers() {
    init_log();
    let queue: IngressQueue<InboundPayload> = IngressQueue::new(10, BackpressurePolicy::Reject);
    let peer = PeerAddr::from("10.0.0.1:1");
    let mut accepted = 0;
    let mut refused = 0;
    for i in 0..100 {
        match queue.push(InboundPayload::new(peer.clone(), i.to_string())).await {
            Ok(()) => accepted += 1,
            Err(e) => {
                assert!(e.is_full());
                refused += 1;
            }
        }
    }
    assert_eq!(accepted, 10);
    assert_eq!(refused, 90);
}
