//! Gateway server. Configuration comes from `GATEWAY_*` environment variables; see
//! [`GatewayConfig::from_env`]. Accepted orders are drained from the outbound queue
//! and logged until a matching component is attached.

use log::{error, info};
use std::sync::Arc;
use venue_gateway::{DownstreamCommand, Gateway, GatewayConfig, OrderQueueBoundary};

#[tokio::main]
async fn main() {
    let _ = env_logger::try_init();
    let config = GatewayConfig::from_env();

    let (boundary, downstream) = OrderQueueBoundary::new();
    let consumer = {
        let downstream = Arc::clone(&downstream);
        tokio::spawn(async move {
            while let Some(command) = downstream.pop().await {
                match command {
                    DownstreamCommand::Submit(order) => info!(
                        "order order_id={} client_order_id={} origin={} symbol={} side={:?} type={:?} tif={:?} qty={} price={}",
                        order.order_id.0,
                        order.client_order_id,
                        order.origin,
                        order.symbol,
                        order.side,
                        order.order_type,
                        order.time_in_force,
                        order.quantity,
                        order.price
                    ),
                    DownstreamCommand::Cancel(cancel) => info!(
                        "cancel order_id={:?} client_order_id={:?} origin={} symbol={}",
                        cancel.order_id.map(|id| id.0),
                        cancel.client_order_id,
                        cancel.origin,
                        cancel.symbol
                    ),
                }
            }
        })
    };

    let gateway = match Gateway::new(config, Arc::new(boundary)).start().await {
        Ok(g) => g,
        Err(e) => {
            error!("startup failed: {}", e);
            std::process::exit(1);
        }
    };
    eprintln!("listening on tcp://{}", gateway.local_addr());

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("signal handler failed: {}", e);
    }
    info!("shutting down sessions={} queued={}", gateway.session_count(), gateway.queued());
    gateway.stop().await;
    downstream.close();
    let _ = consumer.await;
}
