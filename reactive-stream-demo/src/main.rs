/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

mod loopback;

use crate::loopback::{LoopbackTransport, Tick};
use clap::Parser;
use reactive_stream::{
    ProtocolStack, ReadyTransport, ServerStackHost, StreamArgs, SubscriptionService,
    SubscriptionServiceConfig, SubscriptionState,
};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command()]
struct DemoArgs {
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,
    #[arg(short, long, default_value = "proto://ticker/ticks")]
    url: String,
    /// Ticks the ticker serves before completing.
    #[arg(long, default_value_t = 10)]
    count: u64,
    #[arg(long, default_value_t = 100)]
    interval_ms: u64,
    /// Cancel the subscription after this many ticks.
    #[arg(long)]
    cancel_after: Option<u64>,
}

#[derive(Default)]
struct DemoHost {
    stacks: Vec<Arc<dyn ProtocolStack>>,
}

impl ServerStackHost for DemoHost {
    fn add_server_stack(&mut self, stack: Arc<dyn ProtocolStack>) {
        self.stacks.push(stack);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = tracing_subscriber::fmt::try_init();

    let args = DemoArgs::parse();
    let config = match &args.config {
        Some(path) => SubscriptionServiceConfig::load(path)?,
        None => SubscriptionServiceConfig::new("demo-client"),
    };
    info!("Started reactive-stream-demo as {}", config.service_name);

    run_demo(config, &args).await?;
    Ok(())
}

/// Subscribes to the loopback ticker and consumes it until it ends; returns the final
/// state and the number of ticks received.
async fn run_demo(
    config: SubscriptionServiceConfig,
    args: &DemoArgs,
) -> Result<(SubscriptionState, u64), Box<dyn Error>> {
    let transport = Arc::new(LoopbackTransport::new(
        args.count,
        Duration::from_millis(args.interval_ms),
    ));
    let service = Arc::new(SubscriptionService::new(
        config,
        Arc::new(ReadyTransport::new(transport)),
    )?);

    let mut host = DemoHost::default();
    service.register(&mut host);
    for stack in &host.stacks {
        info!("registered protocol stack {}", stack.name());
    }

    let mut params = StreamArgs::new();
    params.insert("count".to_string(), args.count.into());

    let (ticks_tx, mut ticks_rx) = mpsc::unbounded_channel();
    let control = service.subscribe(
        &args.url,
        params,
        move |data| match data.decode::<Tick>() {
            Ok(tick) => {
                let _ = ticks_tx.send(tick);
            }
            Err(e) => warn!("undecodable tick: {e}"),
        },
        |err| error!("subscription failed: {err}"),
        || info!("stream complete"),
    );

    let mut received = 0u64;
    while let Some(tick) = ticks_rx.recv().await {
        received += 1;
        info!("tick {}", tick.seq);
        if args.cancel_after == Some(received) {
            info!("cancelling after {received} ticks");
            control.cancel();
            break;
        }
        // Replace the consumed tick so a bounded prefetch keeps the ticker going.
        control.request(1);
    }

    let outcome = control.finished().await;
    info!(
        "subscription {} finished: {outcome}, {received} ticks",
        control.subscription_id()
    );
    Ok((outcome, received))
}

#[cfg(test)]
mod tests {
    use super::{run_demo, DemoArgs};
    use reactive_stream::{SubscriptionServiceConfig, SubscriptionState};
    use std::time::Duration;

    const SHIPPED_CONFIG: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/config/demo.json5");

    fn args(count: u64, cancel_after: Option<u64>) -> DemoArgs {
        DemoArgs {
            config: Some(SHIPPED_CONFIG.to_string()),
            url: "proto://ticker/ticks".to_string(),
            count,
            interval_ms: 1,
            cancel_after,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn shipped_config_consumes_more_ticks_than_its_prefetch() {
        let config = SubscriptionServiceConfig::load(SHIPPED_CONFIG).unwrap();
        let count = config.prefetch.unwrap_or(1) * 3;

        let (outcome, received) =
            tokio::time::timeout(Duration::from_secs(10), run_demo(config, &args(count, None)))
                .await
                .expect("demo should finish")
                .unwrap();

        assert_eq!(outcome, SubscriptionState::Completed);
        assert_eq!(received, count);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancel_after_stops_the_stream() {
        let config = SubscriptionServiceConfig::load(SHIPPED_CONFIG).unwrap();

        let (outcome, received) =
            tokio::time::timeout(Duration::from_secs(10), run_demo(config, &args(10, Some(3))))
                .await
                .expect("demo should finish")
                .unwrap();

        assert_eq!(outcome, SubscriptionState::Cancelled);
        assert_eq!(received, 3);
    }
}
