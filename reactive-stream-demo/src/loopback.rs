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

//! In-process transport serving a single `ticker` service.

use async_trait::async_trait;
use reactive_stream::{
    Channel, InboundFrame, OutboundFrame, StreamData, SubscribeRequest, Transport,
    TransportError, TransportErrorKind,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

pub const TICKER_SERVICE: &str = "ticker";
const TICKS_PATH: &str = "/ticks";

#[derive(Debug, Serialize, Deserialize)]
pub struct Tick {
    pub seq: u64,
}

pub struct LoopbackTransport {
    default_count: u64,
    interval: Duration,
}

impl LoopbackTransport {
    pub fn new(default_count: u64, interval: Duration) -> Self {
        Self {
            default_count,
            interval,
        }
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn open_channel(
        &self,
        target_service: &str,
        protocol: &str,
    ) -> Result<Box<dyn Channel>, TransportError> {
        if target_service != TICKER_SERVICE {
            return Err(TransportError::new(
                TransportErrorKind::ServiceNotFound,
                format!("no service named {target_service} on the loopback transport"),
            ));
        }

        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (replies_tx, replies_rx) = mpsc::unbounded_channel();
        let ticker = Ticker {
            replies: replies_tx,
            default_count: self.default_count,
            interval: self.interval,
        };
        tokio::spawn(ticker.serve(requests_rx));

        Ok(Box::new(LoopbackChannel {
            target_service: target_service.to_string(),
            protocol: protocol.to_string(),
            requests: Some(requests_tx),
            replies: replies_rx,
        }))
    }
}

struct LoopbackChannel {
    target_service: String,
    protocol: String,
    requests: Option<UnboundedSender<OutboundFrame>>,
    replies: UnboundedReceiver<InboundFrame>,
}

#[async_trait]
impl Channel for LoopbackChannel {
    fn target_service(&self) -> &str {
        &self.target_service
    }

    fn protocol(&self) -> &str {
        &self.protocol
    }

    async fn send(&mut self, frame: OutboundFrame) -> Result<(), TransportError> {
        let requests = self.requests.as_ref().ok_or_else(|| {
            TransportError::new(TransportErrorKind::ConnectionFailure, "channel closed")
        })?;
        requests.send(frame).map_err(|_| {
            TransportError::new(TransportErrorKind::ConnectionFailure, "ticker stopped")
        })
    }

    async fn receive(&mut self) -> Option<InboundFrame> {
        self.replies.recv().await
    }

    async fn close(&mut self) {
        self.requests.take();
        self.replies.close();
    }
}

/// Server side of one loopback channel.
struct Ticker {
    replies: UnboundedSender<InboundFrame>,
    default_count: u64,
    interval: Duration,
}

impl Ticker {
    async fn serve(self, mut requests: UnboundedReceiver<OutboundFrame>) {
        let mut remaining = 0u64;
        let mut demand = 0u64;
        let mut seq = 0u64;

        loop {
            let frame = if remaining > 0 && demand > 0 {
                tokio::select! {
                    frame = requests.recv() => frame,
                    _ = tokio::time::sleep(self.interval) => {
                        if !self.emit(seq) {
                            break;
                        }
                        seq += 1;
                        remaining -= 1;
                        demand -= 1;
                        if remaining == 0 {
                            let _ = self.replies.send(InboundFrame::Complete);
                        }
                        continue;
                    }
                }
            } else {
                requests.recv().await
            };

            match frame {
                Some(OutboundFrame::Subscribe(request)) => match self.accept(&request) {
                    Some(count) => {
                        remaining = count;
                        let _ = self.replies.send(InboundFrame::Ack);
                        if count == 0 {
                            let _ = self.replies.send(InboundFrame::Complete);
                        }
                    }
                    None => {
                        let _ = self.replies.send(InboundFrame::Nack);
                    }
                },
                Some(OutboundFrame::Request(n)) => demand = demand.saturating_add(n),
                Some(OutboundFrame::Cancel) | None => break,
            }
        }
        debug!("{TICKER_SERVICE}: stopped after {seq} ticks");
    }

    /// Number of ticks to serve, or `None` for an unknown stream.
    fn accept(&self, request: &SubscribeRequest) -> Option<u64> {
        if request.stream_path != TICKS_PATH {
            warn!(
                "{TICKER_SERVICE}: {} asked for unknown stream {}",
                request.source_service, request.stream_path
            );
            return None;
        }
        let count = match request.args.get("count") {
            Some(serde_json::Value::Number(n)) => n.as_u64(),
            Some(serde_json::Value::String(s)) => s.parse().ok(),
            _ => None,
        };
        Some(count.unwrap_or(self.default_count))
    }

    fn emit(&self, seq: u64) -> bool {
        let frame = match StreamData::json(&Tick { seq }) {
            Ok(data) => InboundFrame::Data(data),
            Err(e) => InboundFrame::Error(e.to_string()),
        };
        self.replies.send(frame).is_ok()
    }
}
