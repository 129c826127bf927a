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

use crate::within_timeout;
use async_trait::async_trait;
use reactive_stream::{
    Channel, InboundFrame, OutboundFrame, StreamData, Transport, TransportError,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tracing::debug;

/// Everything a subscription did to one mock channel.
#[derive(Clone, Debug, Default)]
pub struct ChannelLog {
    pub sent: Vec<OutboundFrame>,
    pub closes: usize,
}

/// Test-side end of a [`MockTransport`] channel.
#[derive(Clone)]
pub struct ChannelHandle {
    target_service: String,
    protocol: String,
    inbound: Arc<Mutex<Option<mpsc::UnboundedSender<InboundFrame>>>>,
    log: Arc<watch::Sender<ChannelLog>>,
}

impl ChannelHandle {
    pub fn target_service(&self) -> &str {
        &self.target_service
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Queues a frame for the subscription. Frames pushed after [`Self::end`] are dropped.
    pub fn push(&self, frame: InboundFrame) {
        let inbound = self.inbound.lock().unwrap();
        match inbound.as_ref() {
            Some(sender) => {
                if sender.send(frame).is_err() {
                    debug!("{}: receiver gone, frame dropped", self.target_service);
                }
            }
            None => debug!("{}: channel ended, frame dropped", self.target_service),
        }
    }

    pub fn push_data(&self, payload: &str) {
        self.push(InboundFrame::Data(StreamData::new(
            "text/plain",
            payload.as_bytes().to_vec(),
        )));
    }

    /// Ends the inbound side; the subscription then reads end-of-channel.
    pub fn end(&self) {
        self.inbound.lock().unwrap().take();
    }

    pub fn sent(&self) -> Vec<OutboundFrame> {
        self.log.borrow().sent.clone()
    }

    pub fn close_count(&self) -> usize {
        self.log.borrow().closes
    }

    pub async fn wait_for_sent(&self, count: usize) -> Vec<OutboundFrame> {
        let mut log = self.log.subscribe();
        within_timeout("outbound frames", async move {
            let _ = log.wait_for(|log| log.sent.len() >= count).await;
        })
        .await;
        self.sent()
    }

    pub async fn wait_for_close(&self) {
        let mut log = self.log.subscribe();
        within_timeout("channel close", async move {
            let _ = log.wait_for(|log| log.closes > 0).await;
        })
        .await;
    }
}

struct MockChannel {
    target_service: String,
    protocol: String,
    inbound: mpsc::UnboundedReceiver<InboundFrame>,
    log: Arc<watch::Sender<ChannelLog>>,
}

#[async_trait]
impl Channel for MockChannel {
    fn target_service(&self) -> &str {
        &self.target_service
    }

    fn protocol(&self) -> &str {
        &self.protocol
    }

    async fn send(&mut self, frame: OutboundFrame) -> Result<(), TransportError> {
        debug!("{}: sent {:?}", self.target_service, frame);
        self.log.send_modify(|log| log.sent.push(frame));
        Ok(())
    }

    async fn receive(&mut self) -> Option<InboundFrame> {
        self.inbound.recv().await
    }

    async fn close(&mut self) {
        debug!("{}: closed", self.target_service);
        self.log.send_modify(|log| log.closes += 1);
    }
}

/// In-memory transport handing out scriptable channels.
pub struct MockTransport {
    failures: Mutex<HashMap<String, TransportError>>,
    channels: watch::Sender<Vec<ChannelHandle>>,
    open_gate: watch::Sender<bool>,
    open_attempts: watch::Sender<usize>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        let (channels, _) = watch::channel(Vec::new());
        let (open_gate, _) = watch::channel(true);
        let (open_attempts, _) = watch::channel(0);
        Arc::new(Self {
            failures: Mutex::new(HashMap::new()),
            channels,
            open_gate,
            open_attempts,
        })
    }

    /// Makes later `open_channel` calls wait until [`Self::release_opens`].
    pub fn hold_opens(&self) {
        self.open_gate.send_replace(false);
    }

    pub fn release_opens(&self) {
        self.open_gate.send_replace(true);
    }

    /// Waits until `count` `open_channel` calls have started, held or not.
    pub async fn wait_for_open_attempts(&self, count: usize) {
        let mut attempts = self.open_attempts.subscribe();
        within_timeout("open attempts", async move {
            let _ = attempts.wait_for(|attempts| *attempts >= count).await;
        })
        .await;
    }

    /// Makes every later `open_channel` towards `target_service` fail with `err`.
    pub fn fail_service(&self, target_service: &str, err: TransportError) {
        self.failures
            .lock()
            .unwrap()
            .insert(target_service.to_string(), err);
    }

    pub fn open_count(&self) -> usize {
        self.channels.borrow().len()
    }

    pub fn channel(&self, index: usize) -> Option<ChannelHandle> {
        self.channels.borrow().get(index).cloned()
    }

    /// Waits for the `index`-th successfully opened channel.
    pub async fn wait_for_channel(&self, index: usize) -> ChannelHandle {
        let mut channels = self.channels.subscribe();
        within_timeout("channel open", async move {
            let _ = channels.wait_for(|channels| channels.len() > index).await;
        })
        .await;
        self.channels.borrow()[index].clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open_channel(
        &self,
        target_service: &str,
        protocol: &str,
    ) -> Result<Box<dyn Channel>, TransportError> {
        self.open_attempts.send_modify(|attempts| *attempts += 1);
        let mut open_gate = self.open_gate.subscribe();
        let _ = open_gate.wait_for(|open| *open).await;

        if let Some(err) = self.failures.lock().unwrap().get(target_service) {
            debug!("{target_service}: open rejected: {err}");
            return Err(err.clone());
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let (log, _) = watch::channel(ChannelLog::default());
        let log = Arc::new(log);
        let handle = ChannelHandle {
            target_service: target_service.to_string(),
            protocol: protocol.to_string(),
            inbound: Arc::new(Mutex::new(Some(sender))),
            log: log.clone(),
        };
        self.channels.send_modify(|channels| channels.push(handle));
        debug!("{target_service}: channel opened for {protocol}");

        Ok(Box::new(MockChannel {
            target_service: target_service.to_string(),
            protocol: protocol.to_string(),
            inbound: receiver,
            log,
        }))
    }
}
