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

//! Collaborator contracts supplied by the host: transport resolution and channels.

use crate::error::TransportError;
use crate::frame::{InboundFrame, OutboundFrame};
use async_trait::async_trait;
use std::sync::Arc;

/// Protocol name used when opening channels and when registering with a host.
pub const REACTIVE_STREAM_PROTOCOL: &str = "reactive-stream";

/// A bound, single-use logical pipe to one target service for one protocol.
///
/// A channel is owned by exactly one subscription protocol, which is the only writer and
/// the only party allowed to close it.
#[async_trait]
pub trait Channel: Send {
    fn target_service(&self) -> &str;

    fn protocol(&self) -> &str;

    async fn send(&mut self, frame: OutboundFrame) -> Result<(), TransportError>;

    /// Waits for the next inbound frame. `None` means the channel has ended.
    ///
    /// Must be cancel safe: the protocol polls it inside `tokio::select!` and drops the
    /// future when cancellation wins.
    async fn receive(&mut self) -> Option<InboundFrame>;

    async fn close(&mut self);
}

/// Connection-management facility able to open channels to named services.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open_channel(
        &self,
        target_service: &str,
        protocol: &str,
    ) -> Result<Box<dyn Channel>, TransportError>;
}

/// Eventual access to the host's transport.
#[async_trait]
pub trait TransportResolver: Send + Sync {
    async fn get_transport(&self) -> Result<Arc<dyn Transport>, TransportError>;
}

/// Resolver for hosts whose transport is already available.
#[derive(Clone)]
pub struct ReadyTransport(Arc<dyn Transport>);

impl ReadyTransport {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self(transport)
    }
}

#[async_trait]
impl TransportResolver for ReadyTransport {
    async fn get_transport(&self) -> Result<Arc<dyn Transport>, TransportError> {
        Ok(self.0.clone())
    }
}
