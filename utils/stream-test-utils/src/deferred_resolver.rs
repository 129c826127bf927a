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

use async_trait::async_trait;
use reactive_stream::{Transport, TransportError, TransportErrorKind, TransportResolver};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

type Outcome = Option<Result<Arc<dyn Transport>, TransportError>>;

/// Transport resolver that stays pending until the test resolves or rejects it.
pub struct DeferredResolver {
    outcome: watch::Sender<Outcome>,
    calls: AtomicUsize,
}

impl DeferredResolver {
    pub fn new() -> Self {
        let (outcome, _) = watch::channel(None);
        Self {
            outcome,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn resolve(&self, transport: Arc<dyn Transport>) {
        self.outcome.send_replace(Some(Ok(transport)));
    }

    pub fn reject(&self, err: TransportError) {
        self.outcome.send_replace(Some(Err(err)));
    }

    /// Number of `get_transport` calls observed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for DeferredResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransportResolver for DeferredResolver {
    async fn get_transport(&self) -> Result<Arc<dyn Transport>, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut outcome = self.outcome.subscribe();
        let settled = match outcome.wait_for(Option::is_some).await {
            Ok(settled) => settled.clone(),
            Err(_) => None,
        };
        settled.unwrap_or_else(|| {
            Err(TransportError::new(
                TransportErrorKind::Unavailable,
                "resolver dropped before settling",
            ))
        })
    }
}
