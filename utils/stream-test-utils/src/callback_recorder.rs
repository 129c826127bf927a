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
use reactive_stream::{StreamData, SubscriptionError};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

#[derive(Clone, Debug, PartialEq)]
pub enum RecordedEvent {
    Data(StreamData),
    Error(SubscriptionError),
    Complete,
}

/// Records every callback of one subscription in arrival order.
#[derive(Clone)]
pub struct CallbackRecorder {
    name: String,
    events: Arc<watch::Sender<Vec<RecordedEvent>>>,
}

impl CallbackRecorder {
    pub fn new(name: &str) -> Self {
        let (events, _) = watch::channel(Vec::new());
        Self {
            name: name.to_string(),
            events: Arc::new(events),
        }
    }

    fn record(&self, event: RecordedEvent) {
        debug!("{}: recorded {:?}", self.name, event);
        self.events.send_modify(|events| events.push(event));
    }

    pub fn on_data(&self) -> impl FnMut(StreamData) + Send + 'static {
        let recorder = self.clone();
        move |data| recorder.record(RecordedEvent::Data(data))
    }

    pub fn on_error(&self) -> impl FnOnce(SubscriptionError) + Send + 'static {
        let recorder = self.clone();
        move |err| recorder.record(RecordedEvent::Error(err))
    }

    pub fn on_complete(&self) -> impl FnOnce() + Send + 'static {
        let recorder = self.clone();
        move || recorder.record(RecordedEvent::Complete)
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.borrow().clone()
    }

    pub fn data_payloads(&self) -> Vec<Vec<u8>> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                RecordedEvent::Data(data) => Some(data.payload.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<SubscriptionError> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                RecordedEvent::Error(err) => Some(err.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn completions(&self) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| matches!(event, RecordedEvent::Complete))
            .count()
    }

    /// Waits until at least `count` callbacks have been recorded.
    pub async fn wait_for_events(&self, count: usize) {
        let mut events = self.events.subscribe();
        within_timeout("recorded callbacks", async move {
            let _ = events.wait_for(|events| events.len() >= count).await;
        })
        .await;
    }
}
