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

//! Scripted collaborators for exercising `reactive-stream` subscriptions in tests.

mod callback_recorder;
pub use callback_recorder::{CallbackRecorder, RecordedEvent};
mod deferred_resolver;
pub use deferred_resolver::DeferredResolver;
mod mock_transport;
pub use mock_transport::{ChannelHandle, ChannelLog, MockTransport};

use std::future::Future;
use std::time::Duration;

/// Upper bound for any wait performed by these helpers.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Installs a test-writer `tracing` subscriber honoring `RUST_LOG`; later calls are no-ops.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub(crate) async fn within_timeout<F: Future>(what: &str, future: F) -> F::Output {
    match tokio::time::timeout(WAIT_TIMEOUT, future).await {
        Ok(output) => output,
        Err(_) => panic!("timed out after {WAIT_TIMEOUT:?} waiting for {what}"),
    }
}
