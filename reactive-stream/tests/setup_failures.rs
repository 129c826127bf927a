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

mod support;

use async_trait::async_trait;
use reactive_stream::{
    Channel, ReadyTransport, StreamArgs, SubscriptionError, SubscriptionServiceConfig,
    SubscriptionState, Transport, TransportError, TransportErrorKind,
};
use std::sync::Arc;
use std::time::Duration;
use stream_test_utils::{CallbackRecorder, DeferredResolver, MockTransport};

fn single_error(recorder: &CallbackRecorder) -> SubscriptionError {
    let mut errors = recorder.errors();
    assert_eq!(recorder.events().len(), 1, "expected exactly one callback");
    assert_eq!(errors.len(), 1, "expected exactly one error");
    errors.remove(0)
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_url_fails_without_opening_a_channel() {
    stream_test_utils::init_logging();

    let transport = MockTransport::new();
    let service = support::make_service("billing", transport.clone());
    let recorder = CallbackRecorder::new("bad-url");
    let control =
        support::subscribe_recorded(&service, "not a url", StreamArgs::new(), &recorder);

    assert_eq!(control.finished().await, SubscriptionState::Failed);
    let err = single_error(&recorder);
    assert!(matches!(err, SubscriptionError::InvalidUrl { ref url, .. } if url == "not a url"));
    assert!(err.is_setup_error());
    assert_eq!(transport.open_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_transport_resolution_is_reported() {
    stream_test_utils::init_logging();

    let resolver = Arc::new(DeferredResolver::new());
    resolver.reject(TransportError::new(
        TransportErrorKind::Unavailable,
        "mesh not started",
    ));
    let service =
        support::make_service_with(SubscriptionServiceConfig::new("billing"), resolver.clone());
    let recorder = CallbackRecorder::new("orders");
    let control = support::subscribe_recorded(
        &service,
        "proto://orders/stream1",
        StreamArgs::new(),
        &recorder,
    );

    assert_eq!(control.finished().await, SubscriptionState::Failed);
    let err = single_error(&recorder);
    let SubscriptionError::TransportUnavailable(source) = err else {
        panic!("expected TransportUnavailable, got {err:?}");
    };
    assert_eq!(source.kind(), TransportErrorKind::Unavailable);
    assert_eq!(resolver.calls(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn channel_open_failure_names_the_target() {
    stream_test_utils::init_logging();

    let transport = MockTransport::new();
    transport.fail_service(
        "orders",
        TransportError::new(TransportErrorKind::ConnectionFailure, "refused"),
    );
    let service = support::make_service("billing", transport.clone());
    let recorder = CallbackRecorder::new("orders");
    let control = support::subscribe_recorded(
        &service,
        "proto://orders/stream1",
        StreamArgs::new(),
        &recorder,
    );

    assert_eq!(control.finished().await, SubscriptionState::Failed);
    match single_error(&recorder) {
        SubscriptionError::ChannelOpenFailed {
            target_service,
            source,
        } => {
            assert_eq!(target_service, "orders");
            assert_eq!(source.kind(), TransportErrorKind::ConnectionFailure);
        }
        other => panic!("expected ChannelOpenFailed, got {other:?}"),
    }
    assert_eq!(transport.open_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn setup_timeout_bounds_transport_resolution() {
    stream_test_utils::init_logging();

    let resolver = Arc::new(DeferredResolver::new());
    let service = support::make_service_with(
        SubscriptionServiceConfig::new("billing").with_setup_timeout(Duration::from_millis(50)),
        resolver,
    );
    let recorder = CallbackRecorder::new("orders");
    let control = support::subscribe_recorded(
        &service,
        "proto://orders/stream1",
        StreamArgs::new(),
        &recorder,
    );

    assert_eq!(control.finished().await, SubscriptionState::Failed);
    match single_error(&recorder) {
        SubscriptionError::TransportUnavailable(source) => {
            assert_eq!(source.kind(), TransportErrorKind::Timeout);
        }
        other => panic!("expected TransportUnavailable, got {other:?}"),
    }
}

struct PanickingTransport;

#[async_trait]
impl Transport for PanickingTransport {
    async fn open_channel(
        &self,
        _target_service: &str,
        _protocol: &str,
    ) -> Result<Box<dyn Channel>, TransportError> {
        panic!("transport bug");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn panicking_transport_still_finishes_the_subscription() {
    stream_test_utils::init_logging();

    let service = support::make_service_with(
        SubscriptionServiceConfig::new("billing"),
        Arc::new(ReadyTransport::new(Arc::new(PanickingTransport))),
    );
    let recorder = CallbackRecorder::new("orders");
    let control = support::subscribe_recorded(
        &service,
        "proto://orders/stream1",
        StreamArgs::new(),
        &recorder,
    );

    let outcome = tokio::time::timeout(Duration::from_secs(5), control.finished())
        .await
        .expect("subscription should finish after its task panics");
    assert_eq!(outcome, SubscriptionState::Failed);
    assert!(recorder.events().is_empty());
}
