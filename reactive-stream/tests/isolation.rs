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

use reactive_stream::{InboundFrame, StreamArgs, SubscriptionState};
use stream_test_utils::{CallbackRecorder, MockTransport};

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_subscriptions_keep_their_own_data() {
    stream_test_utils::init_logging();

    let transport = MockTransport::new();
    let service = support::make_service("billing", transport.clone());
    let orders = CallbackRecorder::new("orders");
    let inventory = CallbackRecorder::new("inventory");

    let orders_control = support::subscribe_recorded(
        &service,
        "proto://orders/stream1",
        StreamArgs::new(),
        &orders,
    );
    let inventory_control = support::subscribe_recorded(
        &service,
        "proto://inventory/levels",
        StreamArgs::new(),
        &inventory,
    );
    assert_ne!(
        orders_control.subscription_id(),
        inventory_control.subscription_id()
    );

    let orders_channel = support::channel_to(&transport, 2, "orders").await;
    let inventory_channel = support::channel_to(&transport, 2, "inventory").await;

    orders_channel.push(InboundFrame::Ack);
    inventory_channel.push(InboundFrame::Ack);
    for i in 0..5 {
        orders_channel.push_data(&format!("order-{i}"));
        inventory_channel.push_data(&format!("stock-{i}"));
    }
    orders_channel.push(InboundFrame::Complete);
    inventory_channel.push(InboundFrame::Complete);

    assert_eq!(orders_control.finished().await, SubscriptionState::Completed);
    assert_eq!(
        inventory_control.finished().await,
        SubscriptionState::Completed
    );

    let expected_orders: Vec<Vec<u8>> = (0..5).map(|i| format!("order-{i}").into_bytes()).collect();
    let expected_stock: Vec<Vec<u8>> = (0..5).map(|i| format!("stock-{i}").into_bytes()).collect();
    assert_eq!(orders.data_payloads(), expected_orders);
    assert_eq!(inventory.data_payloads(), expected_stock);
    assert_eq!(orders.completions(), 1);
    assert_eq!(inventory.completions(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn one_failing_subscription_leaves_the_other_running() {
    stream_test_utils::init_logging();

    let transport = MockTransport::new();
    let service = support::make_service("billing", transport.clone());
    let orders = CallbackRecorder::new("orders");
    let inventory = CallbackRecorder::new("inventory");

    let orders_control = support::subscribe_recorded(
        &service,
        "proto://orders/stream1",
        StreamArgs::new(),
        &orders,
    );
    let inventory_control = support::subscribe_recorded(
        &service,
        "proto://inventory/levels",
        StreamArgs::new(),
        &inventory,
    );

    let orders_channel = support::channel_to(&transport, 2, "orders").await;
    let inventory_channel = support::channel_to(&transport, 2, "inventory").await;

    orders_channel.push(InboundFrame::Nack);
    assert_eq!(orders_control.finished().await, SubscriptionState::Failed);

    inventory_channel.push(InboundFrame::Ack);
    inventory_channel.push_data("stock-0");
    inventory_channel.push(InboundFrame::Complete);
    assert_eq!(
        inventory_control.finished().await,
        SubscriptionState::Completed
    );

    assert_eq!(orders.errors().len(), 1);
    assert!(orders.data_payloads().is_empty());
    assert_eq!(inventory.data_payloads(), vec![b"stock-0".to_vec()]);
    assert!(inventory.errors().is_empty());
    assert_eq!(orders_channel.close_count(), 1);
    assert_eq!(inventory_channel.close_count(), 1);
}
