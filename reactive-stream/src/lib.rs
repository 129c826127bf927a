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

//! # reactive-stream
//!
//! `reactive-stream` is the client side of the `reactive-stream` protocol: it subscribes to
//! a continuously updating stream exposed by another service in the mesh and bridges the
//! stream into three callbacks (data, error, completion).
//!
//! Typical usage is API-first and centered on [`SubscriptionService`] and [`Control`].
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use reactive_stream::{
//!     ReadyTransport, StreamArgs, SubscriptionService, SubscriptionServiceConfig,
//!     SubscriptionState, Transport,
//! };
//!
//! # pub mod canned {
//! #     use async_trait::async_trait;
//! #     use reactive_stream::{
//! #         Channel, InboundFrame, OutboundFrame, StreamData, Transport, TransportError,
//! #     };
//! #     use std::collections::VecDeque;
//! #
//! #     /// Replays a fixed script of frames.
//! #     pub struct CannedChannel(pub VecDeque<InboundFrame>);
//! #
//! #     #[async_trait]
//! #     impl Channel for CannedChannel {
//! #         fn target_service(&self) -> &str { "orders" }
//! #         fn protocol(&self) -> &str { "reactive-stream" }
//! #         async fn send(&mut self, _frame: OutboundFrame) -> Result<(), TransportError> { Ok(()) }
//! #         async fn receive(&mut self) -> Option<InboundFrame> { self.0.pop_front() }
//! #         async fn close(&mut self) {}
//! #     }
//! #
//! #     pub struct CannedTransport;
//! #
//! #     #[async_trait]
//! #     impl Transport for CannedTransport {
//! #         async fn open_channel(
//! #             &self,
//! #             _target_service: &str,
//! #             _protocol: &str,
//! #         ) -> Result<Box<dyn Channel>, TransportError> {
//! #             Ok(Box::new(CannedChannel(VecDeque::from([
//! #                 InboundFrame::Ack,
//! #                 InboundFrame::Data(StreamData::new("text/plain", b"hello".to_vec())),
//! #                 InboundFrame::Complete,
//! #             ]))))
//! #         }
//! #     }
//! # }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let transport: Arc<dyn Transport> = Arc::new(canned::CannedTransport);
//! let service = SubscriptionService::new(
//!     SubscriptionServiceConfig::new("billing"),
//!     Arc::new(ReadyTransport::new(transport)),
//! )
//! .unwrap();
//!
//! let received = Arc::new(Mutex::new(Vec::new()));
//! let sink = received.clone();
//! let control = service.subscribe(
//!     "proto://orders/stream1?x=1",
//!     StreamArgs::new(),
//!     move |data| sink.lock().unwrap().push(data.payload),
//!     |err| eprintln!("subscription failed: {err}"),
//!     || println!("stream complete"),
//! );
//!
//! assert_eq!(control.finished().await, SubscriptionState::Completed);
//! assert_eq!(*received.lock().unwrap(), vec![b"hello".to_vec()]);
//! # });
//! ```
//!
//! ## Error policy
//!
//! Every outcome except cancellation reaches exactly one callback. Failures during setup
//! (malformed URL, transport unavailable, channel open failure) are logged and delivered to
//! the error callback, the same as failures reported by the remote stream.
//!
//! ## Internal architecture map
//!
//! - Locator: URL to target service, stream path and query arguments
//! - Subscriber/Control: callback bridge and caller-facing handle
//! - Protocol: per-subscription state machine owning its channel
//! - Service: orchestration task per subscription and host registration
//!
//! ## Observability model
//!
//! The crate uses `tracing` for logs/events. Library code emits events and does not
//! initialize a global subscriber; binaries and tests install `tracing_subscriber`.

mod config;
pub use config::{ConfigError, SubscriptionServiceConfig};

mod error;
pub use error::{ProtocolFailure, SubscriptionError, TransportError, TransportErrorKind};

mod frame;
pub use frame::{
    InboundFrame, OutboundFrame, StreamArgs, StreamData, SubscribeRequest, CONTENT_TYPE_JSON,
};

mod locator;
pub use locator::{ParsedTarget, StreamLocator};

#[doc(hidden)]
pub mod observability;
mod protocol;

mod service;
pub use service::{ServiceInitError, SubscriptionRequest, SubscriptionService};

mod stack;
pub use stack::{ProtocolEndpoint, ProtocolStack, ServerStackHost};

mod state;
pub use state::SubscriptionState;

mod subscriber;
pub use subscriber::Control;

mod transport;
pub use transport::{Channel, ReadyTransport, Transport, TransportResolver, REACTIVE_STREAM_PROTOCOL};
