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

//! Subscription orchestration: transport resolution, URL resolution, channel
//! acquisition and protocol start, run as one task per subscription.

use crate::config::{ConfigError, SubscriptionServiceConfig};
use crate::error::{SubscriptionError, TransportError, TransportErrorKind};
use crate::frame::{StreamArgs, StreamData};
use crate::locator::StreamLocator;
use crate::observability::events;
use crate::protocol::{Flow, StreamBinding, SubscriptionProtocol};
use crate::stack::{ProtocolEndpoint, ProtocolStack, ServerStackHost};
use crate::state::SubscriptionState;
use crate::subscriber::{ControlCommand, Subscriber, SubscriptionShared};
use crate::transport::{TransportResolver, REACTIVE_STREAM_PROTOCOL};
use crate::Control;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info};

const COMPONENT: &str = "subscription_service";

/// One call to `subscribe`: the remote stream URL plus caller parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct SubscriptionRequest {
    pub remote_url: String,
    pub params: StreamArgs,
}

impl SubscriptionRequest {
    pub fn new(remote_url: impl Into<String>, params: StreamArgs) -> Self {
        Self {
            remote_url: remote_url.into(),
            params,
        }
    }
}

#[derive(Debug)]
pub enum ServiceInitError {
    InvalidConfig(ConfigError),
    /// `SubscriptionService::new` was called outside a Tokio runtime.
    NoRuntime,
}

impl Display for ServiceInitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ServiceInitError::InvalidConfig(err) => write!(f, "{err}"),
            ServiceInitError::NoRuntime => {
                write!(f, "subscription service requires a Tokio runtime")
            }
        }
    }
}

impl Error for ServiceInitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ServiceInitError::InvalidConfig(err) => Some(err),
            ServiceInitError::NoRuntime => None,
        }
    }
}

/// Client entry point for reactive-stream subscriptions.
///
/// Every instance carries its own configuration; independent services in one process
/// share nothing.
///
/// ```
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use reactive_stream::{
///     Channel, ReadyTransport, StreamArgs, SubscriptionService, SubscriptionServiceConfig,
///     Transport, TransportError, TransportErrorKind,
/// };
///
/// struct Offline;
///
/// #[async_trait]
/// impl Transport for Offline {
///     async fn open_channel(
///         &self,
///         target_service: &str,
///         _protocol: &str,
///     ) -> Result<Box<dyn Channel>, TransportError> {
///         Err(TransportError::new(
///             TransportErrorKind::ServiceNotFound,
///             format!("{target_service} is not reachable"),
///         ))
///     }
/// }
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let service = SubscriptionService::new(
///     SubscriptionServiceConfig::new("billing"),
///     Arc::new(ReadyTransport::new(Arc::new(Offline))),
/// )
/// .unwrap();
///
/// let control = service.subscribe(
///     "proto://orders/stream1?x=1",
///     StreamArgs::new(),
///     |data| println!("data: {data:?}"),
///     |err| println!("error: {err}"),
///     || println!("complete"),
/// );
/// assert!(control.finished().await.is_terminal());
/// # });
/// ```
pub struct SubscriptionService {
    config: Arc<SubscriptionServiceConfig>,
    resolver: Arc<dyn TransportResolver>,
    runtime: Handle,
}

impl SubscriptionService {
    /// Creates a service bound to the current Tokio runtime.
    pub fn new(
        config: SubscriptionServiceConfig,
        resolver: Arc<dyn TransportResolver>,
    ) -> Result<Self, ServiceInitError> {
        let runtime = Handle::try_current().map_err(|_| ServiceInitError::NoRuntime)?;
        Self::with_runtime(config, resolver, runtime)
    }

    pub fn with_runtime(
        config: SubscriptionServiceConfig,
        resolver: Arc<dyn TransportResolver>,
        runtime: Handle,
    ) -> Result<Self, ServiceInitError> {
        config.validate().map_err(ServiceInitError::InvalidConfig)?;
        debug!(
            event = events::SERVICE_CREATED,
            component = COMPONENT,
            service_name = config.service_name.as_str(),
            "subscription service created"
        );
        Ok(Self {
            config: Arc::new(config),
            resolver,
            runtime,
        })
    }

    pub fn service_name(&self) -> &str {
        &self.config.service_name
    }

    /// Subscribes to the stream named by `remote_url`.
    ///
    /// Returns immediately; transport resolution, channel open and the protocol handshake
    /// run in a background task. Setup failures (`InvalidUrl`, `TransportUnavailable`,
    /// `ChannelOpenFailed`) are logged and delivered to `on_error` like runtime failures.
    pub fn subscribe<D, E, C>(
        &self,
        remote_url: &str,
        params: StreamArgs,
        on_data: D,
        on_error: E,
        on_complete: C,
    ) -> Control
    where
        D: FnMut(StreamData) + Send + 'static,
        E: FnOnce(SubscriptionError) + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        let request = SubscriptionRequest::new(remote_url, params);
        let (subscriber, control, commands) =
            Subscriber::new(Box::new(on_data), Box::new(on_error), Box::new(on_complete));

        debug!(
            event = events::SUBSCRIBE_REQUESTED,
            component = COMPONENT,
            subscription_id = control.subscription_id(),
            remote_url = request.remote_url.as_str(),
            params = ?request.params,
            "subscribing"
        );

        let setup = SubscriptionSetup {
            request,
            subscriber,
            commands,
            resolver: self.resolver.clone(),
            config: self.config.clone(),
        };
        self.runtime.spawn(setup.run());

        control
    }

    /// Registers this service with the host's protocol stack.
    pub fn register(self: &Arc<Self>, host: &mut dyn ServerStackHost) {
        host.add_server_stack(self.clone());
        info!(
            event = events::STACK_REGISTERED,
            component = COMPONENT,
            service_name = self.service_name(),
            protocol = REACTIVE_STREAM_PROTOCOL,
            "protocol stack registered"
        );
    }
}

impl ProtocolStack for SubscriptionService {
    fn name(&self) -> &str {
        REACTIVE_STREAM_PROTOCOL
    }

    // Subscribe-only: nothing is served inbound.
    fn endpoints(&self) -> Vec<ProtocolEndpoint> {
        Vec::new()
    }
}

/// Deferred part of one `subscribe` call.
struct SubscriptionSetup {
    request: SubscriptionRequest,
    subscriber: Subscriber,
    commands: UnboundedReceiver<ControlCommand>,
    resolver: Arc<dyn TransportResolver>,
    config: Arc<SubscriptionServiceConfig>,
}

impl SubscriptionSetup {
    async fn run(self) {
        let _finished = FinishGuard(self.subscriber.shared().clone());
        self.establish().await;
    }

    async fn establish(self) {
        let SubscriptionSetup {
            request,
            mut subscriber,
            commands,
            resolver,
            config,
        } = self;
        let shared = subscriber.shared().clone();
        let subscription_id = shared.id().to_string();
        let setup_timeout = config.setup_timeout();
        let cancel_token = shared.cancel_token();

        let resolved = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                debug!(
                    event = events::SETUP_CANCELLED,
                    component = COMPONENT,
                    subscription_id = subscription_id.as_str(),
                    stage = "transport_resolution",
                    "subscription cancelled while resolving transport"
                );
                return;
            }
            resolved = bounded(setup_timeout, resolver.get_transport()) => resolved,
        };

        let transport = match resolved {
            Some(Ok(transport)) => transport,
            Some(Err(err)) => {
                fail_setup(&mut subscriber, SubscriptionError::TransportUnavailable(err));
                return;
            }
            None => {
                let err = timed_out("transport resolution", setup_timeout);
                fail_setup(&mut subscriber, SubscriptionError::TransportUnavailable(err));
                return;
            }
        };
        debug!(
            event = events::TRANSPORT_RESOLVED,
            component = COMPONENT,
            subscription_id = subscription_id.as_str(),
            "transport resolved"
        );

        // The only place a channel can be opened; a cancelled subscription never gets one.
        if shared.is_cancelled() {
            debug!(
                event = events::SETUP_CANCELLED,
                component = COMPONENT,
                subscription_id = subscription_id.as_str(),
                stage = "before_channel_open",
                "subscription cancelled before channel open"
            );
            return;
        }

        let target = match StreamLocator::parse(&request.remote_url) {
            Ok(target) => target,
            Err(err) => {
                fail_setup(&mut subscriber, err);
                return;
            }
        };

        let opened = bounded(
            setup_timeout,
            transport.open_channel(&target.target_service, REACTIVE_STREAM_PROTOCOL),
        )
        .await;
        let mut channel = match opened {
            Some(Ok(channel)) => channel,
            Some(Err(source)) => {
                fail_setup(
                    &mut subscriber,
                    SubscriptionError::ChannelOpenFailed {
                        target_service: target.target_service,
                        source,
                    },
                );
                return;
            }
            None => {
                fail_setup(
                    &mut subscriber,
                    SubscriptionError::ChannelOpenFailed {
                        target_service: target.target_service,
                        source: timed_out("channel open", setup_timeout),
                    },
                );
                return;
            }
        };
        debug!(
            event = events::CHANNEL_OPEN_OK,
            component = COMPONENT,
            subscription_id = subscription_id.as_str(),
            target_service = target.target_service.as_str(),
            protocol = channel.protocol(),
            "channel opened"
        );

        if shared.is_cancelled() {
            debug!(
                event = events::SETUP_CANCELLED,
                component = COMPONENT,
                subscription_id = subscription_id.as_str(),
                stage = "after_channel_open",
                "subscription cancelled while opening channel; closing it"
            );
            channel.close().await;
            return;
        }

        let binding = StreamBinding {
            local_service: config.service_name.clone(),
            target_service: target.target_service,
            stream_path: target.stream_path,
            args: merge_args(target.query_args, request.params),
        };
        let mut protocol =
            SubscriptionProtocol::new(subscriber, channel, binding, config.initial_demand());
        if protocol.start().await == Flow::Continue {
            protocol.run(commands).await;
        }
    }
}

/// Publishes the end of a subscription task, including one that panics or is aborted.
struct FinishGuard(Arc<SubscriptionShared>);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        // Every normal exit leaves a terminal state behind. A live state here means the
        // task unwound or was dropped by its runtime.
        let state = self.0.state();
        if self.0.advance(SubscriptionState::Failed) {
            error!(
                event = events::SUBSCRIPTION_TASK_ABORTED,
                component = COMPONENT,
                subscription_id = self.0.id(),
                state = %state,
                "subscription task ended without reaching a terminal state"
            );
        }
        self.0.mark_finished();
    }
}

/// Query arguments first, caller parameters override them.
fn merge_args(query_args: BTreeMap<String, String>, params: StreamArgs) -> StreamArgs {
    let mut args: StreamArgs = query_args
        .into_iter()
        .map(|(key, value)| (key, serde_json::Value::String(value)))
        .collect();
    args.extend(params);
    args
}

async fn bounded<F: Future>(limit: Option<Duration>, future: F) -> Option<F::Output> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, future).await.ok(),
        None => Some(future.await),
    }
}

fn timed_out(stage: &str, limit: Option<Duration>) -> TransportError {
    TransportError::new(
        TransportErrorKind::Timeout,
        format!("{stage} timed out after {limit:?}"),
    )
}

fn fail_setup(subscriber: &mut Subscriber, err: SubscriptionError) {
    let event = match err {
        SubscriptionError::TransportUnavailable(_) => events::TRANSPORT_UNAVAILABLE,
        SubscriptionError::ChannelOpenFailed { .. } => events::CHANNEL_OPEN_FAILED,
        _ => events::SETUP_FAILED,
    };
    error!(
        event,
        component = COMPONENT,
        subscription_id = subscriber.shared().id(),
        err = %err,
        "error in stream subscription initialisation"
    );
    subscriber.fail(err);
}
