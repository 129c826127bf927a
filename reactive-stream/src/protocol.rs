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

//! Client side of the reactive-stream protocol for one subscription.
//!
//! The protocol owns its channel. It sends the subscribe request on `start`, then turns
//! inbound frames into subscriber callbacks until a terminal state is reached or the
//! subscription is cancelled, and closes the channel exactly once on the way out.

use crate::error::{ProtocolFailure, TransportError, TransportErrorKind};
use crate::frame::{InboundFrame, OutboundFrame, StreamArgs, SubscribeRequest};
use crate::observability::events;
use crate::state::SubscriptionState;
use crate::subscriber::{ControlCommand, Delivery, Subscriber};
use crate::transport::Channel;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, trace, warn};

const COMPONENT: &str = "subscription_protocol";

/// Identity and arguments a protocol instance is bound to.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct StreamBinding {
    pub(crate) local_service: String,
    pub(crate) target_service: String,
    pub(crate) stream_path: String,
    pub(crate) args: StreamArgs,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Flow {
    Continue,
    Stop,
}

enum Next {
    Cancelled,
    Command(Option<ControlCommand>),
    Frame(Option<InboundFrame>),
}

pub(crate) struct SubscriptionProtocol {
    subscriber: Subscriber,
    channel: Option<Box<dyn Channel>>,
    binding: StreamBinding,
    prefetch: u64,
    pending_demand: u64,
    subscribe_sent: bool,
}

impl SubscriptionProtocol {
    /// Binds a fresh protocol to its channel and enters `Created`.
    pub(crate) fn new(
        subscriber: Subscriber,
        channel: Box<dyn Channel>,
        binding: StreamBinding,
        prefetch: u64,
    ) -> Self {
        let mut protocol = Self {
            subscriber,
            channel: Some(channel),
            binding,
            prefetch,
            pending_demand: 0,
            subscribe_sent: false,
        };
        protocol.transition(SubscriptionState::Created);
        protocol
    }

    pub(crate) fn state(&self) -> SubscriptionState {
        self.subscriber.shared().state()
    }

    fn subscription_id(&self) -> &str {
        self.subscriber.shared().id()
    }

    fn transition(&mut self, next: SubscriptionState) -> bool {
        let previous = self.state();
        let advanced = self.subscriber.shared().advance(next);
        if advanced {
            debug!(
                event = events::PROTOCOL_STATE_CHANGED,
                component = COMPONENT,
                subscription_id = self.subscription_id(),
                from = %previous,
                to = %next,
                "protocol state changed"
            );
        } else {
            trace!(
                event = events::PROTOCOL_STATE_REJECTED,
                component = COMPONENT,
                subscription_id = self.subscription_id(),
                from = %previous,
                to = %next,
                "protocol state change rejected"
            );
        }
        advanced
    }

    /// Enters `Starting` and sends the subscribe request.
    pub(crate) async fn start(&mut self) -> Flow {
        if !self.transition(SubscriptionState::Starting) {
            self.close_channel().await;
            return Flow::Stop;
        }

        let request = OutboundFrame::Subscribe(SubscribeRequest {
            source_service: self.binding.local_service.clone(),
            target_service: self.binding.target_service.clone(),
            stream_path: self.binding.stream_path.clone(),
            args: self.binding.args.clone(),
        });

        match self.send(request).await {
            Ok(()) => {
                self.subscribe_sent = true;
                Flow::Continue
            }
            Err(err) => self.fail(ProtocolFailure::SendFailed(err)).await,
        }
    }

    /// Drives the protocol until it stops, then releases the channel.
    pub(crate) async fn run(mut self, mut commands: UnboundedReceiver<ControlCommand>) {
        let cancel_token = self.subscriber.shared().cancel_token();
        let mut commands_open = true;

        loop {
            let next = {
                let Some(channel) = self.channel.as_mut() else {
                    break;
                };
                tokio::select! {
                    biased;
                    _ = cancel_token.cancelled() => Next::Cancelled,
                    command = commands.recv(), if commands_open => Next::Command(command),
                    frame = channel.receive() => Next::Frame(frame),
                }
            };

            let flow = match next {
                Next::Cancelled => {
                    self.on_cancelled().await;
                    Flow::Stop
                }
                Next::Command(Some(command)) => self.on_command(command).await,
                Next::Command(None) => {
                    commands_open = false;
                    Flow::Continue
                }
                Next::Frame(frame) => self.handle_frame(frame).await,
            };

            if flow == Flow::Stop {
                break;
            }
        }

        self.close_channel().await;
    }

    pub(crate) async fn handle_frame(&mut self, frame: Option<InboundFrame>) -> Flow {
        let Some(frame) = frame else {
            return self.fail(ProtocolFailure::ChannelClosed).await;
        };

        let step = frame.step();
        let state = self.state();
        trace!(
            event = events::PROTOCOL_FRAME_RECEIVED,
            component = COMPONENT,
            subscription_id = self.subscription_id(),
            step,
            state = %state,
            "frame received"
        );

        match frame {
            InboundFrame::Ack => self.on_ack(state).await,
            InboundFrame::Data(data) if state == SubscriptionState::Streaming => {
                match self.subscriber.next(data) {
                    Delivery::Panicked => self.abandon().await,
                    Delivery::Delivered | Delivery::Suppressed => Flow::Continue,
                }
            }
            InboundFrame::Complete if state == SubscriptionState::Streaming => {
                self.complete().await
            }
            InboundFrame::Data(_) | InboundFrame::Complete => {
                self.fail(ProtocolFailure::UnexpectedFrame { step, state })
                    .await
            }
            InboundFrame::Nack => {
                let stream_path = self.binding.stream_path.clone();
                self.fail(ProtocolFailure::StreamNotFound { stream_path })
                    .await
            }
            InboundFrame::Error(message) => self.fail(ProtocolFailure::Remote(message)).await,
            InboundFrame::ServiceNotFound => {
                let target_service = self.binding.target_service.clone();
                self.fail(ProtocolFailure::ServiceNotFound { target_service })
                    .await
            }
            InboundFrame::ConnectionFailure => self.fail(ProtocolFailure::ConnectionLost).await,
            InboundFrame::Unknown(step) => self.fail(ProtocolFailure::UnknownStep(step)).await,
        }
    }

    async fn on_ack(&mut self, state: SubscriptionState) -> Flow {
        if state != SubscriptionState::Starting {
            warn!(
                event = events::PROTOCOL_FRAME_IGNORED,
                component = COMPONENT,
                subscription_id = self.subscription_id(),
                step = "ack",
                state = %state,
                "duplicate acknowledgement ignored"
            );
            return Flow::Continue;
        }

        if !self.transition(SubscriptionState::Streaming) {
            return Flow::Stop;
        }

        let demand = self.prefetch.saturating_add(self.pending_demand);
        self.pending_demand = 0;
        self.send_demand(demand).await
    }

    async fn on_command(&mut self, command: ControlCommand) -> Flow {
        match command {
            ControlCommand::Request(n) => match self.state() {
                SubscriptionState::Streaming => self.send_demand(n).await,
                state if !state.is_terminal() => {
                    self.pending_demand = self.pending_demand.saturating_add(n);
                    Flow::Continue
                }
                _ => Flow::Stop,
            },
        }
    }

    async fn send_demand(&mut self, n: u64) -> Flow {
        if n == 0 {
            return Flow::Continue;
        }
        match self.send(OutboundFrame::Request(n)).await {
            Ok(()) => {
                trace!(
                    event = events::DEMAND_SENT,
                    component = COMPONENT,
                    subscription_id = self.subscription_id(),
                    demand = n,
                    "demand sent"
                );
                Flow::Continue
            }
            Err(err) => self.fail(ProtocolFailure::SendFailed(err)).await,
        }
    }

    async fn send(&mut self, frame: OutboundFrame) -> Result<(), TransportError> {
        let Some(channel) = self.channel.as_mut() else {
            return Err(TransportError::new(
                TransportErrorKind::ConnectionFailure,
                "channel already closed",
            ));
        };

        channel.send(frame).await.map_err(|err| {
            warn!(
                event = events::PROTOCOL_SEND_FAILED,
                component = COMPONENT,
                subscription_id = self.subscriber.shared().id(),
                err = %err,
                "unable to send frame"
            );
            err
        })
    }

    async fn fail(&mut self, failure: ProtocolFailure) -> Flow {
        warn!(
            event = events::PROTOCOL_FAILED,
            component = COMPONENT,
            subscription_id = self.subscription_id(),
            target_service = self.binding.target_service.as_str(),
            stream_path = self.binding.stream_path.as_str(),
            err = %failure,
            "subscription failed"
        );
        self.subscriber.fail(failure.into());
        self.close_channel().await;
        Flow::Stop
    }

    async fn complete(&mut self) -> Flow {
        debug!(
            event = events::PROTOCOL_COMPLETED,
            component = COMPONENT,
            subscription_id = self.subscription_id(),
            target_service = self.binding.target_service.as_str(),
            stream_path = self.binding.stream_path.as_str(),
            "stream completed"
        );
        self.subscriber.complete();
        self.close_channel().await;
        Flow::Stop
    }

    /// Stops a stream whose consumer can no longer take data.
    async fn abandon(&mut self) -> Flow {
        warn!(
            event = events::PROTOCOL_FAILED,
            component = COMPONENT,
            subscription_id = self.subscription_id(),
            target_service = self.binding.target_service.as_str(),
            stream_path = self.binding.stream_path.as_str(),
            "data callback panicked; abandoning stream"
        );
        if self.subscribe_sent {
            let _ = self.send(OutboundFrame::Cancel).await;
        }
        self.close_channel().await;
        Flow::Stop
    }

    async fn on_cancelled(&mut self) {
        debug!(
            event = events::PROTOCOL_CANCELLED,
            component = COMPONENT,
            subscription_id = self.subscription_id(),
            target_service = self.binding.target_service.as_str(),
            stream_path = self.binding.stream_path.as_str(),
            "subscription cancelled; closing channel"
        );
        if self.subscribe_sent {
            // Best effort: the remote also learns about the close from the channel.
            let _ = self.send(OutboundFrame::Cancel).await;
        }
        self.close_channel().await;
    }

    async fn close_channel(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close().await;
            debug!(
                event = events::CHANNEL_CLOSED,
                component = COMPONENT,
                subscription_id = self.subscription_id(),
                target_service = self.binding.target_service.as_str(),
                state = %self.state(),
                "channel closed"
            );
        }
    }
}
