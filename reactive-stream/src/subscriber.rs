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

//! Callback bridge between a protocol and the caller's three callbacks.
//!
//! A [`Subscriber`] and its [`Control`] share one [`SubscriptionShared`]. The shared
//! lifecycle state is the single gate for terminal delivery: whoever moves the state into
//! a terminal value first decides the outcome, so `onError`/`onComplete` fire at most once
//! and never after `cancel()`.

use crate::error::SubscriptionError;
use crate::frame::StreamData;
use crate::observability::events;
use crate::state::SubscriptionState;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

const COMPONENT: &str = "subscriber";

pub(crate) type DataCallback = Box<dyn FnMut(StreamData) + Send>;
pub(crate) type ErrorCallback = Box<dyn FnOnce(SubscriptionError) + Send>;
pub(crate) type CompleteCallback = Box<dyn FnOnce() + Send>;

/// Requests from a [`Control`] that the protocol acts on.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ControlCommand {
    Request(u64),
}

/// Outcome of handing one data item to the caller.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Delivery {
    Delivered,
    Suppressed,
    /// The data callback panicked; the subscription is now `Failed`.
    Panicked,
}

/// State shared by a subscription's control handle and its background task.
pub(crate) struct SubscriptionShared {
    id: String,
    state: watch::Sender<SubscriptionState>,
    finished: watch::Sender<bool>,
    cancel_token: CancellationToken,
}

impl SubscriptionShared {
    fn new() -> Self {
        let (state, _) = watch::channel(SubscriptionState::Pending);
        let (finished, _) = watch::channel(false);
        Self {
            id: uuid::Uuid::new_v4().hyphenated().to_string(),
            state,
            finished,
            cancel_token: CancellationToken::new(),
        }
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn state(&self) -> SubscriptionState {
        *self.state.borrow()
    }

    /// Moves the lifecycle forward; returns `false` when `next` would revisit or skip
    /// past a terminal state.
    pub(crate) fn advance(&self, next: SubscriptionState) -> bool {
        self.state.send_if_modified(|current| {
            if current.can_advance_to(next) {
                *current = next;
                true
            } else {
                false
            }
        })
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.state() == SubscriptionState::Cancelled
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub(crate) fn mark_finished(&self) {
        self.finished.send_replace(true);
    }
}

/// Caller-facing handle for a pending or active subscription.
///
/// Valid from the moment `subscribe` returns, before any transport or channel exists.
#[derive(Clone)]
pub struct Control {
    shared: Arc<SubscriptionShared>,
    commands: mpsc::UnboundedSender<ControlCommand>,
}

impl Control {
    pub fn subscription_id(&self) -> &str {
        self.shared.id()
    }

    pub fn state(&self) -> SubscriptionState {
        self.shared.state()
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled()
    }

    /// Cancels the subscription.
    ///
    /// Before a channel exists this prevents it from being opened; afterwards the channel
    /// is closed by the subscription task. No callback fires because of the cancellation.
    /// Repeated calls, or calls after a terminal state, do nothing.
    ///
    /// Called from another thread while data is flowing, one data callback that was
    /// already being dispatched may still run after `cancel` returns. Error and
    /// completion callbacks never fire after it.
    pub fn cancel(&self) {
        let previous = self.shared.state();
        if self.shared.advance(SubscriptionState::Cancelled) {
            debug!(
                event = events::SUBSCRIPTION_CANCEL_REQUESTED,
                component = COMPONENT,
                subscription_id = self.shared.id(),
                previous_state = %previous,
                "subscription cancelled"
            );
            self.shared.cancel_token.cancel();
        }
    }

    /// Signals demand for `n` more items. Demand issued before the remote acknowledges
    /// the subscription is sent together with the initial request.
    pub fn request(&self, n: u64) {
        if n == 0 || self.shared.state().is_terminal() {
            return;
        }
        // The task may already have exited; the demand is moot then.
        let _ = self.commands.send(ControlCommand::Request(n));
    }

    /// Waits until the subscription task has released every resource and returns the
    /// final state.
    pub async fn finished(&self) -> SubscriptionState {
        let mut finished = self.shared.finished.subscribe();
        let _ = finished.wait_for(|done| *done).await;
        self.shared.state()
    }
}

/// Holder of the caller's callbacks; owned by exactly one subscription task.
pub(crate) struct Subscriber {
    shared: Arc<SubscriptionShared>,
    on_data: DataCallback,
    on_error: Option<ErrorCallback>,
    on_complete: Option<CompleteCallback>,
}

impl Subscriber {
    /// Builds the subscriber, its control handle and the queue of control commands.
    pub(crate) fn new(
        on_data: DataCallback,
        on_error: ErrorCallback,
        on_complete: CompleteCallback,
    ) -> (Self, Control, mpsc::UnboundedReceiver<ControlCommand>) {
        let shared = Arc::new(SubscriptionShared::new());
        let (commands, command_receiver) = mpsc::unbounded_channel();

        let subscriber = Self {
            shared: shared.clone(),
            on_data,
            on_error: Some(on_error),
            on_complete: Some(on_complete),
        };
        let control = Control { shared, commands };

        (subscriber, control, command_receiver)
    }

    pub(crate) fn shared(&self) -> &Arc<SubscriptionShared> {
        &self.shared
    }

    /// Delivers one data item; dropped unless the subscription is streaming.
    ///
    /// A panicking data callback fails the subscription without invoking the other
    /// callbacks.
    pub(crate) fn next(&mut self, data: StreamData) -> Delivery {
        if self.shared.state() != SubscriptionState::Streaming {
            trace!(
                event = events::DELIVERY_SUPPRESSED,
                component = COMPONENT,
                subscription_id = self.shared.id(),
                state = %self.shared.state(),
                "data item not delivered"
            );
            return Delivery::Suppressed;
        }
        let on_data = &mut self.on_data;
        if guarded(&self.shared, "on_data", || on_data(data)) {
            return Delivery::Delivered;
        }
        self.shared.advance(SubscriptionState::Failed);
        self.on_error = None;
        self.on_complete = None;
        Delivery::Panicked
    }

    /// Delivers a terminal error if the subscription has not already ended.
    pub(crate) fn fail(&mut self, err: SubscriptionError) -> bool {
        if !self.shared.advance(SubscriptionState::Failed) {
            trace!(
                event = events::DELIVERY_SUPPRESSED,
                component = COMPONENT,
                subscription_id = self.shared.id(),
                state = %self.shared.state(),
                err = %err,
                "error not delivered"
            );
            return false;
        }
        self.on_complete = None;
        match self.on_error.take() {
            Some(on_error) => {
                guarded(&self.shared, "on_error", || on_error(err));
                true
            }
            None => false,
        }
    }

    /// Delivers completion if the subscription has not already ended.
    pub(crate) fn complete(&mut self) -> bool {
        if !self.shared.advance(SubscriptionState::Completed) {
            trace!(
                event = events::DELIVERY_SUPPRESSED,
                component = COMPONENT,
                subscription_id = self.shared.id(),
                state = %self.shared.state(),
                "completion not delivered"
            );
            return false;
        }
        self.on_error = None;
        match self.on_complete.take() {
            Some(on_complete) => {
                guarded(&self.shared, "on_complete", on_complete);
                true
            }
            None => false,
        }
    }
}

/// Runs a caller callback, containing a panic so the task can still release its channel.
/// Returns `false` if the callback panicked.
fn guarded(shared: &SubscriptionShared, callback: &'static str, f: impl FnOnce()) -> bool {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(_) => {
            error!(
                event = events::CALLBACK_PANICKED,
                component = COMPONENT,
                subscription_id = shared.id(),
                callback,
                "subscriber callback panicked"
            );
            false
        }
    }
}
