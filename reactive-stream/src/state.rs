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

//! Monotonic lifecycle state of one subscription.

use std::fmt::{self, Display, Formatter};

/// Lifecycle state observed through a [`Control`](crate::Control).
///
/// `Pending` covers the window before a protocol exists (transport resolution and
/// channel open). The remaining states follow the protocol:
/// `Created -> Starting -> Streaming -> (Completed | Failed)`. `Cancelled` is a terminal
/// state reachable from any non-terminal state and never signals a callback.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SubscriptionState {
    Pending,
    Created,
    Starting,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl SubscriptionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SubscriptionState::Completed | SubscriptionState::Failed | SubscriptionState::Cancelled
        )
    }

    fn rank(self) -> u8 {
        match self {
            SubscriptionState::Pending => 0,
            SubscriptionState::Created => 1,
            SubscriptionState::Starting => 2,
            SubscriptionState::Streaming => 3,
            SubscriptionState::Completed
            | SubscriptionState::Failed
            | SubscriptionState::Cancelled => 4,
        }
    }

    /// Whether moving from `self` to `next` keeps the lifecycle monotonic.
    pub(crate) fn can_advance_to(self, next: SubscriptionState) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl Display for SubscriptionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let label = match self {
            SubscriptionState::Pending => "pending",
            SubscriptionState::Created => "created",
            SubscriptionState::Starting => "starting",
            SubscriptionState::Streaming => "streaming",
            SubscriptionState::Completed => "completed",
            SubscriptionState::Failed => "failed",
            SubscriptionState::Cancelled => "cancelled",
        };
        write!(f, "{label}")
    }
}
