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

//! Error taxonomy for subscription setup and streaming.

use crate::state::SubscriptionState;
use std::error::Error;
use std::fmt::{self, Display, Formatter};

/// Coarse classification of a [`TransportError`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransportErrorKind {
    /// The transport could not be resolved or is shut down.
    Unavailable,
    /// The target service is unknown to discovery.
    ServiceNotFound,
    /// The connection to the target service was lost or refused.
    ConnectionFailure,
    /// A bounded setup step did not finish in time.
    Timeout,
    Other,
}

/// Failure reported by the external transport or one of its channels.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for TransportError {}

/// Runtime failures of a started subscription protocol.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProtocolFailure {
    /// The remote service rejected the subscription (NACK).
    StreamNotFound { stream_path: String },
    /// The remote stream terminated with an error frame.
    Remote(String),
    ServiceNotFound { target_service: String },
    ConnectionLost,
    /// The channel ended without a completion frame.
    ChannelClosed,
    UnexpectedFrame {
        step: &'static str,
        state: SubscriptionState,
    },
    UnknownStep(String),
    SendFailed(TransportError),
}

impl Display for ProtocolFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolFailure::StreamNotFound { stream_path } => {
                write!(f, "stream {stream_path} does not exist")
            }
            ProtocolFailure::Remote(message) => write!(f, "remote stream failed: {message}"),
            ProtocolFailure::ServiceNotFound { target_service } => {
                write!(f, "service {target_service} does not exist")
            }
            ProtocolFailure::ConnectionLost => write!(
                f,
                "connection lost to remote service, the channel has shut down due to a transport failure"
            ),
            ProtocolFailure::ChannelClosed => {
                write!(f, "channel closed before the stream completed")
            }
            ProtocolFailure::UnexpectedFrame { step, state } => {
                write!(f, "unexpected {step} frame while {state}")
            }
            ProtocolFailure::UnknownStep(step) => {
                write!(f, "unknown protocol step [{step}] received")
            }
            ProtocolFailure::SendFailed(err) => write!(f, "unable to send on channel: {err}"),
        }
    }
}

impl Error for ProtocolFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ProtocolFailure::SendFailed(err) => Some(err),
            _ => None,
        }
    }
}

/// Error delivered to a subscriber's error callback.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SubscriptionError {
    InvalidUrl { url: String, reason: String },
    TransportUnavailable(TransportError),
    ChannelOpenFailed {
        target_service: String,
        source: TransportError,
    },
    ProtocolFailure(ProtocolFailure),
}

impl SubscriptionError {
    /// Whether the error happened before a protocol instance existed.
    pub fn is_setup_error(&self) -> bool {
        !matches!(self, SubscriptionError::ProtocolFailure(_))
    }
}

impl Display for SubscriptionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionError::InvalidUrl { url, reason } => {
                write!(f, "invalid remote stream url '{url}': {reason}")
            }
            SubscriptionError::TransportUnavailable(err) => {
                write!(f, "transport unavailable: {err}")
            }
            SubscriptionError::ChannelOpenFailed {
                target_service,
                source,
            } => write!(f, "failed to open channel to {target_service}: {source}"),
            SubscriptionError::ProtocolFailure(failure) => write!(f, "{failure}"),
        }
    }
}

impl Error for SubscriptionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SubscriptionError::TransportUnavailable(err) => Some(err),
            SubscriptionError::ChannelOpenFailed { source, .. } => Some(source),
            SubscriptionError::ProtocolFailure(failure) => Some(failure),
            SubscriptionError::InvalidUrl { .. } => None,
        }
    }
}

impl From<ProtocolFailure> for SubscriptionError {
    fn from(failure: ProtocolFailure) -> Self {
        SubscriptionError::ProtocolFailure(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::{ProtocolFailure, SubscriptionError, TransportError, TransportErrorKind};
    use std::error::Error;

    #[test]
    fn channel_open_failure_chains_transport_source() {
        let error = SubscriptionError::ChannelOpenFailed {
            target_service: "orders".to_string(),
            source: TransportError::new(TransportErrorKind::ServiceNotFound, "no such service"),
        };

        assert!(error.to_string().contains("failed to open channel to orders"));
        assert!(error.source().is_some());
        assert!(error.is_setup_error());
    }

    #[test]
    fn protocol_failure_is_not_a_setup_error() {
        let error: SubscriptionError = ProtocolFailure::ChannelClosed.into();

        assert!(!error.is_setup_error());
        assert_eq!(
            error.to_string(),
            "channel closed before the stream completed"
        );
    }
}
