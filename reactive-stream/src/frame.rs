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

//! Typed protocol frames exchanged over a reactive-stream channel.
//!
//! Byte-level framing belongs to the transport; this crate only sees decoded frames.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Arguments attached to a subscribe request.
pub type StreamArgs = serde_json::Map<String, serde_json::Value>;

pub const CONTENT_TYPE_JSON: &str = "application/json";

/// One item pushed by the remote stream.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct StreamData {
    pub content_type: String,
    pub payload: Vec<u8>,
}

impl StreamData {
    pub fn new(content_type: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: content_type.into(),
            payload: payload.into(),
        }
    }

    /// Builds a JSON data item from any serializable value.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(CONTENT_TYPE_JSON, serde_json::to_vec(value)?))
    }

    /// Decodes a JSON payload into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

/// Subscribe request sent once when the protocol starts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub source_service: String,
    pub target_service: String,
    pub stream_path: String,
    pub args: StreamArgs,
}

/// Frames written by the client side of the protocol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum OutboundFrame {
    Subscribe(SubscribeRequest),
    /// Additional demand for `n` items.
    Request(u64),
    Cancel,
}

/// Frames and transport events read from a channel.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum InboundFrame {
    Ack,
    Nack,
    Data(StreamData),
    Error(String),
    Complete,
    ServiceNotFound,
    ConnectionFailure,
    /// A step this client does not understand.
    Unknown(String),
}

impl InboundFrame {
    pub fn step(&self) -> &'static str {
        match self {
            InboundFrame::Ack => "ack",
            InboundFrame::Nack => "nack",
            InboundFrame::Data(_) => "data",
            InboundFrame::Error(_) => "error",
            InboundFrame::Complete => "complete",
            InboundFrame::ServiceNotFound => "service_not_found",
            InboundFrame::ConnectionFailure => "connection_failure",
            InboundFrame::Unknown(_) => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::StreamData;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Tick {
        seq: u32,
    }

    #[test]
    fn json_payload_decodes_into_typed_value() {
        let data = StreamData::json(&serde_json::json!({ "seq": 7 })).unwrap();

        assert_eq!(data.content_type, super::CONTENT_TYPE_JSON);
        assert_eq!(data.decode::<Tick>().unwrap(), Tick { seq: 7 });
    }

    #[test]
    fn decode_reports_malformed_payload() {
        let data = StreamData::new("application/json", b"{not json".to_vec());

        assert!(data.decode::<Tick>().is_err());
    }
}
