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

//! Decomposition of `scheme://targetService/streamPath[?k=v&...]` stream URLs.

use crate::error::SubscriptionError;
use std::collections::BTreeMap;
use url::Url;

/// Target of a subscription as named by its remote URL.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParsedTarget {
    pub target_service: String,
    pub stream_path: String,
    pub query_args: BTreeMap<String, String>,
}

pub struct StreamLocator;

impl StreamLocator {
    /// Splits a remote stream URL into target service, stream path and decoded query args.
    ///
    /// ```
    /// use reactive_stream::StreamLocator;
    ///
    /// let target = StreamLocator::parse("proto://orders/stream1?x=1").unwrap();
    /// assert_eq!(target.target_service, "orders");
    /// assert_eq!(target.stream_path, "/stream1");
    /// assert_eq!(target.query_args.get("x").map(String::as_str), Some("1"));
    /// ```
    pub fn parse(remote_url: &str) -> Result<ParsedTarget, SubscriptionError> {
        let invalid = |reason: String| SubscriptionError::InvalidUrl {
            url: remote_url.to_string(),
            reason,
        };

        let url = Url::parse(remote_url.trim()).map_err(|e| invalid(e.to_string()))?;

        let target_service = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| invalid("missing target service hostname".to_string()))?
            .to_string();

        let stream_path = url.path();
        if stream_path.is_empty() || stream_path == "/" {
            return Err(invalid("missing stream path".to_string()));
        }

        let query_args = url
            .query_pairs()
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        Ok(ParsedTarget {
            target_service,
            stream_path: stream_path.to_string(),
            query_args,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::StreamLocator;
    use crate::error::SubscriptionError;

    #[test]
    fn parse_splits_service_path_and_query() {
        let target = StreamLocator::parse("proto://orders/stream1?x=1&y=two").unwrap();

        assert_eq!(target.target_service, "orders");
        assert_eq!(target.stream_path, "/stream1");
        assert_eq!(target.query_args.len(), 2);
        assert_eq!(target.query_args["x"], "1");
        assert_eq!(target.query_args["y"], "two");
    }

    #[test]
    fn parse_without_query_yields_no_args() {
        let target = StreamLocator::parse("stream://billing/events/ledger").unwrap();

        assert_eq!(target.target_service, "billing");
        assert_eq!(target.stream_path, "/events/ledger");
        assert!(target.query_args.is_empty());
    }

    #[test]
    fn parse_decodes_query_components() {
        let target = StreamLocator::parse("proto://orders/s?name=a%20b&tag=x%26y").unwrap();

        assert_eq!(target.query_args["name"], "a b");
        assert_eq!(target.query_args["tag"], "x&y");
    }

    #[test]
    fn parse_rejects_text_that_is_not_a_url() {
        let err = StreamLocator::parse("not a url").unwrap_err();

        assert!(matches!(err, SubscriptionError::InvalidUrl { .. }));
    }

    #[test]
    fn parse_rejects_missing_hostname() {
        assert!(matches!(
            StreamLocator::parse("proto:///stream1"),
            Err(SubscriptionError::InvalidUrl { .. })
        ));
        assert!(matches!(
            StreamLocator::parse("proto:stream1"),
            Err(SubscriptionError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn parse_rejects_missing_stream_path() {
        let err = StreamLocator::parse("proto://orders").unwrap_err();

        assert!(err.to_string().contains("missing stream path"));
    }
}
