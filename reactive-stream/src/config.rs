/********************************************************************************
 * Copyright (c) 2025 Contributors to the Eclipse Foundation
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

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::path::Path;
use std::time::Duration;

/// Configuration handed to a [`SubscriptionService`](crate::SubscriptionService).
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SubscriptionServiceConfig {
    /// Local service identity sent as the source of every subscribe request.
    pub service_name: String,
    /// Demand sent once the remote acknowledges; unbounded when absent.
    #[serde(default)]
    pub prefetch: Option<u64>,
    /// Bound on transport resolution and on channel open; unbounded when absent.
    #[serde(default)]
    pub setup_timeout_ms: Option<u64>,
}

impl SubscriptionServiceConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            prefetch: None,
            setup_timeout_ms: None,
        }
    }

    pub fn with_prefetch(mut self, prefetch: u64) -> Self {
        self.prefetch = Some(prefetch);
        self
    }

    pub fn with_setup_timeout(mut self, timeout: Duration) -> Self {
        self.setup_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn from_json5(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = json5::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;
        Self::from_json5(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "service_name must not be empty".to_string(),
            ));
        }
        if self.prefetch == Some(0) {
            return Err(ConfigError::Invalid(
                "prefetch must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn initial_demand(&self) -> u64 {
        self.prefetch.unwrap_or(u64::MAX)
    }

    pub(crate) fn setup_timeout(&self) -> Option<Duration> {
        self.setup_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: String,
        source: std::io::Error,
    },
    Parse(String),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "unable to read config file {path}: {source}")
            }
            ConfigError::Parse(reason) => write!(f, "unable to parse config: {reason}"),
            ConfigError::Invalid(reason) => write!(f, "invalid config: {reason}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, SubscriptionServiceConfig};
    use std::time::Duration;

    #[test]
    fn json5_config_with_optional_fields() {
        let config = SubscriptionServiceConfig::from_json5(
            r#"{
                // local identity
                service_name: "billing",
                prefetch: 64,
                setup_timeout_ms: 2500,
            }"#,
        )
        .unwrap();

        assert_eq!(config.service_name, "billing");
        assert_eq!(config.initial_demand(), 64);
        assert_eq!(config.setup_timeout(), Some(Duration::from_millis(2500)));
    }

    #[test]
    fn defaults_are_unbounded() {
        let config = SubscriptionServiceConfig::from_json5(r#"{ service_name: "billing" }"#).unwrap();

        assert_eq!(config.initial_demand(), u64::MAX);
        assert_eq!(config.setup_timeout(), None);
    }

    #[test]
    fn oversized_setup_timeout_saturates() {
        let config = SubscriptionServiceConfig::new("billing").with_setup_timeout(Duration::MAX);

        assert_eq!(config.setup_timeout_ms, Some(u64::MAX));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result =
            SubscriptionServiceConfig::from_json5(r#"{ service_name: "billing", protocol: "x" }"#);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn empty_service_name_is_invalid() {
        let result = SubscriptionServiceConfig::from_json5(r#"{ service_name: "  " }"#);

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = SubscriptionServiceConfig::load("/nonexistent/reactive-stream.json5").unwrap_err();

        assert!(err.to_string().contains("/nonexistent/reactive-stream.json5"));
    }
}
