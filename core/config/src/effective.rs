// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use http::{HeaderName, HeaderValue};
use url::Url;

use crate::backoff::BackoffConfig;
use crate::component::configuration::Configuration;
use crate::errors::ConfigurationError;
use crate::fragment::{ClientFragment, LoggerLevel, MultiMap};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_FOLLOW_REDIRECTS: bool = true;

/// Fully resolved configuration of one client.
///
/// Built once at registration time and shared read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    /// Logical name of the client.
    pub name: String,
    pub url: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub follow_redirects: bool,
    pub default_headers: MultiMap,
    pub default_query: MultiMap,
    pub logger_level: LoggerLevel,
    pub contract: Option<String>,
    pub encoder: Option<String>,
    pub decoder: Option<String>,
    pub error_decoder: Option<String>,
    pub retryer: Option<String>,
    pub backoff: Option<BackoffConfig>,
    pub request_interceptors: Vec<String>,
    pub response_interceptor: Option<String>,
    /// `None` when the configuration names no capability at all.
    pub capabilities: Option<Vec<String>>,
    pub dismiss404: bool,
}

impl EffectiveConfig {
    /// Apply the hard-coded defaults to a merged fragment.
    pub fn from_fragment(name: &str, fragment: ClientFragment) -> Result<Self, ConfigurationError> {
        let url = fragment
            .url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ConfigurationError::MissingUrl {
                client: name.to_string(),
            })?;

        let config = EffectiveConfig {
            name: name.to_string(),
            url,
            connect_timeout: fragment
                .connect_timeout
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            read_timeout: fragment
                .read_timeout
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_READ_TIMEOUT),
            follow_redirects: fragment.follow_redirects.unwrap_or(DEFAULT_FOLLOW_REDIRECTS),
            default_headers: fragment.default_request_headers.unwrap_or_default(),
            default_query: fragment.default_query_parameters.unwrap_or_default(),
            logger_level: fragment.logger_level.unwrap_or_default(),
            contract: fragment.contract,
            encoder: fragment.encoder,
            decoder: fragment.decoder,
            error_decoder: fragment.error_decoder,
            retryer: fragment.retryer,
            backoff: fragment.backoff,
            request_interceptors: fragment.request_interceptors.unwrap_or_default(),
            response_interceptor: fragment.response_interceptor,
            capabilities: fragment.capabilities,
            dismiss404: fragment.dismiss404.unwrap_or(false),
        };

        config.validate()?;
        Ok(config)
    }

    /// The base url, parsed.
    pub fn base_url(&self) -> Result<Url, ConfigurationError> {
        Url::parse(&self.url).map_err(|e| ConfigurationError::InvalidUrl {
            client: self.name.clone(),
            url: self.url.clone(),
            reason: e.to_string(),
        })
    }

    /// Whether an explicit, non-empty capability list is configured.
    pub fn has_explicit_capabilities(&self) -> bool {
        self.capabilities.as_ref().is_some_and(|c| !c.is_empty())
    }
}

impl Configuration for EffectiveConfig {
    type Error = ConfigurationError;

    fn validate(&self) -> Result<(), Self::Error> {
        let url = self.base_url()?;
        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(ConfigurationError::InvalidUrl {
                client: self.name.clone(),
                url: self.url.clone(),
                reason: "expected an absolute http or https url".to_string(),
            });
        }

        if self.read_timeout.is_zero() {
            return Err(ConfigurationError::InvalidTimeout {
                client: self.name.clone(),
                field: "read_timeout",
            });
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigurationError::InvalidTimeout {
                client: self.name.clone(),
                field: "connect_timeout",
            });
        }

        for (name, values) in &self.default_headers {
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                ConfigurationError::InvalidHeader {
                    client: self.name.clone(),
                    name: name.clone(),
                    reason: e.to_string(),
                }
            })?;
            for value in values {
                HeaderValue::from_str(value).map_err(|e| ConfigurationError::InvalidHeader {
                    client: self.name.clone(),
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hard_coded_defaults() {
        let fragment = ClientFragment::default().with_url("http://localhost:8080");
        let config = EffectiveConfig::from_fragment("svc", fragment).expect("valid config");

        assert_eq!(config.connect_timeout, Duration::from_millis(10_000));
        assert_eq!(config.read_timeout, Duration::from_millis(30_000));
        assert!(config.follow_redirects);
        assert!(!config.dismiss404);
        assert_eq!(config.logger_level, LoggerLevel::None);
        assert!(config.retryer.is_none());
        assert!(config.backoff.is_none());
        assert!(config.request_interceptors.is_empty());
        assert!(!config.has_explicit_capabilities());
    }

    #[test]
    fn test_missing_and_empty_url() {
        let err = EffectiveConfig::from_fragment("svc", ClientFragment::default())
            .expect_err("url is required");
        assert_eq!(
            err,
            ConfigurationError::MissingUrl {
                client: "svc".to_string()
            }
        );

        let err = EffectiveConfig::from_fragment("svc", ClientFragment::default().with_url(""))
            .expect_err("empty url is not a url");
        assert!(matches!(err, ConfigurationError::MissingUrl { .. }));
    }

    #[test]
    fn test_invalid_url_and_headers() {
        let err = EffectiveConfig::from_fragment(
            "svc",
            ClientFragment::default().with_url("not a url"),
        )
        .expect_err("invalid url");
        assert!(matches!(err, ConfigurationError::InvalidUrl { .. }));

        let err = EffectiveConfig::from_fragment(
            "svc",
            ClientFragment::default().with_url("ftp://files.example.com"),
        )
        .expect_err("unsupported scheme");
        assert!(matches!(err, ConfigurationError::InvalidUrl { .. }));

        let err = EffectiveConfig::from_fragment(
            "svc",
            ClientFragment::default()
                .with_url("http://localhost")
                .with_default_header("bad header", "x"),
        )
        .expect_err("invalid header name");
        assert!(matches!(err, ConfigurationError::InvalidHeader { .. }));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = EffectiveConfig::from_fragment(
            "svc",
            ClientFragment::default()
                .with_url("http://localhost")
                .with_read_timeout(0),
        )
        .expect_err("zero read timeout");
        assert_eq!(
            err,
            ConfigurationError::InvalidTimeout {
                client: "svc".to_string(),
                field: "read_timeout"
            }
        );
    }
}
