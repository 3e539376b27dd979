// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::backoff::BackoffConfig;

/// Multi-valued string map used for default headers and query parameters.
pub type MultiMap = BTreeMap<String, Vec<String>>;

/// How much of each exchange the pipeline logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoggerLevel {
    /// No logging.
    #[default]
    None,
    /// Request method and url, response status and elapsed time.
    Basic,
    /// Basic plus request and response headers.
    Headers,
    /// Headers plus bodies.
    Full,
}

/// A partially populated client configuration.
///
/// Every field is optional: `None` means "not set at this layer" and lets the
/// value of a lower layer show through when fragments are overlaid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct ClientFragment {
    /// Base url of the remote service.
    pub url: Option<String>,

    /// Connect timeout in milliseconds.
    pub connect_timeout: Option<u64>,

    /// Read timeout in milliseconds.
    pub read_timeout: Option<u64>,

    pub follow_redirects: Option<bool>,

    /// Headers added to every request of the client.
    pub default_request_headers: Option<MultiMap>,

    /// Query parameters added to every request of the client.
    pub default_query_parameters: Option<MultiMap>,

    pub logger_level: Option<LoggerLevel>,

    /// Bean names of the collaborators used by the pipeline.
    pub contract: Option<String>,
    pub encoder: Option<String>,
    pub decoder: Option<String>,
    pub error_decoder: Option<String>,
    pub retryer: Option<String>,

    /// Inline retry schedule, used when no `retryer` bean is named.
    pub backoff: Option<BackoffConfig>,

    pub request_interceptors: Option<Vec<String>>,
    pub response_interceptor: Option<String>,
    pub capabilities: Option<Vec<String>>,

    /// Treat 404 responses as successful and decode their body.
    pub dismiss404: Option<bool>,
}

/// Field-level merge of partially populated configuration structs.
pub trait Overlay {
    /// Copy every field that is set in `other` into `self`. Fields that are
    /// unset in `other` keep their current value.
    fn overlay(&mut self, other: &Self);

    /// Non-destructive variant of [`Overlay::overlay`].
    fn overlaid(&self, other: &Self) -> Self
    where
        Self: Clone,
    {
        let mut merged = self.clone();
        merged.overlay(other);
        merged
    }
}

macro_rules! overlay_fields {
    ($target:expr, $source:expr, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = &$source.$field {
                $target.$field = Some(value.clone());
            }
        )+
    };
}

impl Overlay for ClientFragment {
    fn overlay(&mut self, other: &Self) {
        overlay_fields!(
            self,
            other,
            url,
            connect_timeout,
            read_timeout,
            follow_redirects,
            default_request_headers,
            default_query_parameters,
            logger_level,
            contract,
            encoder,
            decoder,
            error_decoder,
            retryer,
            backoff,
            request_interceptors,
            response_interceptor,
            capabilities,
            dismiss404,
        );
    }
}

impl ClientFragment {
    pub fn with_url(self, url: &str) -> Self {
        ClientFragment {
            url: Some(url.to_string()),
            ..self
        }
    }

    pub fn with_connect_timeout(self, millis: u64) -> Self {
        ClientFragment {
            connect_timeout: Some(millis),
            ..self
        }
    }

    pub fn with_read_timeout(self, millis: u64) -> Self {
        ClientFragment {
            read_timeout: Some(millis),
            ..self
        }
    }

    pub fn with_follow_redirects(self, follow_redirects: bool) -> Self {
        ClientFragment {
            follow_redirects: Some(follow_redirects),
            ..self
        }
    }

    pub fn with_default_header(mut self, name: &str, value: &str) -> Self {
        self.default_request_headers
            .get_or_insert_with(MultiMap::new)
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
        self
    }

    pub fn with_default_query(mut self, name: &str, value: &str) -> Self {
        self.default_query_parameters
            .get_or_insert_with(MultiMap::new)
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
        self
    }

    pub fn with_logger_level(self, logger_level: LoggerLevel) -> Self {
        ClientFragment {
            logger_level: Some(logger_level),
            ..self
        }
    }

    pub fn with_encoder(self, encoder: &str) -> Self {
        ClientFragment {
            encoder: Some(encoder.to_string()),
            ..self
        }
    }

    pub fn with_decoder(self, decoder: &str) -> Self {
        ClientFragment {
            decoder: Some(decoder.to_string()),
            ..self
        }
    }

    pub fn with_error_decoder(self, error_decoder: &str) -> Self {
        ClientFragment {
            error_decoder: Some(error_decoder.to_string()),
            ..self
        }
    }

    pub fn with_retryer(self, retryer: &str) -> Self {
        ClientFragment {
            retryer: Some(retryer.to_string()),
            ..self
        }
    }

    pub fn with_backoff(self, backoff: BackoffConfig) -> Self {
        ClientFragment {
            backoff: Some(backoff),
            ..self
        }
    }

    pub fn with_request_interceptors(self, interceptors: &[&str]) -> Self {
        ClientFragment {
            request_interceptors: Some(interceptors.iter().map(|s| s.to_string()).collect()),
            ..self
        }
    }

    pub fn with_response_interceptor(self, interceptor: &str) -> Self {
        ClientFragment {
            response_interceptor: Some(interceptor.to_string()),
            ..self
        }
    }

    pub fn with_capabilities(self, capabilities: &[&str]) -> Self {
        ClientFragment {
            capabilities: Some(capabilities.iter().map(|s| s.to_string()).collect()),
            ..self
        }
    }

    pub fn with_dismiss404(self, dismiss404: bool) -> Self {
        ClientFragment {
            dismiss404: Some(dismiss404),
            ..self
        }
    }
}
