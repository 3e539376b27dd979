// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use http::{HeaderMap, HeaderName, HeaderValue};
use opentelemetry::Context;
use opentelemetry::propagation::{Injector, TextMapPropagator};
use serde_json::Value;

use courier_config::ConfigurationError;
use courier_config::fragment::MultiMap;

use crate::contract::OutgoingRequest;
use crate::errors::CallError;
use crate::http::Response;

/// Runs on every outgoing request, in configured order, before dispatch.
pub trait RequestInterceptor: Send + Sync {
    fn apply(&self, request: &mut OutgoingRequest) -> Result<(), CallError>;
}

/// Runs on the decoded value of a successful response, before the caller
/// resumes.
pub trait ResponseInterceptor: Send + Sync {
    fn after_decode(&self, response: &Response, value: Value) -> Result<Value, CallError>;
}

/// Appends the configured default headers. Values already set by the method
/// are kept.
#[derive(Debug, Clone)]
pub struct AddHeadersInterceptor {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl AddHeadersInterceptor {
    pub fn try_new(client: &str, headers: &MultiMap) -> Result<Self, ConfigurationError> {
        let invalid = |name: &str, reason: String| ConfigurationError::InvalidHeader {
            client: client.to_string(),
            name: name.to_string(),
            reason,
        };

        let mut parsed = Vec::new();
        for (name, values) in headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(name, e.to_string()))?;
            for value in values {
                let header_value =
                    HeaderValue::from_str(value).map_err(|e| invalid(name, e.to_string()))?;
                parsed.push((header_name.clone(), header_value));
            }
        }

        Ok(AddHeadersInterceptor { headers: parsed })
    }
}

impl RequestInterceptor for AddHeadersInterceptor {
    fn apply(&self, request: &mut OutgoingRequest) -> Result<(), CallError> {
        for (name, value) in &self.headers {
            request.append_header(name.clone(), value.clone());
        }
        Ok(())
    }
}

/// Appends the configured default query parameters.
#[derive(Debug, Clone)]
pub struct AddQueryInterceptor {
    pairs: Vec<(String, String)>,
}

impl AddQueryInterceptor {
    pub fn new(query: &MultiMap) -> Self {
        let pairs = query
            .iter()
            .flat_map(|(key, values)| values.iter().map(move |v| (key.clone(), v.clone())))
            .collect();
        AddQueryInterceptor { pairs }
    }
}

impl RequestInterceptor for AddQueryInterceptor {
    fn apply(&self, request: &mut OutgoingRequest) -> Result<(), CallError> {
        for (key, value) in &self.pairs {
            request.append_query(key, value);
        }
        Ok(())
    }
}

struct HeaderInjector<'a>(&'a mut HeaderMap);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            self.0.insert(name, value);
        }
    }
}

/// Writes the current OpenTelemetry context (trace parent, baggage) into the
/// request headers.
#[derive(Clone, Default)]
pub struct PropagationInterceptor {
    propagator: Option<Arc<dyn TextMapPropagator + Send + Sync>>,
}

impl PropagationInterceptor {
    /// Uses the globally installed propagator.
    pub fn new() -> Self {
        PropagationInterceptor::default()
    }

    pub fn with_propagator(propagator: Arc<dyn TextMapPropagator + Send + Sync>) -> Self {
        PropagationInterceptor {
            propagator: Some(propagator),
        }
    }
}

impl std::fmt::Debug for PropagationInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropagationInterceptor")
            .field("global", &self.propagator.is_none())
            .finish()
    }
}

impl RequestInterceptor for PropagationInterceptor {
    fn apply(&self, request: &mut OutgoingRequest) -> Result<(), CallError> {
        let cx = Context::current();
        let mut injector = HeaderInjector(&mut request.headers);
        match &self.propagator {
            Some(propagator) => propagator.inject_context(&cx, &mut injector),
            None => opentelemetry::global::get_text_map_propagator(|propagator| {
                propagator.inject_context(&cx, &mut injector)
            }),
        }
        Ok(())
    }
}
