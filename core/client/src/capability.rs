// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use courier_config::EffectiveConfig;

use crate::errors::CallError;
use crate::pipeline::{Call, Invoke};

/// Cross-cutting wrapper around the invoker chain of a client.
pub trait Capability: Send + Sync {
    fn enrich(&self, client: &EffectiveConfig, invoker: Arc<dyn Invoke>) -> Arc<dyn Invoke>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MetricsConfiguration {
    /// Attach [`MetricsCapability`] to clients that configure no capability.
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfiguration {
    fn default() -> Self {
        MetricsConfiguration {
            enabled: default_metrics_enabled(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

/// Records request count and duration of every call through the
/// OpenTelemetry metrics API.
#[derive(Clone)]
pub struct MetricsCapability {
    requests: Counter<u64>,
    duration: Histogram<f64>,
}

impl std::fmt::Debug for MetricsCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCapability").finish_non_exhaustive()
    }
}

impl Default for MetricsCapability {
    fn default() -> Self {
        MetricsCapability::new(&opentelemetry::global::meter("courier"))
    }
}

impl MetricsCapability {
    pub fn new(meter: &Meter) -> Self {
        MetricsCapability {
            requests: meter
                .u64_counter("courier.client.requests")
                .with_description("Calls issued by declarative clients")
                .build(),
            duration: meter
                .f64_histogram("courier.client.duration")
                .with_description("Duration of client calls, retries included")
                .with_unit("s")
                .build(),
        }
    }
}

impl Capability for MetricsCapability {
    fn enrich(&self, client: &EffectiveConfig, invoker: Arc<dyn Invoke>) -> Arc<dyn Invoke> {
        Arc::new(MeteredInvoker {
            client: client.name.clone(),
            inner: invoker,
            requests: self.requests.clone(),
            duration: self.duration.clone(),
        })
    }
}

struct MeteredInvoker {
    client: String,
    inner: Arc<dyn Invoke>,
    requests: Counter<u64>,
    duration: Histogram<f64>,
}

fn outcome(result: &Result<Value, CallError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(CallError::Remote(_)) => "remote_error",
        Err(CallError::ResourceExhausted(_)) => "resource_exhausted",
        Err(CallError::Transport(_)) => "transport_error",
        Err(_) => "error",
    }
}

#[async_trait]
impl Invoke for MeteredInvoker {
    async fn invoke(&self, call: Call) -> Result<Value, CallError> {
        let method = call.template.method_name().to_string();
        let started = Instant::now();

        let result = self.inner.invoke(call).await;

        let attributes = [
            KeyValue::new("client", self.client.clone()),
            KeyValue::new("method", method),
            KeyValue::new("outcome", outcome(&result)),
        ];
        self.requests.add(1, &attributes);
        self.duration
            .record(started.elapsed().as_secs_f64(), &attributes);

        result
    }
}
