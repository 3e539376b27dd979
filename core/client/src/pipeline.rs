// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use courier_config::EffectiveConfig;

use crate::bridge::AsyncBridge;
use crate::codec::Encoder;
use crate::contract::{Arguments, RequestTemplate};
use crate::errors::{CallError, DecodeError};
use crate::http::RequestOptions;
use crate::interceptor::RequestInterceptor;
use crate::logging::ExchangeLogger;
use crate::retry::RetryPolicy;

/// One invocation of a client method.
#[derive(Debug, Clone)]
pub struct Call {
    pub template: Arc<RequestTemplate>,
    pub args: Arguments,
}

/// A step of the invoker chain. Capabilities wrap the chain with their own
/// `Invoke` implementations.
#[async_trait]
pub trait Invoke: Send + Sync {
    async fn invoke(&self, call: Call) -> Result<Value, CallError>;
}

/// Innermost invoker: builds the request, runs the request interceptors and
/// retries the bridge according to the retry policy.
pub struct MethodHandler {
    pub(crate) base_url: Url,
    pub(crate) options: RequestOptions,
    pub(crate) encoder: Arc<dyn Encoder>,
    pub(crate) interceptors: Vec<Arc<dyn RequestInterceptor>>,
    pub(crate) retry: Arc<dyn RetryPolicy>,
    pub(crate) bridge: AsyncBridge,
    pub(crate) logger: ExchangeLogger,
}

#[async_trait]
impl Invoke for MethodHandler {
    async fn invoke(&self, call: Call) -> Result<Value, CallError> {
        let Call { template, args } = call;

        let mut outgoing = template.resolve(&self.base_url, &args)?;
        self.encoder.encode(&mut outgoing)?;
        for interceptor in &self.interceptors {
            interceptor.apply(&mut outgoing)?;
        }
        let request = outgoing.into_request();

        let mut delays = self.retry.backoff();
        let mut attempt = 1;
        loop {
            self.logger.log_request(template.method_key(), &request);
            let err = match self
                .bridge
                .dispatch(template.clone(), request.clone(), self.options)
                .await
            {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !self.retry.should_retry(&err) {
                return Err(err);
            }
            let Some(delay) = delays.next() else {
                debug!(method = %template.method_key(), attempt, "retries exhausted");
                return Err(err);
            };
            let delay = self.retry.next_delay(&err, delay);

            warn!(
                method = %template.method_key(),
                attempt,
                ?delay,
                error = %err,
                "call failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

struct PipelineInner {
    interface: String,
    config: Arc<EffectiveConfig>,
    templates: HashMap<String, Arc<RequestTemplate>>,
    invoker: Arc<dyn Invoke>,
}

/// The callable unit behind a generated client: dispatch table, effective
/// configuration and invoker chain. Cheap to clone.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<PipelineInner>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("interface", &self.inner.interface)
            .field("client", &self.inner.config.name)
            .field("methods", &self.method_names())
            .finish()
    }
}

impl Pipeline {
    pub(crate) fn new(
        interface: &str,
        config: EffectiveConfig,
        templates: Vec<RequestTemplate>,
        invoker: Arc<dyn Invoke>,
    ) -> Self {
        let templates = templates
            .into_iter()
            .map(|t| (t.method_name().to_string(), Arc::new(t)))
            .collect();

        Pipeline {
            inner: Arc::new(PipelineInner {
                interface: interface.to_string(),
                config: Arc::new(config),
                templates,
                invoker,
            }),
        }
    }

    pub fn interface(&self) -> &str {
        &self.inner.interface
    }

    pub fn config(&self) -> &EffectiveConfig {
        &self.inner.config
    }

    pub fn template(&self, method: &str) -> Option<&Arc<RequestTemplate>> {
        self.inner.templates.get(method)
    }

    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.inner.templates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Invoke `method` and convert the decoded payload into `T`, which must
    /// be the payload type the method declares.
    pub async fn invoke<T>(&self, method: &str, args: Arguments) -> Result<T, CallError>
    where
        T: DeserializeOwned + 'static,
    {
        let template = self
            .template(method)
            .cloned()
            .ok_or_else(|| CallError::UnknownMethod {
                client: self.inner.interface.clone(),
                method: method.to_string(),
            })?;

        let payload = template.payload();
        if !payload.is::<T>() {
            return Err(DecodeError::TypeMismatch {
                declared: payload.name().to_string(),
                requested: std::any::type_name::<T>().to_string(),
            }
            .into());
        }

        let value = self.inner.invoker.invoke(Call { template, args }).await?;
        serde_json::from_value(value).map_err(|e| {
            DecodeError::Body {
                type_name: payload.name().to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}
