// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use tracing::debug;

use courier_config::EffectiveConfig;

use crate::beans::BeanRegistry;
use crate::bridge::AsyncBridge;
use crate::capability::Capability;
use crate::codec::{Decoder, Encoder};
use crate::contract::{Contract, InterfaceDecl};
use crate::error_mapper::ErrorMapper;
use crate::errors::RegistrationError;
use crate::http::RequestOptions;
use crate::interceptor::{
    AddHeadersInterceptor, AddQueryInterceptor, RequestInterceptor, ResponseInterceptor,
};
use crate::logging::ExchangeLogger;
use crate::pipeline::{Invoke, MethodHandler, Pipeline};
use crate::retry::{BackoffRetry, NeverRetry, RetryPolicy};
use crate::transport::HttpTransport;

/// Builds the pipeline of one interface from its effective configuration
/// and the registered beans.
#[derive(Debug, Clone, Copy)]
pub struct Assembler<'a> {
    beans: &'a BeanRegistry,
}

impl<'a> Assembler<'a> {
    pub fn new(beans: &'a BeanRegistry) -> Self {
        Assembler { beans }
    }

    pub fn assemble(
        &self,
        interface: &InterfaceDecl,
        config: EffectiveConfig,
    ) -> Result<Pipeline, RegistrationError> {
        let beans = self.beans;

        let contract = beans.require::<dyn Contract>("contract", config.contract.as_deref())?;
        let templates = contract.parse_all(interface)?;

        let encoder = beans.require::<dyn Encoder>("encoder", config.encoder.as_deref())?;
        let decoder = beans.require::<dyn Decoder>("decoder", config.decoder.as_deref())?;
        let error_mapper =
            beans.require::<dyn ErrorMapper>("error decoder", config.error_decoder.as_deref())?;
        let transport = beans.require::<dyn HttpTransport>("transport", None)?;
        let retry = self.retry_policy(&config)?;

        let mut interceptors = config
            .request_interceptors
            .iter()
            .map(|name| beans.require::<dyn RequestInterceptor>("request interceptor", Some(name)))
            .collect::<Result<Vec<_>, _>>()?;
        if !config.default_headers.is_empty() {
            interceptors.push(Arc::new(AddHeadersInterceptor::try_new(
                &config.name,
                &config.default_headers,
            )?));
        }
        if !config.default_query.is_empty() {
            interceptors.push(Arc::new(AddQueryInterceptor::new(&config.default_query)));
        }

        let response_interceptor = match &config.response_interceptor {
            Some(name) => Some(
                beans.require::<dyn ResponseInterceptor>("response interceptor", Some(name))?,
            ),
            None => None,
        };

        let logger = ExchangeLogger::new(config.logger_level);
        let bridge = AsyncBridge::new(transport, decoder, error_mapper).with_settings(
            response_interceptor,
            config.dismiss404,
            logger,
        );

        let handler = MethodHandler {
            base_url: config.base_url()?,
            options: RequestOptions::from(&config),
            encoder,
            interceptors,
            retry,
            bridge,
            logger,
        };

        // the first capability listed ends up outermost
        let mut invoker: Arc<dyn Invoke> = Arc::new(handler);
        for capability in self.capabilities(&config)?.iter().rev() {
            invoker = capability.enrich(&config, invoker);
        }

        debug!(
            interface = %interface.name,
            client = %config.name,
            methods = templates.len(),
            "assembled pipeline"
        );

        Ok(Pipeline::new(&interface.name, config, templates, invoker))
    }

    fn retry_policy(&self, config: &EffectiveConfig) -> Result<Arc<dyn RetryPolicy>, RegistrationError> {
        if let Some(name) = &config.retryer {
            return self.beans.require::<dyn RetryPolicy>("retryer", Some(name));
        }
        if let Some(backoff) = &config.backoff {
            return Ok(Arc::new(BackoffRetry::new(backoff.clone())));
        }
        Ok(self
            .beans
            .default_bean::<dyn RetryPolicy>()
            .unwrap_or_else(|| Arc::new(NeverRetry) as Arc<dyn RetryPolicy>))
    }

    /// An explicit list always wins. Without one, at most one ambient default
    /// capability is attached.
    fn capabilities(
        &self,
        config: &EffectiveConfig,
    ) -> Result<Vec<Arc<dyn Capability>>, RegistrationError> {
        match &config.capabilities {
            Some(names) if !names.is_empty() => names
                .iter()
                .map(|name| self.beans.require::<dyn Capability>("capability", Some(name)))
                .collect(),
            _ => Ok(self
                .beans
                .default_bean::<dyn Capability>()
                .into_iter()
                .collect()),
        }
    }
}
