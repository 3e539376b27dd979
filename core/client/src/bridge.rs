// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Single suspension point between a generated client method and the
//! transport.
//!
//! The caller's task hands the request to the transport and parks on a
//! oneshot receiver. A completion task spawned on the runtime waits for the
//! transport, restores the caller's ambient context, decodes and checks the
//! payload against the declared type (or maps the error) and sends the
//! outcome back. Dropping the caller's future aborts
//! the completion task, which drops the transport future; decode and
//! resumption never run after that.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use courier_tracing::ContextSnapshot;

use crate::codec::Decoder;
use crate::contract::RequestTemplate;
use crate::error_mapper::ErrorMapper;
use crate::errors::{CallError, TransportError};
use crate::http::{Request, RequestOptions, Response};
use crate::interceptor::ResponseInterceptor;
use crate::logging::ExchangeLogger;
use crate::transport::HttpTransport;

struct BridgeInner {
    transport: Arc<dyn HttpTransport>,
    decoder: Arc<dyn Decoder>,
    error_mapper: Arc<dyn ErrorMapper>,
    response_interceptor: Option<Arc<dyn ResponseInterceptor>>,
    dismiss404: bool,
    logger: ExchangeLogger,
}

#[derive(Clone)]
pub struct AsyncBridge {
    inner: Arc<BridgeInner>,
}

impl std::fmt::Debug for AsyncBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncBridge")
            .field("dismiss404", &self.inner.dismiss404)
            .field(
                "response_interceptor",
                &self.inner.response_interceptor.is_some(),
            )
            .finish()
    }
}

// aborts the completion task when the caller goes away
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl AsyncBridge {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        decoder: Arc<dyn Decoder>,
        error_mapper: Arc<dyn ErrorMapper>,
    ) -> Self {
        AsyncBridge {
            inner: Arc::new(BridgeInner {
                transport,
                decoder,
                error_mapper,
                response_interceptor: None,
                dismiss404: false,
                logger: ExchangeLogger::default(),
            }),
        }
    }

    /// Rebuild with extra settings. Meant for assembly time, before the
    /// bridge is shared.
    pub fn with_settings(
        self,
        response_interceptor: Option<Arc<dyn ResponseInterceptor>>,
        dismiss404: bool,
        logger: ExchangeLogger,
    ) -> Self {
        AsyncBridge {
            inner: Arc::new(BridgeInner {
                transport: self.inner.transport.clone(),
                decoder: self.inner.decoder.clone(),
                error_mapper: self.inner.error_mapper.clone(),
                response_interceptor,
                dismiss404,
                logger,
            }),
        }
    }

    /// Execute `request` and resume with the decoded payload.
    pub async fn dispatch(
        &self,
        template: Arc<RequestTemplate>,
        request: Request,
        options: RequestOptions,
    ) -> Result<Value, CallError> {
        let snapshot = ContextSnapshot::capture();
        let started = Instant::now();
        let completion = self.inner.transport.execute(request, options);

        let (tx, rx) = oneshot::channel::<Result<Value, CallError>>();
        let inner = self.inner.clone();

        let task = tokio::spawn(async move {
            let mut tx = tx;
            let outcome = tokio::select! {
                biased;
                _ = tx.closed() => {
                    debug!(method = %template.method_key(), "caller went away, dropping exchange");
                    return;
                }
                outcome = completion => outcome,
            };

            if tx.is_closed() {
                warn!(method = %template.method_key(), "completion arrived after cancellation, discarded");
                return;
            }

            let result = snapshot.restore(|| inner.complete(&template, outcome, started));
            // the receiver may have gone in between, nothing left to resume
            let _ = tx.send(result);
        });
        let _abort = AbortOnDrop(task.abort_handle());

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(CallError::Interrupted(
                "completion task ended without an outcome".to_string(),
            )),
        }
    }
}

impl BridgeInner {
    fn complete(
        &self,
        template: &RequestTemplate,
        outcome: Result<Response, TransportError>,
        started: Instant,
    ) -> Result<Value, CallError> {
        let response = outcome?;
        self.logger
            .log_response(template.method_key(), &response, started.elapsed());

        if !response.is_success(self.dismiss404) {
            return Err(self.error_mapper.map(template.method_key(), &response));
        }

        let value = self.decoder.decode(&response, &template.payload())?;
        template.check_payload(&value)?;

        let Some(interceptor) = &self.response_interceptor else {
            return Ok(value);
        };
        // the interceptor may reshape the payload, it still has to fit
        let value = interceptor.after_decode(&response, value)?;
        template.check_payload(&value)?;
        Ok(value)
    }
}
