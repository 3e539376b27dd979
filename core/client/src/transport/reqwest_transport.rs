// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::redirect::Policy;
use tracing::debug;

use super::limits::{ConnectionLimits, Limiter};
use super::{CompletionHandle, HttpTransport};
use crate::errors::TransportError;
use crate::http::{Request, RequestOptions, Response};

const MAX_REDIRECTS: usize = 10;

// connection level settings live on the reqwest client, so one client is
// kept per distinct combination
type ClientKey = (Duration, bool);

struct TransportInner {
    limits: ConnectionLimits,
    limiter: Limiter,
    clients: RwLock<HashMap<ClientKey, reqwest::Client>>,
}

/// Transport backed by `reqwest`, shared by every pipeline of the process.
#[derive(Clone)]
pub struct ReqwestTransport {
    inner: Arc<TransportInner>,
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("limits", &self.inner.limits)
            .field("clients", &self.inner.clients.read().len())
            .finish()
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        ReqwestTransport::new(ConnectionLimits::default())
    }
}

impl ReqwestTransport {
    pub fn new(limits: ConnectionLimits) -> Self {
        ReqwestTransport {
            inner: Arc::new(TransportInner {
                limiter: Limiter::new(&limits),
                limits,
                clients: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn limits(&self) -> &ConnectionLimits {
        &self.inner.limits
    }
}

impl TransportInner {
    fn client_for(&self, options: &RequestOptions) -> Result<reqwest::Client, TransportError> {
        let key = (options.connect_timeout, options.follow_redirects);
        if let Some(client) = self.clients.read().get(&key) {
            return Ok(client.clone());
        }

        let mut clients = self.clients.write();
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let redirect = if options.follow_redirects {
            Policy::limited(MAX_REDIRECTS)
        } else {
            Policy::none()
        };
        let client = reqwest::Client::builder()
            .connect_timeout(options.connect_timeout)
            .redirect(redirect)
            .pool_idle_timeout(self.limits.max_idle_time())
            .build()
            .map_err(|e| TransportError::Io(e.to_string()))?;

        debug!(
            connect_timeout = ?options.connect_timeout,
            follow_redirects = options.follow_redirects,
            "created http client"
        );
        clients.insert(key, client.clone());
        Ok(client)
    }

    async fn exchange(
        &self,
        request: Request,
        options: RequestOptions,
    ) -> Result<Response, TransportError> {
        let _permit = self.limiter.acquire().await?;
        let client = self.client_for(&options)?;

        // total deadline for the exchange, see RequestOptions::read_timeout
        let mut builder = client
            .request(request.method, request.url)
            .headers(request.headers)
            .timeout(options.read_timeout);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(map_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(map_error)?;

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

fn map_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Io(err.to_string())
    }
}

impl HttpTransport for ReqwestTransport {
    fn execute(&self, request: Request, options: RequestOptions) -> CompletionHandle {
        let inner = self.inner.clone();
        Box::pin(async move { inner.exchange(request, options).await })
    }
}
