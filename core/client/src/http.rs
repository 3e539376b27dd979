// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Plain request/response records exchanged with the transport.

use std::time::Duration;

use bytes::Bytes;
use url::Url;

pub use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};

use courier_config::EffectiveConfig;

/// A fully built request, ready to be sent.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Request {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

/// What came back from the remote side.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Response {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_body(self, body: impl Into<Bytes>) -> Self {
        Response {
            body: body.into(),
            ..self
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// 2xx, or 404 when `dismiss404` is set.
    pub fn is_success(&self, dismiss404: bool) -> bool {
        self.status.is_success() || (dismiss404 && self.status == StatusCode::NOT_FOUND)
    }
}

/// Per-request connection options handed to the transport with every
/// execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestOptions {
    pub connect_timeout: Duration,
    /// Deadline for the whole exchange, measured from sending the request
    /// until the response body is fully read. Connection setup counts
    /// against it too, so it is not a per-read idle timeout.
    pub read_timeout: Duration,
    pub follow_redirects: bool,
}

impl From<&EffectiveConfig> for RequestOptions {
    fn from(config: &EffectiveConfig) -> Self {
        RequestOptions {
            connect_timeout: config.connect_timeout,
            read_timeout: config.read_timeout,
            follow_redirects: config.follow_redirects,
        }
    }
}

impl Default for RequestOptions {
    fn default() -> Self {
        RequestOptions {
            connect_timeout: courier_config::effective::DEFAULT_CONNECT_TIMEOUT,
            read_timeout: courier_config::effective::DEFAULT_READ_TIMEOUT,
            follow_redirects: courier_config::effective::DEFAULT_FOLLOW_REDIRECTS,
        }
    }
}
