// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! The HTTP engine seen from the pipeline: a request goes in, a completion
//! handle comes out.

pub mod limits;
pub mod reqwest_transport;

use futures::future::BoxFuture;

use crate::errors::TransportError;
use crate::http::{Request, RequestOptions, Response};

pub use limits::ConnectionLimits;
pub use reqwest_transport::ReqwestTransport;

/// Eventual outcome of one exchange. Dropping the handle cancels the
/// exchange.
pub type CompletionHandle = BoxFuture<'static, Result<Response, TransportError>>;

pub trait HttpTransport: Send + Sync {
    fn execute(&self, request: Request, options: RequestOptions) -> CompletionHandle;
}
