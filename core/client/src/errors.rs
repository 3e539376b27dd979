// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use thiserror::Error;

use courier_config::ConfigurationError;

/// A method declaration that cannot be turned into a request template.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("{method_key}: more than one parameter is bound to the request body")]
    MultipleBodies { method_key: String },

    #[error("{method_key}: path placeholder {{{placeholder}}} has no matching path parameter")]
    UnboundPlaceholder {
        method_key: String,
        placeholder: String,
    },

    #[error("{method_key}: path parameter {param} does not appear in the path")]
    UnusedPathParameter { method_key: String, param: String },

    #[error("{method_key}: parameter {param} is declared twice")]
    DuplicateParameter { method_key: String, param: String },

    #[error("{method_key}: malformed path {path}: {reason}")]
    MalformedPath {
        method_key: String,
        path: String,
        reason: &'static str,
    },

    #[error("{method_key}: invalid header {name}: {reason}")]
    InvalidHeader {
        method_key: String,
        name: String,
        reason: String,
    },

    #[error("{interface}: method {method} is declared twice")]
    DuplicateMethod { interface: String, method: String },
}

/// Failure building a concrete request from a template and call arguments.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("missing argument {0}")]
    MissingArgument(String),

    #[error("cannot serialize argument {param}: {reason}")]
    Serialize { param: String, reason: String },

    #[error("argument {name} is not a valid header value: {reason}")]
    InvalidHeaderValue { name: String, reason: String },

    #[error("base url {0} cannot carry a path")]
    BaseUrl(String),

    #[error("cannot encode request body: {0}")]
    Body(String),
}

/// Failure materializing a response body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("cannot decode body into {type_name}: {reason}")]
    Body { type_name: String, reason: String },

    #[error("method returns {declared}, caller asked for {requested}")]
    TypeMismatch { declared: String, requested: String },
}

/// Transport level failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("timeout exceeded: {0}")]
    Timeout(String),

    #[error("i/o error: {0}")]
    Io(String),

    #[error("connection limits exceeded: {0}")]
    ResourceExhausted(String),
}

/// A non-success response mapped into a structured failure.
#[derive(Error, Debug, Clone)]
#[error("{method_key} failed with status {status}")]
pub struct RemoteError {
    pub status: u16,
    pub method_key: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Delay requested by the server through `Retry-After`.
    pub retry_after: Option<Duration>,
}

impl RemoteError {
    pub fn status_code(&self) -> Option<StatusCode> {
        StatusCode::from_u16(self.status).ok()
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Everything a generated client method can fail with.
#[derive(Error, Debug, Clone)]
pub enum CallError {
    #[error("transport failure: {0}")]
    Transport(TransportError),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("interceptor {name} failed: {reason}")]
    Interceptor { name: String, reason: String },

    #[error("client {client} has no method {method}")]
    UnknownMethod { client: String, method: String },

    #[error("call interrupted before completion: {0}")]
    Interrupted(String),
}

impl From<TransportError> for CallError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::ResourceExhausted(reason) => CallError::ResourceExhausted(reason),
            other => CallError::Transport(other),
        }
    }
}

impl CallError {
    /// Failures worth another attempt when a retry policy is configured.
    pub fn is_retryable(&self) -> bool {
        match self {
            CallError::Transport(_) | CallError::ResourceExhausted(_) => true,
            CallError::Remote(remote) => {
                remote.status == StatusCode::TOO_MANY_REQUESTS.as_u16()
                    || remote.status == StatusCode::SERVICE_UNAVAILABLE.as_u16()
                    || remote.retry_after.is_some()
            }
            _ => false,
        }
    }

    /// Delay requested by the remote side, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            CallError::Remote(remote) => remote.retry_after,
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            CallError::Remote(remote) => Some(remote.status),
            _ => None,
        }
    }
}

/// Failure registering a single client.
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error("no {kind} bean named {name}")]
    MissingBean { kind: &'static str, name: String },

    #[error("no default {0} bean registered")]
    MissingDefault(&'static str),
}

#[derive(Error, Debug)]
#[error("cannot register client {client}: {source}")]
pub struct ClientRegistrationError {
    pub client: String,
    #[source]
    pub source: RegistrationError,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(status: u16, retry_after: Option<Duration>) -> CallError {
        CallError::Remote(RemoteError {
            status,
            method_key: "Api#get".to_string(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            retry_after,
        })
    }

    #[test]
    fn test_resource_exhaustion_is_distinct() {
        let err: CallError = TransportError::ResourceExhausted("pending queue full".into()).into();
        assert!(matches!(err, CallError::ResourceExhausted(_)));

        let err: CallError = TransportError::Timeout("read".into()).into();
        assert!(matches!(err, CallError::Transport(TransportError::Timeout(_))));
    }

    #[test]
    fn test_retryable_failures() {
        assert!(CallError::from(TransportError::Connect("refused".into())).is_retryable());
        assert!(remote(503, None).is_retryable());
        assert!(remote(429, None).is_retryable());
        assert!(remote(500, Some(Duration::from_secs(1))).is_retryable());
        assert!(!remote(500, None).is_retryable());
        assert!(!remote(404, None).is_retryable());
        assert!(!CallError::Decode(DecodeError::Body {
            type_name: "u64".into(),
            reason: "eof".into()
        })
        .is_retryable());
    }
}
