// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use http::header::RETRY_AFTER;

use crate::errors::{CallError, RemoteError};
use crate::http::Response;

/// Maps a non-success response to the failure returned to the caller.
pub trait ErrorMapper: Send + Sync {
    fn map(&self, method_key: &str, response: &Response) -> CallError;
}

/// Produces a [`RemoteError`] carrying status, headers and body.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultErrorMapper;

impl ErrorMapper for DefaultErrorMapper {
    fn map(&self, method_key: &str, response: &Response) -> CallError {
        CallError::Remote(RemoteError {
            status: response.status.as_u16(),
            method_key: method_key.to_string(),
            headers: response.headers.clone(),
            body: response.body.clone(),
            retry_after: retry_after(response),
        })
    }
}

// only the delay-seconds form is understood
fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use http::{HeaderValue, StatusCode};

    use super::*;

    #[test]
    fn test_maps_status_and_body() {
        let response = Response::new(StatusCode::INTERNAL_SERVER_ERROR).with_body("boom");
        let err = DefaultErrorMapper.map("Api#call", &response);

        let CallError::Remote(remote) = err else {
            panic!("expected a remote error");
        };
        assert_eq!(remote.status, 500);
        assert_eq!(remote.method_key, "Api#call");
        assert_eq!(remote.body_text(), "boom");
        assert_eq!(remote.retry_after, None);
    }

    #[test]
    fn test_parses_retry_after_seconds() {
        let response = Response::new(StatusCode::SERVICE_UNAVAILABLE)
            .with_header(RETRY_AFTER, HeaderValue::from_static("3"));
        let err = DefaultErrorMapper.map("Api#call", &response);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));

        let response = Response::new(StatusCode::SERVICE_UNAVAILABLE).with_header(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(DefaultErrorMapper.map("Api#call", &response).retry_after(), None);
    }
}
