// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use http::HeaderMap;
use tracing::debug;

use courier_config::LoggerLevel;

use crate::http::{Request, Response};

/// Logs exchanges at the configured level of detail.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExchangeLogger {
    level: LoggerLevel,
}

impl ExchangeLogger {
    pub fn new(level: LoggerLevel) -> Self {
        ExchangeLogger { level }
    }

    pub fn level(&self) -> LoggerLevel {
        self.level
    }

    pub fn log_request(&self, method_key: &str, request: &Request) {
        match self.level {
            LoggerLevel::None => {}
            LoggerLevel::Basic => {
                debug!(method = %method_key, verb = %request.method, url = %request.url, "sending request")
            }
            LoggerLevel::Headers => debug!(
                method = %method_key,
                verb = %request.method,
                url = %request.url,
                headers = %render_headers(&request.headers),
                "sending request"
            ),
            LoggerLevel::Full => debug!(
                method = %method_key,
                verb = %request.method,
                url = %request.url,
                headers = %render_headers(&request.headers),
                body = %request.body.as_deref().map(String::from_utf8_lossy).unwrap_or_default(),
                "sending request"
            ),
        }
    }

    pub fn log_response(&self, method_key: &str, response: &Response, elapsed: Duration) {
        let elapsed_ms = elapsed.as_millis() as u64;
        match self.level {
            LoggerLevel::None => {}
            LoggerLevel::Basic => debug!(
                method = %method_key,
                status = response.status.as_u16(),
                elapsed_ms,
                "received response"
            ),
            LoggerLevel::Headers => debug!(
                method = %method_key,
                status = response.status.as_u16(),
                elapsed_ms,
                headers = %render_headers(&response.headers),
                "received response"
            ),
            LoggerLevel::Full => debug!(
                method = %method_key,
                status = response.status.as_u16(),
                elapsed_ms,
                headers = %render_headers(&response.headers),
                body = %String::from_utf8_lossy(&response.body),
                "received response"
            ),
        }
    }
}

fn render_headers(headers: &HeaderMap) -> String {
    headers
        .iter()
        .map(|(name, value)| format!("{}: {}", name, value.to_str().unwrap_or("<binary>")))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use http::{HeaderValue, Method, StatusCode};
    use tracing_test::traced_test;
    use url::Url;

    use super::*;

    fn request() -> Request {
        let mut request = Request::new(
            Method::POST,
            Url::parse("http://localhost/echo").expect("valid url"),
        );
        request
            .headers
            .insert("x-trace", HeaderValue::from_static("abc"));
        request.body = Some("payload-body".into());
        request
    }

    #[test]
    #[traced_test]
    fn test_none_logs_nothing() {
        ExchangeLogger::new(LoggerLevel::None).log_request("Api#call", &request());
        assert!(!logs_contain("sending request"));
    }

    #[test]
    #[traced_test]
    fn test_levels_add_detail() {
        ExchangeLogger::new(LoggerLevel::Basic).log_request("Api#basic", &request());
        assert!(logs_contain("Api#basic"));
        assert!(!logs_contain("x-trace: abc"));

        ExchangeLogger::new(LoggerLevel::Headers).log_request("Api#headers", &request());
        assert!(logs_contain("x-trace: abc"));
        assert!(!logs_contain("payload-body"));

        let response = Response::new(StatusCode::OK).with_body("response-body");
        ExchangeLogger::new(LoggerLevel::Full).log_request("Api#full", &request());
        ExchangeLogger::new(LoggerLevel::Full).log_response(
            "Api#full",
            &response,
            Duration::from_millis(3),
        );
        assert!(logs_contain("payload-body"));
        assert!(logs_contain("response-body"));
    }
}
