// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use super::{PayloadCheck, TypeRef};
use crate::errors::{DecodeError, EncodeError};
use crate::http::Request;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PathPart {
    Literal(String),
    Placeholder(String),
}

/// One `/`-separated piece of the path, possibly mixing literals and
/// placeholders (`{name}.json`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Segment {
    pub(crate) parts: Vec<PathPart>,
}

/// Immutable, per-method recipe for building requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTemplate {
    pub(crate) method_key: String,
    pub(crate) method_name: String,
    pub(crate) verb: Method,
    pub(crate) segments: Vec<Segment>,
    /// (placeholder, parameter name)
    pub(crate) path_params: Vec<(String, String)>,
    /// (query key, parameter name)
    pub(crate) query_params: Vec<(String, String)>,
    pub(crate) header_params: Vec<(HeaderName, String)>,
    pub(crate) headers: Vec<(HeaderName, HeaderValue)>,
    pub(crate) body: Option<(String, TypeRef)>,
    pub(crate) payload: TypeRef,
    pub(crate) payload_check: Option<PayloadCheck>,
}

impl RequestTemplate {
    /// `Interface#method`, used in logs and errors.
    pub fn method_key(&self) -> &str {
        &self.method_key
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn verb(&self) -> &Method {
        &self.verb
    }

    /// Declared result type, deferred wrappers removed.
    pub fn payload(&self) -> TypeRef {
        self.payload
    }

    /// Fails when `value` does not fit the declared payload type. Templates
    /// built without a check accept any value.
    pub fn check_payload(&self, value: &Value) -> Result<(), DecodeError> {
        match &self.payload_check {
            Some(check) => check.verify(value),
            None => Ok(()),
        }
    }

    pub fn body_type(&self) -> Option<TypeRef> {
        self.body.as_ref().map(|(_, type_ref)| *type_ref)
    }

    /// Build a request against `base` from the call arguments.
    ///
    /// The body, if any, is left as a JSON value for the encoder.
    pub fn resolve(&self, base: &Url, args: &Arguments) -> Result<OutgoingRequest, EncodeError> {
        let mut url = base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| EncodeError::BaseUrl(base.to_string()))?;
            path.pop_if_empty();
            for segment in &self.segments {
                let mut expanded = String::new();
                for part in &segment.parts {
                    match part {
                        PathPart::Literal(literal) => expanded.push_str(literal),
                        PathPart::Placeholder(key) => {
                            expanded.push_str(&self.path_value(key, args)?)
                        }
                    }
                }
                path.push(&expanded);
            }
        }

        let mut pairs = Vec::new();
        for (key, param) in &self.query_params {
            for value in scalars(args.require(param)?) {
                pairs.push((key.as_str(), value));
            }
        }
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            headers.append(name.clone(), value.clone());
        }
        for (name, param) in &self.header_params {
            for value in scalars(args.require(param)?) {
                let value =
                    HeaderValue::from_str(&value).map_err(|e| EncodeError::InvalidHeaderValue {
                        name: param.clone(),
                        reason: e.to_string(),
                    })?;
                headers.append(name.clone(), value);
            }
        }

        let body_value = match &self.body {
            Some((param, _)) => Some(args.require(param)?.clone()),
            None => None,
        };

        Ok(OutgoingRequest {
            method: self.verb.clone(),
            url,
            headers,
            body: None,
            body_value,
            body_type: self.body_type(),
        })
    }

    fn path_value(&self, key: &str, args: &Arguments) -> Result<String, EncodeError> {
        // placeholders were checked against path params when parsing
        let param = self
            .path_params
            .iter()
            .find(|(placeholder, _)| placeholder == key)
            .map(|(_, param)| param.as_str())
            .ok_or_else(|| EncodeError::MissingArgument(key.to_string()))?;

        let values = scalars(args.require(param)?);
        if values.is_empty() {
            return Err(EncodeError::MissingArgument(param.to_string()));
        }
        Ok(values.join(","))
    }
}

// arrays expand into one string per element, nulls vanish
fn scalars(value: &Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        other => vec![other.to_string()],
    }
}

/// Named call arguments, serialized to JSON values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: HashMap<String, Value>,
}

impl Arguments {
    pub fn new() -> Self {
        Arguments::default()
    }

    pub fn with<T: Serialize + ?Sized>(mut self, name: &str, value: &T) -> Result<Self, EncodeError> {
        let value = serde_json::to_value(value).map_err(|e| EncodeError::Serialize {
            param: name.to_string(),
            reason: e.to_string(),
        })?;
        self.values.insert(name.to_string(), value);
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    fn require(&self, name: &str) -> Result<&Value, EncodeError> {
        self.get(name)
            .ok_or_else(|| EncodeError::MissingArgument(name.to_string()))
    }
}

/// A request under construction, mutated by the encoder and the request
/// interceptors before it is handed to the transport.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    body_value: Option<Value>,
    body_type: Option<TypeRef>,
}

impl OutgoingRequest {
    pub fn new(method: Method, url: Url) -> Self {
        OutgoingRequest {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            body_value: None,
            body_type: None,
        }
    }

    pub fn with_body_value(self, value: Value) -> Self {
        OutgoingRequest {
            body_value: Some(value),
            ..self
        }
    }

    /// Body argument not yet encoded.
    pub fn body_value(&self) -> Option<&Value> {
        self.body_value.as_ref()
    }

    pub fn body_type(&self) -> Option<TypeRef> {
        self.body_type
    }

    /// Add a header value, keeping the values already present.
    pub fn append_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.append(name, value);
    }

    pub fn append_query(&mut self, key: &str, value: &str) {
        self.url.query_pairs_mut().append_pair(key, value);
    }

    pub fn into_request(self) -> Request {
        Request {
            method: self.method,
            url: self.url,
            headers: self.headers,
            body: self.body,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Serialize;

    use super::*;
    use crate::contract::{Contract, InterfaceDecl, MethodDecl, ParamDecl, RestContract, ReturnType};

    #[derive(Serialize)]
    struct Payload {
        field: String,
    }

    fn template(method: MethodDecl) -> RequestTemplate {
        let interface = InterfaceDecl::new("Api", "api").with_path_prefix("/v1");
        RestContract.parse(&interface, &method).expect("valid method")
    }

    fn base() -> Url {
        Url::parse("http://localhost:8080/base/").expect("valid url")
    }

    #[test]
    fn test_resolve_path_query_and_headers() {
        let template = template(
            MethodDecl::new("file", Method::GET, "/files/{name}.json", ReturnType::value::<()>())
                .with_param(ParamDecl::path::<String>("name", "name"))
                .with_param(ParamDecl::query::<Vec<u32>>("ids", "id"))
                .with_param(ParamDecl::query::<Option<bool>>("flag", "flag"))
                .with_param(ParamDecl::header::<String>("trace", "X-Trace"))
                .with_header("X-Trace", "static"),
        );

        let args = Arguments::new()
            .with("name", "a b/c")
            .and_then(|a| a.with("ids", &vec![1, 2]))
            .and_then(|a| a.with("flag", &None::<bool>))
            .and_then(|a| a.with("trace", "dynamic"))
            .expect("serializable");

        let request = template.resolve(&base(), &args).expect("resolvable");

        assert_eq!(
            request.url.as_str(),
            "http://localhost:8080/base/v1/files/a%20b%2Fc.json?id=1&id=2"
        );
        let traces: Vec<&str> = request
            .headers
            .get_all("x-trace")
            .iter()
            .map(|v| v.to_str().expect("ascii"))
            .collect();
        assert_eq!(traces, vec!["static", "dynamic"]);
        assert!(request.body_value().is_none());
    }

    #[test]
    fn test_resolve_body_and_missing_argument() {
        let template = template(
            MethodDecl::new("call", Method::POST, "/echo", ReturnType::value::<()>())
                .with_param(ParamDecl::body::<Payload>("body")),
        );

        let err = template
            .resolve(&base(), &Arguments::new())
            .expect_err("missing body");
        assert_eq!(err, EncodeError::MissingArgument("body".to_string()));

        let args = Arguments::new()
            .with(
                "body",
                &Payload {
                    field: "p".to_string(),
                },
            )
            .expect("serializable");
        let request = template.resolve(&base(), &args).expect("resolvable");
        assert_eq!(
            request.body_value(),
            Some(&serde_json::json!({ "field": "p" }))
        );
        assert_eq!(request.url.query(), None);
    }

    #[test]
    fn test_null_path_argument_is_missing() {
        let template = template(
            MethodDecl::new("item", Method::GET, "/items/{id}", ReturnType::value::<()>())
                .with_param(ParamDecl::path::<Option<u64>>("id", "id")),
        );
        let args = Arguments::new().with("id", &None::<u64>).expect("serializable");
        let err = template.resolve(&base(), &args).expect_err("null path");
        assert_eq!(err, EncodeError::MissingArgument("id".to_string()));
    }
}
