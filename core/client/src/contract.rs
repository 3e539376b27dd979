// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Declarations of remote interfaces and their translation into request
//! templates.

pub mod template;

use std::any::TypeId;
use std::collections::HashSet;

use http::{HeaderName, HeaderValue, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::{ContractError, DecodeError};
pub use template::{Arguments, OutgoingRequest, RequestTemplate};
use template::{PathPart, Segment};

/// Identity of a Rust type, comparable at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeRef {
    name: &'static str,
    id: TypeId,
}

impl TypeRef {
    pub fn of<T: ?Sized + 'static>() -> Self {
        TypeRef {
            name: std::any::type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

/// Declared result of a method. Async methods wrap their payload in
/// `Deferred`, possibly more than once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnType {
    Value(TypeRef),
    Deferred(Box<ReturnType>),
}

impl ReturnType {
    pub fn value<T: ?Sized + 'static>() -> Self {
        ReturnType::Value(TypeRef::of::<T>())
    }

    pub fn deferred(inner: ReturnType) -> Self {
        ReturnType::Deferred(Box::new(inner))
    }

    /// The payload type with every deferred wrapper removed.
    pub fn payload(&self) -> TypeRef {
        let mut current = self;
        loop {
            match current {
                ReturnType::Value(type_ref) => return *type_ref,
                ReturnType::Deferred(inner) => current = inner,
            }
        }
    }
}

/// Verifies that a decoded value can be converted into the declared payload
/// type, so shape mismatches surface while the response is being decoded.
#[derive(Clone, Copy)]
pub struct PayloadCheck {
    type_name: &'static str,
    check: fn(&Value) -> Result<(), String>,
}

fn fits<T: DeserializeOwned>(value: &Value) -> Result<(), String> {
    T::deserialize(value).map(drop).map_err(|e| e.to_string())
}

impl PayloadCheck {
    pub fn of<T: DeserializeOwned + 'static>() -> Self {
        PayloadCheck {
            type_name: std::any::type_name::<T>(),
            check: fits::<T>,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn verify(&self, value: &Value) -> Result<(), DecodeError> {
        (self.check)(value).map_err(|reason| DecodeError::Body {
            type_name: self.type_name.to_string(),
            reason,
        })
    }
}

impl std::fmt::Debug for PayloadCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PayloadCheck").field(&self.type_name).finish()
    }
}

// checks are derived from the type, so the type name identifies them
impl PartialEq for PayloadCheck {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name
    }
}

impl Eq for PayloadCheck {}

/// Where a parameter goes in the outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// Expands the `{key}` placeholder of the path.
    Path(String),
    Query(String),
    Header(String),
    Body,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDecl {
    pub name: String,
    pub binding: Binding,
    pub type_ref: TypeRef,
}

impl ParamDecl {
    pub fn new(name: &str, binding: Binding, type_ref: TypeRef) -> Self {
        ParamDecl {
            name: name.to_string(),
            binding,
            type_ref,
        }
    }

    pub fn path<T: 'static>(name: &str, key: &str) -> Self {
        ParamDecl::new(name, Binding::Path(key.to_string()), TypeRef::of::<T>())
    }

    pub fn query<T: 'static>(name: &str, key: &str) -> Self {
        ParamDecl::new(name, Binding::Query(key.to_string()), TypeRef::of::<T>())
    }

    pub fn header<T: 'static>(name: &str, key: &str) -> Self {
        ParamDecl::new(name, Binding::Header(key.to_string()), TypeRef::of::<T>())
    }

    pub fn body<T: 'static>(name: &str) -> Self {
        ParamDecl::new(name, Binding::Body, TypeRef::of::<T>())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDecl {
    pub name: String,
    pub verb: Method,
    pub path: String,
    pub params: Vec<ParamDecl>,
    /// Static headers, in declaration order.
    pub headers: Vec<(String, String)>,
    pub returns: ReturnType,
    /// Shape check of the decoded payload, when the payload type is known to
    /// be deserializable.
    pub payload_check: Option<PayloadCheck>,
}

impl MethodDecl {
    pub fn new(name: &str, verb: Method, path: &str, returns: ReturnType) -> Self {
        MethodDecl {
            name: name.to_string(),
            verb,
            path: path.to_string(),
            params: Vec::new(),
            headers: Vec::new(),
            returns,
            payload_check: None,
        }
    }

    pub fn with_param(mut self, param: ParamDecl) -> Self {
        self.params.push(param);
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_payload_check(self, payload_check: PayloadCheck) -> Self {
        MethodDecl {
            payload_check: Some(payload_check),
            ..self
        }
    }
}

/// A remote interface as declared by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDecl {
    /// Type name of the declaring struct.
    pub name: String,
    /// Logical name used to look up configuration.
    pub client_name: String,
    /// Url given at declaration time, overrides configuration.
    pub url: Option<String>,
    pub path_prefix: String,
    /// Module path of the declaration, used by discovery.
    pub namespace: String,
    pub methods: Vec<MethodDecl>,
}

impl InterfaceDecl {
    pub fn new(name: &str, client_name: &str) -> Self {
        InterfaceDecl {
            name: name.to_string(),
            client_name: client_name.to_string(),
            url: None,
            path_prefix: String::new(),
            namespace: String::new(),
            methods: Vec::new(),
        }
    }

    pub fn with_url(self, url: &str) -> Self {
        InterfaceDecl {
            url: Some(url.to_string()),
            ..self
        }
    }

    pub fn with_path_prefix(self, path_prefix: &str) -> Self {
        InterfaceDecl {
            path_prefix: path_prefix.to_string(),
            ..self
        }
    }

    pub fn with_namespace(self, namespace: &str) -> Self {
        InterfaceDecl {
            namespace: namespace.to_string(),
            ..self
        }
    }

    pub fn with_method(mut self, method: MethodDecl) -> Self {
        self.methods.push(method);
        self
    }

    pub fn method_key(&self, method: &str) -> String {
        format!("{}#{}", self.name, method)
    }
}

/// Maps method declarations to request templates.
pub trait Contract: Send + Sync {
    fn parse(
        &self,
        interface: &InterfaceDecl,
        method: &MethodDecl,
    ) -> Result<RequestTemplate, ContractError>;

    /// Parse every method of `interface`. Method names must be unique.
    fn parse_all(&self, interface: &InterfaceDecl) -> Result<Vec<RequestTemplate>, ContractError> {
        let mut seen = HashSet::new();
        let mut templates = Vec::with_capacity(interface.methods.len());
        for method in &interface.methods {
            if !seen.insert(method.name.as_str()) {
                return Err(ContractError::DuplicateMethod {
                    interface: interface.name.clone(),
                    method: method.name.clone(),
                });
            }
            templates.push(self.parse(interface, method)?);
        }
        Ok(templates)
    }
}

/// Default contract: path, query, header and body bindings over a JSON
/// style payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct RestContract;

impl Contract for RestContract {
    fn parse(
        &self,
        interface: &InterfaceDecl,
        method: &MethodDecl,
    ) -> Result<RequestTemplate, ContractError> {
        let method_key = interface.method_key(&method.name);

        let mut names = HashSet::new();
        for param in &method.params {
            if !names.insert(param.name.as_str()) {
                return Err(ContractError::DuplicateParameter {
                    method_key,
                    param: param.name.clone(),
                });
            }
        }

        let mut bodies = method.params.iter().filter(|p| p.binding == Binding::Body);
        let body = bodies.next().map(|p| (p.name.clone(), p.type_ref));
        if bodies.next().is_some() {
            return Err(ContractError::MultipleBodies { method_key });
        }

        let full_path = join_paths(&interface.path_prefix, &method.path);
        let segments = parse_path(&method_key, &full_path)?;

        // every placeholder needs a path parameter and the other way around
        let placeholders: HashSet<&str> = segments
            .iter()
            .flat_map(|segment| segment.parts.iter())
            .filter_map(|part| match part {
                PathPart::Placeholder(key) => Some(key.as_str()),
                PathPart::Literal(_) => None,
            })
            .collect();

        let mut path_params = Vec::new();
        let mut query_params = Vec::new();
        let mut header_params = Vec::new();
        for param in &method.params {
            match &param.binding {
                Binding::Path(key) => {
                    if !placeholders.contains(key.as_str()) {
                        return Err(ContractError::UnusedPathParameter {
                            method_key,
                            param: param.name.clone(),
                        });
                    }
                    path_params.push((key.clone(), param.name.clone()));
                }
                Binding::Query(key) => query_params.push((key.clone(), param.name.clone())),
                Binding::Header(key) => {
                    let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                        ContractError::InvalidHeader {
                            method_key: method_key.clone(),
                            name: key.clone(),
                            reason: e.to_string(),
                        }
                    })?;
                    header_params.push((name, param.name.clone()));
                }
                Binding::Body => {}
            }
        }

        for placeholder in &placeholders {
            if !path_params.iter().any(|(key, _)| key == placeholder) {
                return Err(ContractError::UnboundPlaceholder {
                    method_key,
                    placeholder: placeholder.to_string(),
                });
            }
        }

        let mut headers = Vec::with_capacity(method.headers.len());
        for (name, value) in &method.headers {
            let invalid = |reason: String| ContractError::InvalidHeader {
                method_key: method_key.clone(),
                name: name.clone(),
                reason,
            };
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
            let header_value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
            headers.push((header_name, header_value));
        }

        Ok(RequestTemplate {
            method_key,
            method_name: method.name.clone(),
            verb: method.verb.clone(),
            segments,
            path_params,
            query_params,
            header_params,
            headers,
            body,
            payload: method.returns.payload(),
            payload_check: method.payload_check,
        })
    }
}

fn join_paths(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if prefix.is_empty() {
        format!("/{path}")
    } else if prefix.starts_with('/') {
        format!("{prefix}/{path}")
    } else {
        format!("/{prefix}/{path}")
    }
}

fn parse_path(method_key: &str, path: &str) -> Result<Vec<Segment>, ContractError> {
    let malformed = |reason: &'static str| ContractError::MalformedPath {
        method_key: method_key.to_string(),
        path: path.to_string(),
        reason,
    };

    let mut segments = Vec::new();
    for raw in path.split('/').filter(|s| !s.is_empty()) {
        let mut parts = Vec::new();
        let mut rest = raw;
        while !rest.is_empty() {
            match rest.find(['{', '}']) {
                None => {
                    parts.push(PathPart::Literal(rest.to_string()));
                    break;
                }
                Some(idx) if rest.as_bytes()[idx] == b'}' => {
                    return Err(malformed("closing brace without opening brace"));
                }
                Some(idx) => {
                    if idx > 0 {
                        parts.push(PathPart::Literal(rest[..idx].to_string()));
                    }
                    let after = &rest[idx + 1..];
                    let close = after.find('}').ok_or_else(|| malformed("unclosed brace"))?;
                    let key = &after[..close];
                    if key.is_empty() {
                        return Err(malformed("empty placeholder"));
                    }
                    if key.contains('{') {
                        return Err(malformed("nested brace"));
                    }
                    parts.push(PathPart::Placeholder(key.to_string()));
                    rest = &after[close + 1..];
                }
            }
        }
        segments.push(Segment { parts });
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Payload;
    #[derive(Debug)]
    struct Item;

    fn interface() -> InterfaceDecl {
        InterfaceDecl::new("ItemsApi", "items").with_path_prefix("/api")
    }

    fn get_item() -> MethodDecl {
        MethodDecl::new(
            "item",
            Method::GET,
            "/items/{id}",
            ReturnType::deferred(ReturnType::value::<Item>()),
        )
        .with_param(ParamDecl::path::<u64>("id", "id"))
        .with_param(ParamDecl::query::<bool>("verbose", "verbose"))
        .with_param(ParamDecl::header::<String>("request_id", "X-Request-Id"))
        .with_header("Accept", "application/json")
    }

    #[test]
    fn test_unwraps_nested_deferred_types() {
        let returns = ReturnType::deferred(ReturnType::deferred(ReturnType::value::<Payload>()));
        assert!(returns.payload().is::<Payload>());

        let template = RestContract
            .parse(&interface(), &get_item())
            .expect("valid method");
        assert!(template.payload().is::<Item>());
        assert_eq!(template.method_key(), "ItemsApi#item");
    }

    #[test]
    fn test_payload_check_travels_into_template() {
        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct Named {
            field: String,
        }

        let method = MethodDecl::new("call", Method::POST, "/echo", ReturnType::value::<Named>())
            .with_payload_check(PayloadCheck::of::<Named>());
        let template = RestContract.parse(&interface(), &method).expect("valid method");

        template
            .check_payload(&serde_json::json!({"field": "p"}))
            .expect("fits");
        let err = template
            .check_payload(&serde_json::json!({"unexpected": 1}))
            .expect_err("missing field");
        assert!(matches!(err, DecodeError::Body { .. }));

        // templates without a check accept anything
        let unchecked = RestContract.parse(&interface(), &get_item()).expect("valid");
        unchecked
            .check_payload(&serde_json::json!({"unexpected": 1}))
            .expect("unchecked");
    }

    #[test]
    fn test_parse_is_idempotent() {
        let first = RestContract.parse(&interface(), &get_item()).expect("valid");
        let second = RestContract.parse(&interface(), &get_item()).expect("valid");
        assert_eq!(first, second);
    }

    #[test]
    fn test_rejects_two_bodies() {
        let method = MethodDecl::new("call", Method::POST, "/echo", ReturnType::value::<Payload>())
            .with_param(ParamDecl::body::<Payload>("a"))
            .with_param(ParamDecl::body::<Payload>("b"));

        let err = RestContract.parse(&interface(), &method).expect_err("two bodies");
        assert_eq!(
            err,
            ContractError::MultipleBodies {
                method_key: "ItemsApi#call".to_string()
            }
        );
    }

    #[test]
    fn test_rejects_unbound_placeholder() {
        let method = MethodDecl::new(
            "item",
            Method::GET,
            "/items/{id}/parts/{part}",
            ReturnType::value::<Item>(),
        )
        .with_param(ParamDecl::path::<u64>("id", "id"));

        let err = RestContract.parse(&interface(), &method).expect_err("unbound");
        assert_eq!(
            err,
            ContractError::UnboundPlaceholder {
                method_key: "ItemsApi#item".to_string(),
                placeholder: "part".to_string()
            }
        );
    }

    #[test]
    fn test_rejects_unused_path_param_and_duplicates() {
        let method = MethodDecl::new("item", Method::GET, "/items", ReturnType::value::<Item>())
            .with_param(ParamDecl::path::<u64>("id", "id"));
        let err = RestContract.parse(&interface(), &method).expect_err("unused");
        assert!(matches!(err, ContractError::UnusedPathParameter { .. }));

        let method = MethodDecl::new("item", Method::GET, "/items", ReturnType::value::<Item>())
            .with_param(ParamDecl::query::<u64>("id", "a"))
            .with_param(ParamDecl::query::<u64>("id", "b"));
        let err = RestContract.parse(&interface(), &method).expect_err("duplicate");
        assert!(matches!(err, ContractError::DuplicateParameter { .. }));
    }

    #[test]
    fn test_rejects_malformed_paths_and_headers() {
        for path in ["/items/{id", "/items/id}", "/items/{}", "/items/{{id}}"] {
            let method = MethodDecl::new("item", Method::GET, path, ReturnType::value::<Item>());
            let err = RestContract.parse(&interface(), &method).expect_err(path);
            assert!(
                matches!(err, ContractError::MalformedPath { .. }),
                "{path}: {err:?}"
            );
        }

        let method = MethodDecl::new("item", Method::GET, "/items", ReturnType::value::<Item>())
            .with_header("Bad Header", "x");
        let err = RestContract.parse(&interface(), &method).expect_err("header");
        assert!(matches!(err, ContractError::InvalidHeader { .. }));
    }

    #[test]
    fn test_rejects_duplicate_methods() {
        let decl = interface().with_method(get_item()).with_method(get_item());
        let err = RestContract.parse_all(&decl).expect_err("duplicate method");
        assert_eq!(
            err,
            ContractError::DuplicateMethod {
                interface: "ItemsApi".to_string(),
                method: "item".to_string()
            }
        );
    }

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths("", "/echo"), "/echo");
        assert_eq!(join_paths("/api/", "/echo"), "/api/echo");
        assert_eq!(join_paths("api", "echo"), "/api/echo");
    }
}
