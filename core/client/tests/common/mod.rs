// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code)]

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use courier_client::capability::MetricsConfiguration;
use courier_client::testutils::StubTransport;
use courier_client::transport::HttpTransport;
use courier_client::{BeanRegistry, ClientCatalog, ClientRegistry, Registrar, remote_client};
use courier_config::{ClientFragment, ClientProperties};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub field: String,
}

impl Payload {
    pub fn new(field: &str) -> Self {
        Payload {
            field: field.to_string(),
        }
    }
}

remote_client! {
    /// Echo service used across the integration tests.
    pub client Remote("remote") {
        POST "/echo" => fn call(body payload: Payload) -> Payload;
        GET "/items/{id}" headers("X-Trace" = "method")
            => fn item(path id: u64, query("verbose") verbose: bool) -> serde_json::Value;
    }
}

remote_client! {
    pub client Other("other", path = "/other") {
        POST "/echo" => fn call(body payload: Payload) -> Payload;
    }
}

pub const STUB_URL: &str = "http://stub.local";

pub fn properties(remote: ClientFragment) -> ClientProperties {
    ClientProperties::new()
        .with_client("remote", remote.with_url(STUB_URL))
        .with_client("other", ClientFragment::default().with_url(STUB_URL))
}

pub fn beans_with(transport: &StubTransport) -> BeanRegistry {
    BeanRegistry::new().with_default::<dyn HttpTransport>(Arc::new(transport.clone()))
}

pub fn registrar(transport: &StubTransport, remote: ClientFragment) -> Registrar {
    Registrar::new(properties(remote))
        .with_beans(beans_with(transport))
        .with_metrics(MetricsConfiguration { enabled: false })
}

pub fn registry(transport: &StubTransport, remote: ClientFragment) -> ClientRegistry {
    registrar(transport, remote)
        .register(&ClientCatalog::new().declare::<Remote>().declare::<Other>())
        .into_result()
        .expect("every client registers")
}

pub fn remote(transport: &StubTransport, remote: ClientFragment) -> Arc<Remote> {
    registry(transport, remote)
        .get::<Remote>()
        .expect("remote is published")
}
