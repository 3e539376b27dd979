// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Discovery, registration and publication of declared clients.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, error, info};

use courier_config::ClientProperties;

use crate::assembler::Assembler;
use crate::beans::BeanRegistry;
use crate::capability::{Capability, MetricsCapability, MetricsConfiguration};
use crate::codec::{Decoder, Encoder, JsonDecoder, JsonEncoder};
use crate::contract::{Contract, InterfaceDecl, RestContract};
use crate::error_mapper::{DefaultErrorMapper, ErrorMapper};
use crate::errors::{ClientRegistrationError, RegistrationError};
use crate::pipeline::Pipeline;
use crate::retry::{NeverRetry, RetryPolicy};
use crate::transport::{HttpTransport, ReqwestTransport};

/// Implemented by every type generated with [`remote_client!`](crate::remote_client).
pub trait ClientDeclaration: Send + Sync + 'static {
    /// Logical name used to look up configuration.
    const NAME: &'static str;

    fn declaration() -> InterfaceDecl;

    fn from_pipeline(pipeline: Pipeline) -> Self;
}

#[derive(Clone)]
struct DeclaredClient {
    type_id: TypeId,
    declaration: fn() -> InterfaceDecl,
    build: fn(Pipeline) -> Arc<dyn Any + Send + Sync>,
}

fn build_client<T: ClientDeclaration>(pipeline: Pipeline) -> Arc<dyn Any + Send + Sync> {
    Arc::new(T::from_pipeline(pipeline))
}

/// The set of client declarations known to the process.
#[derive(Clone, Default)]
pub struct ClientCatalog {
    entries: Vec<DeclaredClient>,
}

impl std::fmt::Debug for ClientCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCatalog")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl ClientCatalog {
    pub fn new() -> Self {
        ClientCatalog::default()
    }

    pub fn declare<T: ClientDeclaration>(mut self) -> Self {
        self.entries.push(DeclaredClient {
            type_id: TypeId::of::<T>(),
            declaration: T::declaration,
            build: build_client::<T>,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Namespaces (module paths) whose client declarations are registered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnableClients {
    namespaces: Option<Vec<String>>,
}

impl EnableClients {
    pub fn new<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EnableClients {
            namespaces: Some(namespaces.into_iter().map(Into::into).collect()),
        }
    }

    /// Every declaration of the catalog.
    pub fn all() -> Self {
        EnableClients { namespaces: None }
    }

    /// A namespace covers itself and every module nested in it.
    pub fn covers(&self, namespace: &str) -> bool {
        match &self.namespaces {
            None => true,
            Some(namespaces) => namespaces.iter().any(|ns| {
                namespace == ns
                    || namespace
                        .strip_prefix(ns.as_str())
                        .is_some_and(|rest| rest.starts_with("::"))
            }),
        }
    }
}

/// A published client.
#[derive(Clone)]
pub struct ClientRegistration {
    interface: String,
    namespace: String,
    client_name: String,
    pipeline: Pipeline,
    instance: Arc<dyn Any + Send + Sync>,
}

impl std::fmt::Debug for ClientRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistration")
            .field("interface", &self.interface)
            .field("namespace", &self.namespace)
            .field("client_name", &self.client_name)
            .finish()
    }
}

impl ClientRegistration {
    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// `namespace::Interface`, unique within a registry.
    pub fn qualified_name(&self) -> String {
        if self.namespace.is_empty() {
            self.interface.clone()
        } else {
            format!("{}::{}", self.namespace, self.interface)
        }
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn instance<T: ClientDeclaration>(&self) -> Option<Arc<T>> {
        self.instance.clone().downcast::<T>().ok()
    }
}

static GLOBAL_REGISTRY: OnceCell<ClientRegistry> = OnceCell::new();

/// Read-only map of published clients.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    by_type: HashMap<TypeId, ClientRegistration>,
    by_name: HashMap<String, TypeId>,
}

impl ClientRegistry {
    fn publish(&mut self, type_id: TypeId, registration: ClientRegistration) {
        self.by_name.insert(registration.qualified_name(), type_id);
        self.by_type.insert(type_id, registration);
    }

    pub fn get<T: ClientDeclaration>(&self) -> Option<Arc<T>> {
        self.by_type.get(&TypeId::of::<T>())?.instance::<T>()
    }

    /// Lookup by qualified interface name, or by bare interface name when
    /// exactly one published client carries it.
    pub fn get_by_name(&self, interface: &str) -> Option<&ClientRegistration> {
        if let Some(type_id) = self.by_name.get(interface) {
            return self.by_type.get(type_id);
        }

        let mut matching = self.by_type.values().filter(|r| r.interface == interface);
        match (matching.next(), matching.next()) {
            (Some(registration), None) => Some(registration),
            _ => None,
        }
    }

    /// Qualified names of the published clients, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    /// Publish `registry` for the whole process. Fails, handing the registry
    /// back, if one was already installed.
    pub fn install(registry: ClientRegistry) -> Result<&'static ClientRegistry, ClientRegistry> {
        GLOBAL_REGISTRY.set(registry)?;
        GLOBAL_REGISTRY.get().ok_or_else(ClientRegistry::default)
    }

    pub fn global() -> Option<&'static ClientRegistry> {
        GLOBAL_REGISTRY.get()
    }
}

/// Result of a registration run: the clients that could be built and the
/// failures of the others.
#[derive(Debug)]
pub struct RegistrationOutcome {
    pub registry: ClientRegistry,
    pub failures: Vec<ClientRegistrationError>,
}

impl RegistrationOutcome {
    /// Treat any failure as fatal.
    pub fn into_result(self) -> Result<ClientRegistry, Vec<ClientRegistrationError>> {
        if self.failures.is_empty() {
            Ok(self.registry)
        } else {
            Err(self.failures)
        }
    }
}

/// Drives configuration resolution and pipeline assembly for every
/// discovered declaration.
#[derive(Debug, Clone)]
pub struct Registrar {
    properties: ClientProperties,
    beans: BeanRegistry,
    enable: EnableClients,
    metrics: MetricsConfiguration,
}

impl Registrar {
    pub fn new(properties: ClientProperties) -> Self {
        Registrar {
            properties,
            beans: BeanRegistry::new(),
            enable: EnableClients::all(),
            metrics: MetricsConfiguration::default(),
        }
    }

    pub fn with_beans(self, beans: BeanRegistry) -> Self {
        Registrar { beans, ..self }
    }

    pub fn with_enable(self, enable: EnableClients) -> Self {
        Registrar { enable, ..self }
    }

    pub fn with_metrics(self, metrics: MetricsConfiguration) -> Self {
        Registrar { metrics, ..self }
    }

    /// Register every enabled declaration of `catalog`. A failing client
    /// never prevents the others from being published.
    pub fn register(&self, catalog: &ClientCatalog) -> RegistrationOutcome {
        let beans = auto_configure(self.beans.clone(), &self.metrics);
        let assembler = Assembler::new(&beans);

        let mut registry = ClientRegistry::default();
        let mut failures = Vec::new();
        let mut seen = HashSet::new();

        for entry in &catalog.entries {
            let declaration = (entry.declaration)();
            if !self.enable.covers(&declaration.namespace) {
                debug!(interface = %declaration.name, namespace = %declaration.namespace, "not enabled, skipped");
                continue;
            }
            if !seen.insert(entry.type_id) {
                debug!(interface = %declaration.name, "declared more than once, keeping the first");
                continue;
            }

            match self.build(&assembler, entry, &declaration) {
                Ok(registration) => {
                    info!(
                        interface = %declaration.name,
                        client = %declaration.client_name,
                        url = %registration.pipeline.config().url,
                        "client registered"
                    );
                    registry.publish(entry.type_id, registration);
                }
                Err(source) => {
                    error!(interface = %declaration.name, error = %source, "client registration failed");
                    failures.push(ClientRegistrationError {
                        client: declaration.name.clone(),
                        source,
                    });
                }
            }
        }

        RegistrationOutcome { registry, failures }
    }

    fn build(
        &self,
        assembler: &Assembler<'_>,
        entry: &DeclaredClient,
        declaration: &InterfaceDecl,
    ) -> Result<ClientRegistration, RegistrationError> {
        let config = self
            .properties
            .resolve(&declaration.client_name, declaration.url.as_deref())?;
        let pipeline = assembler.assemble(declaration, config)?;
        let instance = (entry.build)(pipeline.clone());

        Ok(ClientRegistration {
            interface: declaration.name.clone(),
            namespace: declaration.namespace.clone(),
            client_name: declaration.client_name.clone(),
            pipeline,
            instance,
        })
    }
}

/// Install the built-in collaborators the user did not provide.
pub fn auto_configure(mut beans: BeanRegistry, metrics: &MetricsConfiguration) -> BeanRegistry {
    beans.register_default_if_missing::<dyn Contract>(|| Arc::new(RestContract));
    beans.register_default_if_missing::<dyn Encoder>(|| Arc::new(JsonEncoder));
    beans.register_default_if_missing::<dyn Decoder>(|| Arc::new(JsonDecoder));
    beans.register_default_if_missing::<dyn ErrorMapper>(|| Arc::new(DefaultErrorMapper));
    beans.register_default_if_missing::<dyn RetryPolicy>(|| Arc::new(NeverRetry));
    beans.register_default_if_missing::<dyn HttpTransport>(|| Arc::new(ReqwestTransport::default()));
    if metrics.enabled {
        beans.register_default_if_missing::<dyn Capability>(|| Arc::new(MetricsCapability::default()));
    }
    beans
}
