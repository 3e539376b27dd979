// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Declarative HTTP clients.
//!
//! A remote service is declared with [`remote_client!`]. At startup a
//! [`Registrar`] resolves the configuration of every declared client,
//! assembles its [`Pipeline`] and publishes it in a [`ClientRegistry`].
//! Each generated method is a plain `async fn` whose only suspension point
//! is the network round trip, bridged by [`bridge::AsyncBridge`].

pub mod assembler;
pub mod beans;
pub mod bridge;
pub mod capability;
pub mod codec;
pub mod contract;
pub mod error_mapper;
pub mod errors;
pub mod http;
pub mod interceptor;
pub mod loader;
pub mod logging;
mod macros;
pub mod pipeline;
pub mod registry;
pub mod retry;
pub mod testutils;
pub mod transport;

pub use beans::BeanRegistry;
pub use errors::{CallError, ClientRegistrationError, RegistrationError};
pub use pipeline::Pipeline;
pub use registry::{
    ClientCatalog, ClientDeclaration, ClientRegistry, EnableClients, Registrar,
    RegistrationOutcome,
};
