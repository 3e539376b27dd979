// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Layered configuration for declarative HTTP clients.
//!
//! A client is configured by two optional fragments: the *default* fragment,
//! shared by every client, and a *named* fragment keyed by the client's
//! logical name. [`ClientProperties::resolve`] overlays them field by field
//! on top of hard-coded defaults and produces one [`EffectiveConfig`].

pub mod backoff;
pub mod component;
pub mod effective;
pub mod errors;
pub mod fragment;
pub mod properties;

pub use backoff::{BackoffConfig, Strategy};
pub use effective::EffectiveConfig;
pub use errors::ConfigurationError;
pub use fragment::{ClientFragment, LoggerLevel, Overlay};
pub use properties::ClientProperties;
