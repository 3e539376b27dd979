// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0
//
// ConfigLoader reads the configuration document once and exposes lazy,
// cached accessors for tracing, clients and metrics. The clients section is
// validated only when requested.

use std::collections::HashSet;

use lazy_static::lazy_static;
use serde_yaml::Value;
use thiserror::Error;
use tracing::{debug, warn};

use courier_config::ClientProperties;
use courier_tracing::TracingConfiguration;

use crate::capability::MetricsConfiguration;
use crate::registry::Registrar;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid configuration - impossible to parse yaml")]
    InvalidYaml,

    #[error("invalid configuration - key {0} not valid")]
    InvalidKey(String),

    #[error("invalid clients section: {0}")]
    InvalidClients(#[source] serde_yaml::Error),
}

lazy_static! {
    static ref CONFIG_KEYS: HashSet<&'static str> = ["tracing", "clients", "metrics"].into();
}

pub struct ConfigLoader {
    root: Value,
    tracing: Option<TracingConfiguration>,
    clients: Option<ClientProperties>,
    metrics: Option<MetricsConfiguration>,
}

impl std::fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigLoader")
            .field("tracing_loaded", &self.tracing.is_some())
            .field(
                "clients_count",
                &self.clients.as_ref().map(|c| c.config.len()),
            )
            .field("metrics_loaded", &self.metrics.is_some())
            .finish()
    }
}

impl ConfigLoader {
    pub fn new(file_path: &str) -> Result<Self, LoaderError> {
        let content = std::fs::read_to_string(file_path)
            .map_err(|e| LoaderError::NotFound(format!("{file_path}: {e}")))?;
        ConfigLoader::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, LoaderError> {
        let root: Value = serde_yaml::from_str(content).map_err(|_| LoaderError::InvalidYaml)?;

        // an empty document is an empty configuration
        let root = if root.is_null() {
            Value::Mapping(Default::default())
        } else {
            root
        };

        let mapping = root.as_mapping().ok_or(LoaderError::InvalidYaml)?;
        for key in mapping.keys() {
            let key = key.as_str().ok_or(LoaderError::InvalidYaml)?;
            if !CONFIG_KEYS.contains(key) {
                return Err(LoaderError::InvalidKey(key.to_string()));
            }
        }

        Ok(ConfigLoader {
            root,
            tracing: None,
            clients: None,
            metrics: None,
        })
    }

    /// Invalid tracing settings fall back to the defaults.
    pub fn tracing(&mut self) -> &TracingConfiguration {
        let root = &self.root;
        self.tracing.get_or_insert_with(|| {
            let cfg = section_or_default(root, "tracing");
            debug!(?cfg, "tracing configuration loaded");
            cfg
        })
    }

    /// Invalid metrics settings fall back to the defaults.
    pub fn metrics(&mut self) -> &MetricsConfiguration {
        let root = &self.root;
        self.metrics.get_or_insert_with(|| {
            let cfg = section_or_default(root, "metrics");
            debug!(?cfg, "metrics configuration loaded");
            cfg
        })
    }

    pub fn clients(&mut self) -> Result<&ClientProperties, LoaderError> {
        if self.clients.is_none() {
            let properties = match self.root.get("clients") {
                Some(section) => serde_yaml::from_value(section.clone())
                    .map_err(LoaderError::InvalidClients)?,
                None => ClientProperties::default(),
            };
            debug!(clients = properties.config.len(), "client configuration loaded");
            self.clients = Some(properties);
        }
        // populated just above
        self.clients
            .as_ref()
            .ok_or_else(|| LoaderError::NotFound("clients".to_string()))
    }

    /// A registrar fed with the clients and metrics sections.
    pub fn registrar(&mut self) -> Result<Registrar, LoaderError> {
        let properties = self.clients()?.clone();
        let metrics = self.metrics().clone();
        Ok(Registrar::new(properties).with_metrics(metrics))
    }
}

fn section_or_default<T>(root: &Value, key: &str) -> T
where
    T: serde::de::DeserializeOwned + Default + std::fmt::Debug,
{
    root.get(key)
        .cloned()
        .map(|v| {
            serde_yaml::from_value(v).unwrap_or_else(|e| {
                warn!(section = key, error = ?e, "invalid configuration section, using defaults");
                T::default()
            })
        })
        .unwrap_or_default()
}
