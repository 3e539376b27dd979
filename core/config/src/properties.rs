// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::effective::EffectiveConfig;
use crate::errors::ConfigurationError;
use crate::fragment::{ClientFragment, Overlay};

/// The client section of the configuration source.
///
/// ```yaml
/// default_config: default
/// config:
///   default:
///     connect_timeout: 2000
///   svc-a:
///     url: http://svc-a:8080
///     read_timeout: 5000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ClientProperties {
    /// Name of the fragment applied to every client.
    #[serde(default = "default_config_name")]
    pub default_config: String,

    /// Fragments keyed by client logical name.
    pub config: HashMap<String, ClientFragment>,
}

impl Default for ClientProperties {
    fn default() -> Self {
        ClientProperties {
            default_config: default_config_name(),
            config: HashMap::new(),
        }
    }
}

fn default_config_name() -> String {
    "default".to_string()
}

impl ClientProperties {
    pub fn new() -> Self {
        ClientProperties::default()
    }

    pub fn with_default(mut self, fragment: ClientFragment) -> Self {
        self.config.insert(self.default_config.clone(), fragment);
        self
    }

    pub fn with_client(mut self, name: &str, fragment: ClientFragment) -> Self {
        self.config.insert(name.to_string(), fragment);
        self
    }

    /// The default fragment, if any.
    pub fn default_fragment(&self) -> Option<&ClientFragment> {
        self.config.get(&self.default_config)
    }

    /// The fragment configured for `name`, if any.
    pub fn fragment(&self, name: &str) -> Option<&ClientFragment> {
        self.config.get(name)
    }

    /// Resolve the effective configuration of the client `name`.
    ///
    /// Layers, lowest precedence first: hard-coded defaults, the default
    /// fragment, the named fragment, then `url_override` when non-empty.
    pub fn resolve(
        &self,
        name: &str,
        url_override: Option<&str>,
    ) -> Result<EffectiveConfig, ConfigurationError> {
        let mut merged = ClientFragment::default();

        if let Some(defaults) = self.default_fragment() {
            merged.overlay(defaults);
        }

        if name != self.default_config
            && let Some(named) = self.fragment(name)
        {
            merged.overlay(named);
        }

        if let Some(url) = url_override.filter(|url| !url.is_empty()) {
            merged.url = Some(url.to_string());
        }

        debug!(client = %name, url = ?merged.url, "resolved client configuration");

        EffectiveConfig::from_fragment(name, merged)
    }
}
