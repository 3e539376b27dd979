// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Errors raised while resolving or validating a client configuration.
///
/// Any of these is fatal for the registration of the affected client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("no url configured for client '{client}'")]
    MissingUrl { client: String },

    #[error("invalid url '{url}' for client '{client}': {reason}")]
    InvalidUrl {
        client: String,
        url: String,
        reason: String,
    },

    #[error("invalid default header '{name}' for client '{client}': {reason}")]
    InvalidHeader {
        client: String,
        name: String,
        reason: String,
    },

    #[error("invalid timeout for client '{client}': {field} must be greater than zero")]
    InvalidTimeout { client: String, field: &'static str },
}
