// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use duration_string::DurationString;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio_retry::strategy::jitter;

use super::{Strategy, default_max_attempts};

/// Delays grow geometrically from `initial_delay` and are capped at
/// `max_delay`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(default)]
pub struct Config {
    /// Delay before the first retry.
    #[schemars(with = "String")]
    initial_delay: DurationString,

    /// Growth factor applied after each retry.
    multiplier: u32,

    #[schemars(with = "String")]
    max_delay: DurationString,

    #[serde(default = "default_max_attempts")]
    max_attempts: usize,

    /// Randomize every delay in `[0, delay)`.
    jitter: bool,
}

impl Config {
    pub fn new(
        initial_delay: Duration,
        multiplier: u32,
        max_delay: Duration,
        max_attempts: usize,
        jitter: bool,
    ) -> Self {
        Config {
            initial_delay: initial_delay.into(),
            multiplier,
            max_delay: max_delay.into(),
            max_attempts,
            jitter,
        }
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay.into()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            initial_delay: Duration::from_millis(100).into(),
            multiplier: 2,
            max_delay: Duration::from_secs(1).into(),
            max_attempts: default_max_attempts(),
            jitter: true,
        }
    }
}

impl Strategy for Config {
    fn get_strategy(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        let max_delay: Duration = self.max_delay.into();
        let multiplier = self.multiplier.max(1);
        let randomize = self.jitter;

        let delays = std::iter::successors(Some(self.initial_delay.into()), move |d: &Duration| {
            Some(d.saturating_mul(multiplier).min(max_delay))
        })
        .map(move |d: Duration| d.min(max_delay))
        .take(self.max_attempts);

        Box::new(delays.map(move |d| if randomize { jitter(d) } else { d }))
    }
}
