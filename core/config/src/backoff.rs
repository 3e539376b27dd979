// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

pub mod exponential;
pub mod fixedinterval;

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use exponential::Config as ExponentialBackoff;
use fixedinterval::Config as FixedIntervalBackoff;

/// Produces the delays slept between consecutive attempts of a call. The
/// iterator length bounds the number of retries.
pub trait Strategy {
    fn get_strategy(&self) -> Box<dyn Iterator<Item = Duration> + Send>;
}

/// Retries performed by a call before giving up.
pub(crate) fn default_max_attempts() -> usize {
    4
}

/// Backoff schedule used when a client retries a failed call.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum BackoffConfig {
    Exponential(ExponentialBackoff),
    /// Same delay between every retry.
    FixedInterval(FixedIntervalBackoff),
}

impl BackoffConfig {
    pub fn new_exponential(
        initial_delay: Duration,
        multiplier: u32,
        max_delay: Duration,
        max_attempts: usize,
        jitter: bool,
    ) -> Self {
        BackoffConfig::Exponential(ExponentialBackoff::new(
            initial_delay,
            multiplier,
            max_delay,
            max_attempts,
            jitter,
        ))
    }

    pub fn new_fixed_interval(interval: Duration, max_attempts: usize) -> Self {
        BackoffConfig::FixedInterval(FixedIntervalBackoff::new(interval, max_attempts))
    }

    /// Longest delay the schedule can produce.
    pub fn max_delay(&self) -> Duration {
        match self {
            BackoffConfig::Exponential(b) => b.max_delay(),
            BackoffConfig::FixedInterval(b) => b.interval(),
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        BackoffConfig::Exponential(ExponentialBackoff::default())
    }
}

impl Strategy for BackoffConfig {
    fn get_strategy(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        match self {
            BackoffConfig::Exponential(b) => b.get_strategy(),
            BackoffConfig::FixedInterval(b) => b.get_strategy(),
        }
    }
}
