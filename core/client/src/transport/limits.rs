// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use duration_string::DurationString;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::errors::TransportError;

/// Bounds on the shared connection pool.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ConnectionLimits {
    /// Exchanges in flight at the same time.
    pub max_connections: usize,

    /// Exchanges allowed to wait for a free slot. Beyond this the call fails
    /// with a resource exhaustion error.
    pub max_pending: usize,

    /// Idle pooled connections are closed after this long.
    #[schemars(with = "String")]
    pub max_idle_time: DurationString,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        ConnectionLimits {
            max_connections: 2000,
            max_pending: 6100,
            max_idle_time: Duration::from_secs(10).into(),
        }
    }
}

impl ConnectionLimits {
    pub fn with_max_connections(self, max_connections: usize) -> Self {
        ConnectionLimits {
            max_connections,
            ..self
        }
    }

    pub fn with_max_pending(self, max_pending: usize) -> Self {
        ConnectionLimits {
            max_pending,
            ..self
        }
    }

    pub fn max_idle_time(&self) -> Duration {
        self.max_idle_time.into()
    }
}

/// Admission control in front of the connection pool.
#[derive(Debug)]
pub(crate) struct Limiter {
    permits: Arc<Semaphore>,
    pending: AtomicUsize,
    max_pending: usize,
}

struct PendingSlot<'a>(&'a AtomicUsize);

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Limiter {
    pub(crate) fn new(limits: &ConnectionLimits) -> Self {
        Limiter {
            permits: Arc::new(Semaphore::new(limits.max_connections)),
            pending: AtomicUsize::new(0),
            max_pending: limits.max_pending,
        }
    }

    /// Wait for a connection slot. The slot is released when the permit is
    /// dropped.
    pub(crate) async fn acquire(&self) -> Result<OwnedSemaphorePermit, TransportError> {
        if let Ok(permit) = self.permits.clone().try_acquire_owned() {
            return Ok(permit);
        }

        let queued = self.pending.fetch_add(1, Ordering::AcqRel);
        let _slot = PendingSlot(&self.pending);
        if queued >= self.max_pending {
            return Err(TransportError::ResourceExhausted(format!(
                "{} requests already waiting for a connection",
                queued
            )));
        }

        self.permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| TransportError::ResourceExhausted("connection pool closed".to_string()))
    }

    pub(crate) fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}
