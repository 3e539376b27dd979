// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Capture and restore of the ambient execution context.
//!
//! A call that leaves the caller's task (for example because the transport
//! completes on another thread) loses the task-local OpenTelemetry context
//! and the current tracing span. [`ContextSnapshot`] moves both across the
//! hop.

use opentelemetry::Context;
use tracing::Span;

/// Ambient context captured on the calling side of a thread hop.
///
/// Restoring consumes the snapshot, so it is applied at most once.
#[derive(Debug, Clone)]
pub struct ContextSnapshot {
    otel: Context,
    span: Span,
}

impl ContextSnapshot {
    /// Capture the context current on this thread.
    pub fn capture() -> Self {
        ContextSnapshot {
            otel: Context::current(),
            span: Span::current(),
        }
    }

    pub fn otel_context(&self) -> &Context {
        &self.otel
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Run `f` with the captured context installed, then put back whatever
    /// was current before.
    pub fn restore<R>(self, f: impl FnOnce() -> R) -> R {
        let _guard = self.otel.attach();
        self.span.in_scope(f)
    }
}

impl Default for ContextSnapshot {
    fn default() -> Self {
        ContextSnapshot::capture()
    }
}

#[cfg(test)]
mod tests {
    use opentelemetry::KeyValue;
    use opentelemetry::baggage::BaggageExt;
    use tracing::info;
    use tracing_test::traced_test;

    use super::*;

    fn baggage_value(key: &str) -> Option<String> {
        Context::current()
            .baggage()
            .get(key)
            .map(|value| value.to_string())
    }

    #[test]
    fn test_baggage_survives_thread_hop() {
        let cx = Context::current_with_baggage(vec![KeyValue::new("tenant", "acme")]);
        let snapshot = {
            let _guard = cx.attach();
            ContextSnapshot::capture()
        };

        // nothing leaks into the capturing thread once the guard is gone
        assert_eq!(baggage_value("tenant"), None);

        let observed = std::thread::spawn(move || {
            let before = baggage_value("tenant");
            let inside = snapshot.restore(|| baggage_value("tenant"));
            let after = baggage_value("tenant");
            (before, inside, after)
        })
        .join()
        .expect("thread completes");

        assert_eq!(observed, (None, Some("acme".to_string()), None));
    }

    #[test]
    #[traced_test]
    fn test_span_survives_thread_hop() {
        let span = tracing::info_span!("outgoing_call", client = "svc-a");
        let snapshot = span.in_scope(ContextSnapshot::capture);

        let name = std::thread::spawn(move || {
            snapshot.restore(|| {
                info!("decoding response");
                Span::current().metadata().map(|m| m.name())
            })
        })
        .join()
        .expect("thread completes");

        assert_eq!(name, Some("outgoing_call"));
        assert!(logs_contain("decoding response"));
        assert!(logs_contain("svc-a"));
    }

    #[test]
    fn test_restore_returns_closure_value() {
        let snapshot = ContextSnapshot::capture();
        assert_eq!(snapshot.restore(|| 21 * 2), 42);
    }
}
