// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! In-memory transport for tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use http::StatusCode;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::errors::TransportError;
use crate::http::{Request, RequestOptions, Response};
use crate::transport::{CompletionHandle, HttpTransport};

#[derive(Debug, Clone)]
pub enum StubBehavior {
    /// 200 with the request body and headers sent back.
    Echo,
    /// Fixed status and body.
    Status(StatusCode, Bytes),
    /// A complete canned response, headers included.
    Reply(Response),
    /// Fails at the transport level.
    Fail(TransportError),
    /// Never completes.
    Pending,
}

// counts drops of in-flight exchanges
struct DropFlag(Arc<AtomicUsize>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct StubState {
    script: VecDeque<StubBehavior>,
    requests: Vec<(Request, RequestOptions)>,
}

/// Transport double with observable calls.
///
/// Scripted behaviors are consumed one per call, then `fallback` applies.
#[derive(Debug, Clone)]
pub struct StubTransport {
    fallback: StubBehavior,
    foreign_thread: bool,
    state: Arc<Mutex<StubState>>,
    calls: Arc<AtomicUsize>,
    dropped: Arc<AtomicUsize>,
}

impl StubTransport {
    pub fn new(fallback: StubBehavior) -> Self {
        StubTransport {
            fallback,
            foreign_thread: false,
            state: Arc::new(Mutex::new(StubState::default())),
            calls: Arc::new(AtomicUsize::new(0)),
            dropped: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn echo() -> Self {
        StubTransport::new(StubBehavior::Echo)
    }

    pub fn status(status: u16, body: &'static str) -> Self {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        StubTransport::new(StubBehavior::Status(status, Bytes::from_static(body.as_bytes())))
    }

    pub fn pending() -> Self {
        StubTransport::new(StubBehavior::Pending)
    }

    /// Complete every exchange from a freshly spawned OS thread.
    pub fn on_foreign_thread(self) -> Self {
        StubTransport {
            foreign_thread: true,
            ..self
        }
    }

    /// Behaviors used by the next calls, in order.
    pub fn with_script(self, script: Vec<StubBehavior>) -> Self {
        self.state.lock().script = script.into();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// In-flight exchanges dropped before or after completing.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(Request, RequestOptions)> {
        self.state.lock().requests.clone()
    }

    pub fn last_request(&self) -> Option<Request> {
        self.state.lock().requests.last().map(|(r, _)| r.clone())
    }

    fn respond(behavior: &StubBehavior, request: &Request) -> Option<Result<Response, TransportError>> {
        match behavior {
            StubBehavior::Echo => {
                let mut response = Response::new(StatusCode::OK);
                response.headers = request.headers.clone();
                response.body = request.body.clone().unwrap_or_default();
                Some(Ok(response))
            }
            StubBehavior::Status(status, body) => {
                Some(Ok(Response::new(*status).with_body(body.clone())))
            }
            StubBehavior::Reply(response) => Some(Ok(response.clone())),
            StubBehavior::Fail(err) => Some(Err(err.clone())),
            StubBehavior::Pending => None,
        }
    }
}

impl HttpTransport for StubTransport {
    fn execute(&self, request: Request, options: RequestOptions) -> CompletionHandle {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = {
            let mut state = self.state.lock();
            state.requests.push((request.clone(), options));
            state
                .script
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone())
        };

        let flag = DropFlag(self.dropped.clone());
        let outcome = StubTransport::respond(&behavior, &request);
        let foreign_thread = self.foreign_thread;

        Box::pin(async move {
            let _flag = flag;
            let Some(outcome) = outcome else {
                return std::future::pending().await;
            };

            if !foreign_thread {
                return outcome;
            }

            let (tx, rx) = oneshot::channel();
            std::thread::spawn(move || {
                let _ = tx.send(outcome);
            });
            rx.await
                .unwrap_or_else(|_| Err(TransportError::Io("stub thread vanished".to_string())))
        })
    }
}
