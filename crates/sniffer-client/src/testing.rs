//! Scripted transport for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Version};
use parking_lot::Mutex;

use crate::body::Body;
use crate::client::{Request, Response, Transport};
use crate::error::{ClientError, Result};
use crate::interceptor::is_handled;

/// Canned response for one URL.
#[derive(Debug, Clone, Default)]
pub(crate) struct Scripted {
    status: u16,
    headers: Vec<(&'static str, &'static str)>,
    chunks: Vec<Bytes>,
    chunk_delay: Option<Duration>,
    head_delay: Option<Duration>,
    fail_before_head: Option<String>,
    fail_after_chunks: Option<String>,
}

impl Scripted {
    pub(crate) fn ok(body: &str) -> Self {
        if body.is_empty() {
            return Self::ok_chunks(Vec::<&str>::new());
        }
        Self::ok_chunks([body])
    }

    pub(crate) fn ok_chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            status: 200,
            chunks: chunks
                .into_iter()
                .map(|c| Bytes::copy_from_slice(c.as_ref().as_bytes()))
                .collect(),
            ..Default::default()
        }
    }

    pub(crate) fn fail(message: &str) -> Self {
        Self {
            fail_before_head: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub(crate) fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub(crate) fn header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.push((name, value));
        self
    }

    pub(crate) fn chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    pub(crate) fn head_delay(mut self, delay: Duration) -> Self {
        self.head_delay = Some(delay);
        self
    }

    pub(crate) fn fail_after_chunks(mut self, message: &str) -> Self {
        self.fail_after_chunks = Some(message.to_string());
        self
    }
}

/// What the transport received.
#[derive(Debug, Clone)]
pub(crate) struct Seen {
    pub method: Method,
    pub uri: String,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub handled: bool,
}

#[derive(Default)]
struct Counters {
    heads_served: AtomicUsize,
    chunks_served: AtomicUsize,
    streams_dropped: AtomicUsize,
}

/// Transport answering from a route table. Unknown routes get a 404.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    routes: Mutex<HashMap<String, Scripted>>,
    seen: Mutex<Vec<Seen>>,
    counters: Arc<Counters>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn route(self: Arc<Self>, url: &str, script: Scripted) -> Arc<Self> {
        self.routes.lock().insert(url.to_string(), script);
        self
    }

    pub(crate) fn seen(&self) -> Vec<Seen> {
        self.seen.lock().clone()
    }

    pub(crate) fn heads_served(&self) -> usize {
        self.counters.heads_served.load(Ordering::SeqCst)
    }

    pub(crate) fn chunks_served(&self) -> usize {
        self.counters.chunks_served.load(Ordering::SeqCst)
    }

    /// Number of bodies dropped before they were read to the end.
    pub(crate) fn streams_dropped(&self) -> usize {
        self.counters.streams_dropped.load(Ordering::SeqCst)
    }
}

/// Counts a body as dropped unless it ran to completion.
struct DropGuard {
    counters: Arc<Counters>,
    finished: bool,
}

impl Drop for DropGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.counters.streams_dropped.fetch_add(1, Ordering::SeqCst);
        }
    }
}

struct BodyScript {
    chunks: VecDeque<Bytes>,
    delay: Option<Duration>,
    fail: Option<String>,
    guard: DropGuard,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        let uri = request.uri().to_string();
        self.seen.lock().push(Seen {
            method: request.method().clone(),
            uri: uri.clone(),
            version: request.version(),
            headers: request.headers().clone(),
            body: request.body().clone(),
            handled: is_handled(&request),
        });

        let script = self.routes.lock().get(&uri).cloned();
        let Some(script) = script else {
            let mut response = http::Response::new(Body::empty());
            *response.status_mut() = StatusCode::NOT_FOUND;
            return Ok(response);
        };

        if let Some(delay) = script.head_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = script.fail_before_head {
            return Err(ClientError::Transport(message));
        }

        let mut builder = http::Response::builder().status(script.status);
        for (name, value) in &script.headers {
            builder = builder.header(*name, *value);
        }

        let state = BodyScript {
            chunks: script.chunks.into_iter().collect(),
            delay: script.chunk_delay,
            fail: script.fail_after_chunks,
            guard: DropGuard {
                counters: Arc::clone(&self.counters),
                finished: false,
            },
        };
        let stream = futures::stream::unfold(state, |mut state| async move {
            if let Some(delay) = state.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(chunk) = state.chunks.pop_front() {
                state.guard.counters.chunks_served.fetch_add(1, Ordering::SeqCst);
                return Some((Ok(chunk), state));
            }
            if let Some(message) = state.fail.take() {
                return Some((Err(ClientError::Transport(message)), state));
            }
            state.guard.finished = true;
            None
        });

        self.counters.heads_served.fetch_add(1, Ordering::SeqCst);
        builder
            .body(Body::from_stream(stream))
            .map_err(|e| ClientError::Transport(e.to_string()))
    }
}
