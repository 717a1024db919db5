//! Forwarding engine.
//!
//! Re-issues an intercepted request, proxies every response event back to
//! the original caller, and records the exchange once it is over.
//!
//! ## Flow
//!
//! ```text
//! caller ──► forward() ──spawn──► drive task
//!   ▲                               │ client.execute(request + Handled)
//!   │  head (oneshot)               ▼
//!   ├────────────────────────── response head
//!   │  chunks (unbounded mpsc)      │ append to exchange buffer
//!   ├────────────────────────── body chunks, in network order
//!   │  end / error                  │
//!   ├────────────────────────── finish
//!   │                               ▼
//!   │                          store.insert(record)
//! ```
//!
//! The caller is always notified before the record is emitted. Dropping the
//! response head receiver or the body cancels the downstream request and no
//! record is emitted.

use std::sync::Arc;
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use http::HeaderMap;
use tokio::sync::{mpsc, oneshot};

use sniffer_core::{CaptureStore, HeaderFields, TrafficRecord};

use crate::body::Body;
use crate::client::{Client, Request, Response};
use crate::error::{ClientError, Result};
use crate::interceptor::mark_handled;

/// Lifecycle of one intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingState {
    /// Accepted but not started.
    Created,
    /// Downstream request in flight.
    Loading,
    /// Response fully received.
    Completed,
    /// Transport error before or during the response.
    Failed,
    /// The caller went away.
    Cancelled,
}

impl LoadingState {
    /// Returns true for states that end the exchange.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns true if the exchange in this state produces a record.
    pub fn emits_record(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn can_move_to(self, next: LoadingState) -> bool {
        match (self, next) {
            (Self::Created, Self::Loading) => true,
            (Self::Created, Self::Cancelled) => true,
            (Self::Loading, next) => next.is_terminal(),
            _ => false,
        }
    }
}

/// In-flight state of one exchange, owned by the task driving it.
#[derive(Debug)]
pub(crate) struct Exchange {
    state: LoadingState,
    started_at: DateTime<Utc>,
    started: Instant,
    method: String,
    url: String,
    request_headers: HeaderFields,
    request_body: Bytes,
    status: Option<u16>,
    response_headers: Option<HeaderFields>,
    received: BytesMut,
    error: Option<String>,
}

impl Exchange {
    pub(crate) fn new(request: &Request) -> Self {
        Self {
            state: LoadingState::Created,
            started_at: Utc::now(),
            started: Instant::now(),
            method: request.method().to_string(),
            url: request.uri().to_string(),
            request_headers: header_fields(request.headers()),
            request_body: request.body().clone(),
            status: None,
            response_headers: None,
            received: BytesMut::new(),
            error: None,
        }
    }

    pub(crate) fn state(&self) -> LoadingState {
        self.state
    }

    fn transition(&mut self, next: LoadingState) -> bool {
        if !self.state.can_move_to(next) {
            tracing::debug!("Ignoring {:?} -> {:?} for {}", self.state, next, self.url);
            return false;
        }
        self.state = next;
        true
    }

    pub(crate) fn start_loading(&mut self) {
        self.transition(LoadingState::Loading);
    }

    pub(crate) fn record_head(&mut self, status: u16, headers: &HeaderMap) {
        self.status = Some(status);
        self.response_headers = Some(header_fields(headers));
    }

    pub(crate) fn append(&mut self, chunk: &[u8]) {
        self.received.extend_from_slice(chunk);
    }

    pub(crate) fn complete(&mut self) {
        self.transition(LoadingState::Completed);
    }

    pub(crate) fn fail(&mut self, error: &ClientError) {
        if self.transition(LoadingState::Failed) {
            self.error = Some(error.to_string());
        }
    }

    pub(crate) fn cancel(&mut self) {
        if self.transition(LoadingState::Cancelled) {
            tracing::debug!("Cancelled {} {}", self.method, self.url);
        }
    }

    /// Builds the record. Returns `None` unless the exchange completed or
    /// failed.
    pub(crate) fn into_record(self) -> Option<TrafficRecord> {
        if !self.state.emits_record() {
            return None;
        }

        let mut builder = TrafficRecord::builder(self.method, self.url, self.started_at)
            .request_headers(self.request_headers)
            .request_body_bytes(&self.request_body)
            .response_body_bytes(&self.received)
            .duration(self.started.elapsed());

        if let Some(status) = self.status {
            builder = builder.status_code(status);
        }
        if let Some(headers) = self.response_headers {
            builder = builder.response_headers(headers);
        }
        if let Some(error) = self.error {
            builder = builder.error(error);
        }

        Some(builder.build())
    }
}

/// Converts a header map to name/value pairs, joining repeated headers.
pub(crate) fn header_fields(headers: &HeaderMap) -> HeaderFields {
    let mut fields = HeaderFields::new();
    for name in headers.keys() {
        let values: Vec<String> = headers
            .get_all(name)
            .iter()
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .collect();
        fields.insert(name.as_str().to_string(), values.join(", "));
    }
    fields
}

/// Forwards intercepted requests and records them into a store.
#[derive(Debug, Clone)]
pub struct Forwarder {
    store: Arc<CaptureStore>,
}

impl Forwarder {
    /// Creates a forwarder recording into `store`.
    pub fn new(store: Arc<CaptureStore>) -> Self {
        Self { store }
    }

    /// Re-issues `request` through `client` and proxies the response.
    ///
    /// The re-issued copy carries the handled marker so hooks on `client`
    /// let it through to the transport.
    pub async fn forward(&self, request: Request, client: Client) -> Result<Response> {
        let exchange = Exchange::new(&request);

        let mut downstream = request;
        mark_handled(&mut downstream);

        let (head_tx, head_rx) = oneshot::channel();
        tokio::spawn(drive(
            exchange,
            downstream,
            client,
            head_tx,
            Arc::clone(&self.store),
        ));

        head_rx.await.unwrap_or(Err(ClientError::Interrupted))
    }
}

async fn drive(
    mut exchange: Exchange,
    downstream: Request,
    client: Client,
    mut head_tx: oneshot::Sender<Result<Response>>,
    store: Arc<CaptureStore>,
) {
    exchange.start_loading();

    let outcome = tokio::select! {
        outcome = client.execute(downstream) => outcome,
        _ = head_tx.closed() => {
            exchange.cancel();
            return;
        }
    };

    let response = match outcome {
        Ok(response) => response,
        Err(error) => {
            tracing::warn!("{} {} failed: {}", exchange.method, exchange.url, error);
            exchange.fail(&error);
            let _ = head_tx.send(Err(error));
            emit(exchange, &store);
            return;
        }
    };

    let (parts, mut body) = response.into_parts();
    exchange.record_head(parts.status.as_u16(), &parts.headers);

    let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
    let head = http::Response::from_parts(parts, Body::from_receiver(chunk_rx));
    if head_tx.send(Ok(head)).is_err() {
        exchange.cancel();
        return;
    }

    loop {
        let next = tokio::select! {
            biased;
            _ = chunk_tx.closed() => {
                exchange.cancel();
                return;
            }
            next = body.chunk() => next,
        };

        match next {
            Ok(Some(chunk)) => {
                exchange.append(&chunk);
                if chunk_tx.send(Ok(chunk)).is_err() {
                    exchange.cancel();
                    return;
                }
            }
            Ok(None) => {
                exchange.complete();
                break;
            }
            Err(error) => {
                tracing::warn!("{} {} body failed: {}", exchange.method, exchange.url, error);
                exchange.fail(&error);
                let _ = chunk_tx.send(Err(error));
                break;
            }
        }
    }

    // Ends the caller's body before the record exists.
    drop(chunk_tx);
    emit(exchange, &store);
}

fn emit(exchange: Exchange, store: &CaptureStore) {
    if let Some(record) = exchange.into_record() {
        let record = store.insert(record);
        tracing::debug!("Recorded {}", record.summary());
    }
}
