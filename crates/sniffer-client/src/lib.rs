//! Sniffer Client - HTTP client with in-process traffic interception.
//!
//! This crate provides the client abstraction and the interception layer:
//!
//! - [`Client`]: hookable HTTP client, [`default_client`] for the
//!   process-wide configuration
//! - [`NetworkInterceptor`]: hook that applies the host filter and hands
//!   captured requests to the [`Forwarder`]
//! - [`Forwarder`]: re-issues the request, streams the response back to the
//!   caller and records the exchange
//! - [`NetworkSniffer`]: one-time process-wide setup and UI control surface
//!
//! ## Architecture
//!
//! ```text
//! caller ──► Client::execute
//!               │
//!               ├─ NetworkInterceptor::can_handle ── no ──► Transport (network)
//!               │        (marker? scheme? filter?)
//!               │ yes
//!               ▼
//!            Forwarder ── request + Handled ──► Client::execute ──► Transport
//!               │                                  (interceptor declines)
//!               ├── head, chunks, end/error ──► caller
//!               ▼
//!         CaptureStore::insert ──► StoreSubscription (presentation layer)
//! ```

#![warn(missing_docs)]

pub mod body;
pub mod client;
pub mod error;
pub mod forward;
pub mod interceptor;
pub mod network;
pub mod registry;
pub mod sniffer;

#[cfg(test)]
pub(crate) mod testing;

pub use body::Body;
pub use client::{
    build_request, default_client, Client, ClientBuilder, ProtocolHook, Request, Response,
    Transport,
};
pub use error::{ClientError, Result};
pub use forward::{Forwarder, LoadingState};
pub use interceptor::{is_handled, mark_handled, Handled, NetworkInterceptor, INTERCEPTOR_NAME};
pub use network::NetworkTransport;
pub use registry::{register_hook, registered_hooks, unregister_hook};
pub use sniffer::NetworkSniffer;

// Re-exported so callers need only one dependency.
pub use sniffer_core::{CaptureConfig, StoreEvent, StoreSubscription, TrafficRecord};
