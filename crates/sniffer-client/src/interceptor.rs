//! Interception hook.
//!
//! [`NetworkInterceptor`] is the [`ProtocolHook`] that decides which requests
//! get recorded. Accepted requests are handed to the [`Forwarder`], which
//! re-issues them with the [`Handled`] marker attached so this hook declines
//! them on the second pass.

use std::sync::Arc;

use async_trait::async_trait;

use sniffer_core::{CaptureStore, HostFilter};

use crate::client::{Client, ProtocolHook, Request, Response};
use crate::error::Result;
use crate::forward::Forwarder;
use crate::registry;

/// Name under which the interceptor registers itself.
pub const INTERCEPTOR_NAME: &str = "sniffer.network-interceptor";

/// Request extension marking a request the interceptor already owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handled;

/// Returns true if `request` carries the handled marker.
pub fn is_handled(request: &Request) -> bool {
    request.extensions().get::<Handled>().is_some()
}

/// Attaches the handled marker to `request`.
pub fn mark_handled(request: &mut Request) {
    request.extensions_mut().insert(Handled);
}

/// Hook that records filtered traffic into a [`CaptureStore`].
#[derive(Debug)]
pub struct NetworkInterceptor {
    filter: Arc<HostFilter>,
    forwarder: Forwarder,
}

impl NetworkInterceptor {
    /// Creates an interceptor that filters with `filter` and records into
    /// `store`.
    pub fn new(filter: Arc<HostFilter>, store: Arc<CaptureStore>) -> Self {
        Self {
            filter,
            forwarder: Forwarder::new(store),
        }
    }

    /// Registers this interceptor with the process-wide hook registry.
    ///
    /// Returns false if an interceptor is already registered.
    pub fn register(self: &Arc<Self>) -> bool {
        registry::register_hook(Arc::clone(self) as Arc<dyn ProtocolHook>)
    }

    /// Registers this interceptor, evicting whatever hook holds its name.
    ///
    /// Returns true if another interceptor was evicted.
    pub(crate) fn register_replacing(self: &Arc<Self>) -> bool {
        registry::replace_hook(Arc::clone(self) as Arc<dyn ProtocolHook>)
    }
}

#[async_trait]
impl ProtocolHook for NetworkInterceptor {
    fn name(&self) -> &str {
        INTERCEPTOR_NAME
    }

    fn can_handle(&self, request: &Request) -> bool {
        if is_handled(request) {
            return false;
        }

        let uri = request.uri();
        let Some(scheme) = uri.scheme_str() else {
            tracing::debug!("Skipping request without scheme: {}", uri);
            return false;
        };

        let url = uri.to_string();
        let capture = self.filter.should_capture(&url, scheme, false);
        tracing::trace!("capture={} for {} {}", capture, request.method(), url);
        capture
    }

    async fn start_loading(&self, request: Request, client: Client) -> Result<Response> {
        self.forwarder.forward(request, client).await
    }
}
