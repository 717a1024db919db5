//! HTTP client with protocol hooks.
//!
//! A [`Client`] sends requests through a [`Transport`]. Before that, every
//! [`ProtocolHook`] in its chain gets first refusal: the first hook whose
//! [`can_handle`](ProtocolHook::can_handle) returns true owns the request
//! and produces the response itself.
//!
//! ```text
//! execute(request)
//!     │
//!     ├─ registered hooks (default configuration only)
//!     ├─ client hooks
//!     │      └─ can_handle? ── yes ──► hook.start_loading(request, client)
//!     │
//!     └─ no hook ──► transport.send(request)
//! ```
//!
//! [`default_client`] is the process-wide default configuration. It looks
//! up the hook registry on every request, so hooks registered later still
//! see traffic from clients created earlier.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::Method;

use crate::body::Body;
use crate::error::{ClientError, Result};
use crate::network::NetworkTransport;
use crate::registry;

/// Outgoing request. Bodies are fully buffered.
pub type Request = http::Request<Bytes>;

/// Incoming response with a possibly streaming body.
pub type Response = http::Response<Body>;

/// Sends requests somewhere and returns their responses.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a request.
    async fn send(&self, request: Request) -> Result<Response>;
}

/// A hook that can take over requests before they reach the transport.
#[async_trait]
pub trait ProtocolHook: Send + Sync {
    /// Unique hook name, used to deduplicate registrations.
    fn name(&self) -> &str;

    /// Returns true if this hook wants to handle the request.
    fn can_handle(&self, request: &Request) -> bool;

    /// Takes ownership of the request and produces its response.
    ///
    /// `client` is the client that dispatched the request; hooks can use it
    /// to issue follow-up requests through the same configuration.
    async fn start_loading(&self, request: Request, client: Client) -> Result<Response>;
}

struct ClientInner {
    hooks: Vec<Arc<dyn ProtocolHook>>,
    use_registered_hooks: bool,
    transport: Arc<dyn Transport>,
}

/// HTTP client. Cloning is cheap and shares the configuration.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hooks: Vec<&str> = self.inner.hooks.iter().map(|hook| hook.name()).collect();
        f.debug_struct("Client")
            .field("hooks", &hooks)
            .field("use_registered_hooks", &self.inner.use_registered_hooks)
            .finish()
    }
}

impl Client {
    /// Returns a builder for a custom client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Sends a request, letting hooks take it over first.
    pub async fn execute(&self, request: Request) -> Result<Response> {
        if let Some(hook) = self.find_hook(&request) {
            tracing::trace!("{} handling {} {}", hook.name(), request.method(), request.uri());
            return hook.start_loading(request, self.clone()).await;
        }

        self.inner.transport.send(request).await
    }

    /// Sends a GET request with no body.
    pub async fn get(&self, url: &str) -> Result<Response> {
        let request = build_request(Method::GET, url, Bytes::new())?;
        self.execute(request).await
    }

    fn find_hook(&self, request: &Request) -> Option<Arc<dyn ProtocolHook>> {
        if self.inner.use_registered_hooks {
            if let Some(hook) = registry::find_hook(request) {
                return Some(hook);
            }
        }

        self.inner
            .hooks
            .iter()
            .find(|hook| hook.can_handle(request))
            .cloned()
    }
}

/// Builds a request from parts.
pub fn build_request(method: Method, url: &str, body: impl Into<Bytes>) -> Result<Request> {
    http::Request::builder()
        .method(method)
        .uri(url)
        .body(body.into())
        .map_err(|e| ClientError::InvalidRequest(e.to_string()))
}

/// Builder for [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    hooks: Vec<Arc<dyn ProtocolHook>>,
    use_registered_hooks: bool,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    /// Adds a hook to this client's chain.
    pub fn hook(mut self, hook: Arc<dyn ProtocolHook>) -> Self {
        if self.hooks.iter().any(|existing| existing.name() == hook.name()) {
            tracing::debug!("Hook {} already installed on client", hook.name());
            return self;
        }
        self.hooks.push(hook);
        self
    }

    /// Also consults the process-wide hook registry.
    pub fn with_default_hooks(mut self) -> Self {
        self.use_registered_hooks = true;
        self
    }

    /// Sets the transport. Defaults to the shared network transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builds the client.
    pub fn build(self) -> Client {
        let transport = self
            .transport
            .unwrap_or_else(|| NetworkTransport::shared() as Arc<dyn Transport>);

        Client {
            inner: Arc::new(ClientInner {
                hooks: self.hooks,
                use_registered_hooks: self.use_registered_hooks,
                transport,
            }),
        }
    }
}

/// Returns a client using the process-wide default configuration.
///
/// Requests go through every hook registered with
/// [`register_hook`](crate::register_hook), then the network.
pub fn default_client() -> Client {
    Client::builder().with_default_hooks().build()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::testing::{Scripted, ScriptedTransport};

    struct EchoHook {
        prefix: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProtocolHook for EchoHook {
        fn name(&self) -> &str {
            self.prefix
        }

        fn can_handle(&self, request: &Request) -> bool {
            request.uri().path().starts_with(self.prefix)
        }

        async fn start_loading(&self, request: Request, _client: Client) -> Result<Response> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(http::Response::new(Body::from_bytes(request.uri().path().to_string())))
        }
    }

    fn echo(prefix: &'static str) -> Arc<EchoHook> {
        Arc::new(EchoHook {
            prefix,
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn without_hooks_uses_transport() {
        let transport = ScriptedTransport::new().route("http://h.test/a", Scripted::ok("from network"));
        let client = Client::builder().transport(transport.clone()).build();

        let response = client.get("http://h.test/a").await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.into_body().text().await.unwrap(), "from network");
        assert_eq!(transport.seen().len(), 1);
    }

    #[tokio::test]
    async fn accepting_hook_takes_over() {
        let transport = ScriptedTransport::new();
        let hook = echo("/hooked");
        let client = Client::builder()
            .hook(hook.clone())
            .transport(transport.clone())
            .build();

        let response = client.get("http://h.test/hooked/x").await.unwrap();
        assert_eq!(response.into_body().text().await.unwrap(), "/hooked/x");
        assert_eq!(hook.calls.load(Ordering::SeqCst), 1);
        assert!(transport.seen().is_empty());
    }

    #[tokio::test]
    async fn declining_hook_passes_through() {
        let transport = ScriptedTransport::new();
        let hook = echo("/hooked");
        let client = Client::builder()
            .hook(hook.clone())
            .transport(transport.clone())
            .build();

        let response = client.get("http://h.test/plain").await.unwrap();
        assert_eq!(response.status(), 404);
        assert_eq!(hook.calls.load(Ordering::SeqCst), 0);
        assert_eq!(transport.seen().len(), 1);
    }

    #[tokio::test]
    async fn first_accepting_hook_wins() {
        let first = echo("/a");
        let second = echo("/");
        let client = Client::builder()
            .hook(first.clone())
            .hook(second.clone())
            .transport(ScriptedTransport::new())
            .build();

        client.get("http://h.test/a/1").await.unwrap();
        client.get("http://h.test/b/1").await.unwrap();
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn duplicate_hook_names_are_ignored() {
        let client = Client::builder()
            .hook(echo("/same"))
            .hook(echo("/same"))
            .transport(ScriptedTransport::new())
            .build();
        assert_eq!(client.inner.hooks.len(), 1);
    }

    #[test]
    fn invalid_url_is_rejected() {
        let err = build_request(Method::GET, "http://bad host/", Bytes::new()).unwrap_err();
        assert!(matches!(err, ClientError::InvalidRequest(_)));
    }

    #[test]
    fn debug_lists_hooks() {
        let client = Client::builder()
            .hook(echo("/dbg"))
            .transport(ScriptedTransport::new())
            .build();
        assert!(format!("{:?}", client).contains("/dbg"));
    }
}
