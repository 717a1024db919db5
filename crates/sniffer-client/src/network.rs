//! Network transport backed by reqwest.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;

use crate::body::Body;
use crate::client::{Request, Response, Transport};
use crate::error::{ClientError, Result};
use crate::interceptor::Handled;

static SHARED: Lazy<Arc<NetworkTransport>> = Lazy::new(|| {
    let transport = NetworkTransport::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to configure network client, using defaults: {}", e);
        NetworkTransport::with_client(reqwest::Client::new())
    });
    Arc::new(transport)
});

/// Sends requests over the network.
#[derive(Debug, Clone)]
pub struct NetworkTransport {
    client: reqwest::Client,
}

impl NetworkTransport {
    /// Creates a transport with its own connection pool.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("sniffer/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client))
    }

    /// Wraps an existing reqwest client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Returns the process-wide transport.
    pub fn shared() -> Arc<Self> {
        Arc::clone(&SHARED)
    }
}

#[async_trait]
impl Transport for NetworkTransport {
    async fn send(&self, mut request: Request) -> Result<Response> {
        // The marker is process-local and never goes on the wire.
        request.extensions_mut().remove::<Handled>();

        let request = reqwest::Request::try_from(request)
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
        tracing::trace!("-> {} {}", request.method(), request.url());

        let upstream = self.client.execute(request).await?;

        let mut builder = http::Response::builder()
            .status(upstream.status())
            .version(upstream.version());
        if let Some(headers) = builder.headers_mut() {
            *headers = upstream.headers().clone();
        }

        let stream = futures::stream::unfold(Some(upstream), |upstream| async move {
            let mut upstream = upstream?;
            match upstream.chunk().await {
                Ok(Some(chunk)) => Some((Ok(chunk), Some(upstream))),
                Ok(None) => None,
                Err(e) => Some((Err(ClientError::from(e)), None)),
            }
        });

        builder
            .body(Body::from_stream(stream))
            .map_err(|e| ClientError::Transport(e.to_string()))
    }
}
