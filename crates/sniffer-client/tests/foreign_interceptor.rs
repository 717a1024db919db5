//! Starting the sniffer after another interceptor took its registry slot.
//!
//! Needs a fresh registry and singleton, so it has its own test binary.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use sniffer_client::{
    registered_hooks, Body, CaptureConfig, Client, NetworkInterceptor, NetworkSniffer, Request,
    Response, Result, Transport, INTERCEPTOR_NAME,
};
use sniffer_core::{CaptureStore, HostFilter};

struct OkTransport;

#[async_trait]
impl Transport for OkTransport {
    async fn send(&self, _request: Request) -> Result<Response> {
        Ok(http::Response::new(Body::from_bytes(Bytes::from_static(b"ok"))))
    }
}

#[tokio::test]
async fn start_evicts_interceptor_registered_elsewhere() {
    let scoped_store = Arc::new(CaptureStore::new());
    let scoped = Arc::new(NetworkInterceptor::new(
        Arc::new(HostFilter::capture_all()),
        Arc::clone(&scoped_store),
    ));
    assert!(scoped.register());

    let sniffer = NetworkSniffer::start(CaptureConfig::capture_all());
    assert_eq!(registered_hooks(), vec![INTERCEPTOR_NAME.to_string()]);

    let client = Client::builder()
        .with_default_hooks()
        .transport(Arc::new(OkTransport))
        .build();
    let response = client.get("https://api.example.com/data").await.unwrap();
    assert_eq!(response.into_body().text().await.unwrap(), "ok");

    for _ in 0..200 {
        if !sniffer.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert_eq!(sniffer.snapshot().len(), 1);
    assert!(scoped_store.is_empty());
}
