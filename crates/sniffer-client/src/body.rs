//! Response bodies.
//!
//! A [`Body`] is either fully buffered or a stream of chunks produced while
//! the response is still arriving. Dropping a streaming body (or calling
//! [`Body::stop_loading`]) tells whoever produces it to stop.

use bytes::{Bytes, BytesMut};
use futures::stream::{BoxStream, Stream, StreamExt};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::error::{ClientError, Result};

enum Inner {
    Full(Option<Bytes>),
    Stream(BoxStream<'static, Result<Bytes>>),
}

/// Response body.
pub struct Body {
    inner: Inner,
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.inner {
            Inner::Full(_) => "full",
            Inner::Stream(_) => "stream",
        };
        f.debug_struct("Body").field("kind", &kind).finish()
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl Body {
    /// Creates an empty body.
    pub fn empty() -> Self {
        Self {
            inner: Inner::Full(None),
        }
    }

    /// Creates a fully buffered body.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self {
            inner: Inner::Full((!bytes.is_empty()).then_some(bytes)),
        }
    }

    /// Creates a body from a stream of chunks.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes>> + Send + 'static,
    {
        Self {
            inner: Inner::Stream(stream.boxed()),
        }
    }

    /// Creates a body fed by a channel.
    ///
    /// The body ends when every sender is dropped.
    pub(crate) fn from_receiver(rx: UnboundedReceiver<Result<Bytes>>) -> Self {
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            let item = rx.recv().await?;
            Some((item, rx))
        });
        Self::from_stream(stream)
    }

    /// Returns the next chunk, or `None` at the end of the body.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>> {
        match &mut self.inner {
            Inner::Full(bytes) => Ok(bytes.take()),
            Inner::Stream(stream) => stream.next().await.transpose(),
        }
    }

    /// Reads the whole body.
    pub async fn collect(mut self) -> Result<Bytes> {
        if let Inner::Full(bytes) = &mut self.inner {
            return Ok(bytes.take().unwrap_or_default());
        }

        let mut buffer = BytesMut::new();
        while let Some(chunk) = self.chunk().await? {
            buffer.extend_from_slice(&chunk);
        }
        Ok(buffer.freeze())
    }

    /// Reads the whole body as UTF-8 text.
    pub async fn text(self) -> Result<String> {
        let bytes = self.collect().await?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| ClientError::Transport(format!("body is not UTF-8: {}", e)))
    }

    /// Abandons the body and cancels whatever is still producing it.
    pub fn stop_loading(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn full_body_yields_once() {
        let mut body = Body::from_bytes("hello");
        assert_eq!(body.chunk().await.unwrap(), Some(Bytes::from("hello")));
        assert_eq!(body.chunk().await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_body_has_no_chunks() {
        let mut body = Body::empty();
        assert_eq!(body.chunk().await.unwrap(), None);
        assert!(Body::from_bytes("").collect().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stream_body_preserves_order() {
        let chunks = vec![Ok(Bytes::from("a")), Ok(Bytes::from("b")), Ok(Bytes::from("c"))];
        let body = Body::from_stream(futures::stream::iter(chunks));
        assert_eq!(body.collect().await.unwrap(), Bytes::from("abc"));
    }

    #[tokio::test]
    async fn stream_error_surfaces() {
        let chunks = vec![
            Ok(Bytes::from("partial")),
            Err(ClientError::Transport("reset".to_string())),
        ];
        let mut body = Body::from_stream(futures::stream::iter(chunks));
        assert_eq!(body.chunk().await.unwrap(), Some(Bytes::from("partial")));
        assert!(matches!(body.chunk().await, Err(ClientError::Transport(_))));
    }

    #[tokio::test]
    async fn receiver_body_ends_when_senders_drop() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let body = Body::from_receiver(rx);
        tx.send(Ok(Bytes::from("x"))).unwrap();
        tx.send(Ok(Bytes::from("y"))).unwrap();
        drop(tx);
        assert_eq!(body.text().await.unwrap(), "xy");
    }

    #[tokio::test]
    async fn stop_loading_closes_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Result<Bytes>>();
        let body = Body::from_receiver(rx);
        body.stop_loading();
        assert!(tx.is_closed());
    }

    #[test]
    fn debug_shows_kind() {
        assert!(format!("{:?}", Body::empty()).contains("full"));
    }
}
