//! Transport seam between the connection worker and the WebSocket library

use super::types::RealtimeError;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::{Sink, SinkExt, StreamExt};
use std::pin::Pin;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Outbound half of an open connection
pub type FrameSink = Pin<Box<dyn Sink<Message, Error = RealtimeError> + Send>>;

/// Inbound half of an open connection
pub type FrameStream = BoxStream<'static, Result<Message, RealtimeError>>;

/// Opens connections to a realtime endpoint
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the handshake and hand back both halves of the socket
    async fn open(&self, url: &str) -> Result<(FrameSink, FrameStream), RealtimeError>;
}

/// WebSocket transport backed by tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self, url: &str) -> Result<(FrameSink, FrameStream), RealtimeError> {
        let (ws_stream, _response) = connect_async(url)
            .await
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        let (write, read) = ws_stream.split();
        let sink = write.sink_map_err(|e| RealtimeError::ConnectionFailed(e.to_string()));
        let stream = read.map(|frame| frame.map_err(|e| RealtimeError::ConnectionFailed(e.to_string())));

        Ok((Box::pin(sink), stream.boxed()))
    }
}
