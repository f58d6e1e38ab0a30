//! Frame mapping between axum WebSocket messages and hub frames.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use roomcast_hub::{Connection, Frame, FrameSink, FrameSource, Payload, TransportError};

/// Split `socket` into the two halves the hub pumps own.
pub fn into_connection(socket: WebSocket) -> Connection {
    let (tx, rx) = socket.split();
    Connection::new(WsSink { inner: tx }, WsSource { inner: rx })
}

/// Write half of an upgraded socket.
pub struct WsSink {
    inner: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        self.inner.send(to_message(frame)).await.map_err(transport_error)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.inner.close().await.map_err(transport_error)
    }
}

/// Read half of an upgraded socket.
pub struct WsSource {
    inner: SplitStream<WebSocket>,
}

#[async_trait]
impl FrameSource for WsSource {
    async fn recv(&mut self) -> Option<Result<Frame, TransportError>> {
        let item = self.inner.next().await?;
        Some(item.map(from_message).map_err(transport_error))
    }
}

fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Data(Payload::Text(text)) => Message::Text(text.as_ref().to_owned().into()),
        Frame::Data(Payload::Binary(data)) => Message::Binary(data),
        Frame::Ping(data) => Message::Ping(data),
        Frame::Pong(data) => Message::Pong(data),
        Frame::Close => Message::Close(None),
    }
}

fn from_message(message: Message) -> Frame {
    match message {
        Message::Text(text) => Frame::Data(Payload::Text(Arc::from(text.as_str()))),
        Message::Binary(data) => Frame::Data(Payload::Binary(data)),
        Message::Ping(data) => Frame::Ping(data),
        Message::Pong(data) => Frame::Pong(data),
        Message::Close(_) => Frame::Close,
    }
}

fn transport_error(error: axum::Error) -> TransportError {
    TransportError::Io(error.to_string())
}
