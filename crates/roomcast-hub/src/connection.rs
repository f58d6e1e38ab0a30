//! Connection handles, room keys, payloads and the transport seam.
//!
//! A [`Connection`] bundles one transport's write half ([`FrameSink`]) and
//! read half ([`FrameSource`]) under an opaque [`ConnectionId`]. Registering
//! it with the hub moves each half into the pump that owns it, so only one
//! task ever writes and only one task ever reads a given transport.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::errors::TransportError;

/// Opaque identity of one transport instance.
///
/// Equality is identity: every [`Connection`] gets a fresh id, so two
/// connections are never equal even if they carry the same peer address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a new, unique connection id.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn_{}", self.0)
    }
}

/// Room key. Rooms have no lifecycle of their own beyond their members.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(Arc<str>);

impl RoomId {
    /// Create a room key.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RoomId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque application payload.
///
/// Cloning is cheap (reference counted), so one broadcast shares the same
/// bytes across every member queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    /// UTF-8 text frame.
    Text(Arc<str>),
    /// Binary frame.
    Binary(Bytes),
}

impl Payload {
    /// Raw bytes of the payload, regardless of frame kind.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(data) => data,
        }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Whether the payload carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.into())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text.into())
    }
}

impl From<Bytes> for Payload {
    fn from(data: Bytes) -> Self {
        Self::Binary(data)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(data: Vec<u8>) -> Self {
        Self::Binary(data.into())
    }
}

/// One frame on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// Application data.
    Data(Payload),
    /// Transport-level liveness probe.
    Ping(Bytes),
    /// Answer to a [`Frame::Ping`].
    Pong(Bytes),
    /// Close handshake.
    Close,
}

impl Frame {
    /// Shorthand for a text data frame.
    pub fn text(text: impl Into<Arc<str>>) -> Self {
        Self::Data(Payload::Text(text.into()))
    }
}

/// Write half of a transport. Owned by the connection's delivery pump.
#[async_trait]
pub trait FrameSink: Send + 'static {
    /// Write one frame.
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError>;

    /// Close the write half. Closing twice is not an error.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Read half of a transport. Owned by the connection's ingress pump.
#[async_trait]
pub trait FrameSource: Send + 'static {
    /// Read the next frame. `None` once the peer has gone away.
    async fn recv(&mut self) -> Option<Result<Frame, TransportError>>;
}

/// A live transport handed to the hub by the upgrade layer.
pub struct Connection {
    id: ConnectionId,
    sink: Box<dyn FrameSink>,
    source: Box<dyn FrameSource>,
}

impl Connection {
    /// Wrap a transport's two halves under a fresh [`ConnectionId`].
    pub fn new(sink: impl FrameSink, source: impl FrameSource) -> Self {
        Self {
            id: ConnectionId::new(),
            sink: Box::new(sink),
            source: Box::new(source),
        }
    }

    /// Identity of this connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub(crate) fn into_parts(self) -> (ConnectionId, Box<dyn FrameSink>, Box<dyn FrameSource>) {
        (self.id, self.sink, self.source)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").field("id", &self.id).finish_non_exhaustive()
    }
}
