//! In-process transport built on channels.
//!
//! [`pair`] returns a [`Connection`] for the hub and a [`MemoryPeer`] that
//! plays the remote client. The hub-to-peer direction is bounded by
//! `peer_buffer`, so a peer that stops reading stalls the delivery pump the
//! same way a stuck socket would.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::connection::{Connection, Frame, FrameSink, FrameSource, Payload};
use crate::errors::TransportError;

/// Create a connected (hub side, peer side) pair.
pub fn pair(peer_buffer: usize) -> (Connection, MemoryPeer) {
    let (out_tx, out_rx) = mpsc::channel(peer_buffer.max(1));
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let connection = Connection::new(MemorySink { tx: Some(out_tx) }, MemorySource { rx: in_rx });
    let peer = MemoryPeer {
        to_hub: Some(in_tx),
        from_hub: out_rx,
    };
    (connection, peer)
}

/// Hub-side write half.
#[derive(Debug)]
pub struct MemorySink {
    tx: Option<mpsc::Sender<Frame>>,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        tx.send(frame).await.map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        drop(self.tx.take());
        Ok(())
    }
}

/// Hub-side read half.
#[derive(Debug)]
pub struct MemorySource {
    rx: mpsc::UnboundedReceiver<Result<Frame, TransportError>>,
}

#[async_trait]
impl FrameSource for MemorySource {
    async fn recv(&mut self) -> Option<Result<Frame, TransportError>> {
        self.rx.recv().await
    }
}

/// The remote end of an in-memory connection.
#[derive(Debug)]
pub struct MemoryPeer {
    to_hub: Option<mpsc::UnboundedSender<Result<Frame, TransportError>>>,
    from_hub: mpsc::Receiver<Frame>,
}

impl MemoryPeer {
    /// Send an application payload to the hub.
    pub fn send(&self, payload: impl Into<Payload>) -> Result<(), TransportError> {
        self.send_frame(Frame::Data(payload.into()))
    }

    /// Send any frame to the hub.
    pub fn send_frame(&self, frame: Frame) -> Result<(), TransportError> {
        self.push(Ok(frame))
    }

    /// Make the hub's next read fail with `error`.
    pub fn fail(&self, error: TransportError) -> Result<(), TransportError> {
        self.push(Err(error))
    }

    /// Stop sending; the hub's reader sees end of stream. Receiving still works.
    pub fn disconnect(&mut self) {
        drop(self.to_hub.take());
    }

    /// Next frame written by the hub, or `None` once the hub closed its side.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.from_hub.recv().await
    }

    /// Next data payload, skipping pings and other control frames.
    ///
    /// Returns `None` on a close frame or once the hub side is gone.
    pub async fn recv_data(&mut self) -> Option<Payload> {
        loop {
            match self.from_hub.recv().await? {
                Frame::Data(payload) => return Some(payload),
                Frame::Close => return None,
                Frame::Ping(_) | Frame::Pong(_) => {}
            }
        }
    }

    /// Next frame if one is already buffered.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.from_hub.try_recv().ok()
    }

    fn push(&self, item: Result<Frame, TransportError>) -> Result<(), TransportError> {
        let tx = self.to_hub.as_ref().ok_or(TransportError::Closed)?;
        tx.send(item).map_err(|_| TransportError::Closed)
    }
}
