//! Per-connection delivery pump: the only writer to a transport.

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::connection::{ConnectionId, Frame, FrameSink, Payload, RoomId};
use crate::dispatcher::Hub;
use crate::errors::TransportError;

/// How a delivery pump finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DeliveryExit {
    /// The hub closed the queue; a close frame was attempted.
    QueueClosed,
    /// The connection left the registry while a write was stalled.
    Stopped,
    /// Writing a data or ping frame failed.
    WriteFailed,
}

pub(crate) struct DeliveryPump {
    pub(crate) id: ConnectionId,
    pub(crate) room: RoomId,
    pub(crate) sink: Box<dyn FrameSink>,
    pub(crate) queue: mpsc::Receiver<Payload>,
    pub(crate) stop: CancellationToken,
    pub(crate) keepalive: Duration,
    pub(crate) hub: Hub,
}

impl DeliveryPump {
    /// Drain the outbound queue and send keepalive pings until the queue
    /// closes or the transport fails, then close the transport.
    #[instrument(name = "delivery", skip_all, fields(connection_id = %self.id, room = %self.room))]
    pub(crate) async fn run(mut self) -> DeliveryExit {
        let period = self.keepalive.max(Duration::from_millis(1));
        let mut keepalive = time::interval_at(Instant::now() + period, period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let exit = loop {
            tokio::select! {
                item = self.queue.recv() => match item {
                    Some(payload) => {
                        if let Err(e) = self.write(Frame::Data(payload)).await {
                            break self.failure(&e);
                        }
                    }
                    None => {
                        if let Err(e) = self.write(Frame::Close).await {
                            debug!(error = %e, "close frame not delivered");
                        }
                        break DeliveryExit::QueueClosed;
                    }
                },
                _ = keepalive.tick() => {
                    if let Err(e) = self.write(Frame::Ping(Bytes::new())).await {
                        break self.failure(&e);
                    }
                }
            }
        };

        if let Err(e) = self.close().await {
            debug!(error = %e, "transport close failed");
        }
        if exit == DeliveryExit::WriteFailed {
            let _ = self.hub.unregister(self.room.clone(), self.id).await;
        }
        debug!(?exit, "delivery pump finished");
        exit
    }

    /// Write one frame, giving up if the connection is stopped meanwhile.
    ///
    /// A ready transport always wins the race, so a final close frame still
    /// goes out after the stop signal when the peer is keeping up.
    async fn write(&mut self, frame: Frame) -> Result<(), TransportError> {
        tokio::select! {
            biased;
            result = self.sink.send(frame) => result,
            () = self.stop.cancelled() => Err(TransportError::Closed),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        tokio::select! {
            biased;
            result = self.sink.close() => result,
            () = self.stop.cancelled() => Ok(()),
        }
    }

    fn failure(&self, error: &TransportError) -> DeliveryExit {
        if self.stop.is_cancelled() {
            debug!("stalled write abandoned after removal");
            DeliveryExit::Stopped
        } else {
            warn!(error = %error, "write failed, closing connection");
            DeliveryExit::WriteFailed
        }
    }
}
