//! Per-connection ingress pump: the only reader of a transport.
//!
//! Every data frame becomes a broadcast to the connection's room, except an
//! application-level ping (`{"type":"ping"}`), which is dropped here.
//! Transport-level ping/pong frames never reach the hub either.

use metrics::counter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::connection::{ConnectionId, Frame, FrameSource, Payload, RoomId};
use crate::dispatcher::Hub;
use crate::metrics::HUB_PINGS_SWALLOWED_TOTAL;

/// How an ingress pump finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum IngressExit {
    /// End of stream or a close frame.
    PeerClosed,
    /// The transport reported a read error.
    ReadFailed,
    /// The connection left the registry.
    Stopped,
    /// The dispatcher is gone.
    HubStopped,
}

pub(crate) struct IngressPump {
    pub(crate) id: ConnectionId,
    pub(crate) room: RoomId,
    pub(crate) source: Box<dyn FrameSource>,
    pub(crate) stop: CancellationToken,
    pub(crate) hub: Hub,
}

impl IngressPump {
    /// Read until the peer goes away, the read fails or the connection is
    /// removed, then unregister exactly once.
    #[instrument(name = "ingress", skip_all, fields(connection_id = %self.id, room = %self.room))]
    pub(crate) async fn run(mut self) -> IngressExit {
        let exit = loop {
            let item = tokio::select! {
                biased;
                () = self.stop.cancelled() => break IngressExit::Stopped,
                item = self.source.recv() => item,
            };
            match item {
                None | Some(Ok(Frame::Close)) => break IngressExit::PeerClosed,
                Some(Err(e)) => {
                    warn!(error = %e, "read failed");
                    break IngressExit::ReadFailed;
                }
                Some(Ok(Frame::Ping(_) | Frame::Pong(_))) => {}
                Some(Ok(Frame::Data(payload))) => {
                    if is_ping_probe(&payload) {
                        counter!(HUB_PINGS_SWALLOWED_TOTAL).increment(1);
                        debug!("application ping swallowed");
                        continue;
                    }
                    if self.hub.broadcast(self.room.clone(), payload).await.is_err() {
                        break IngressExit::HubStopped;
                    }
                }
            }
        };

        let _ = self.hub.unregister(self.room.clone(), self.id).await;
        debug!(?exit, "ingress pump finished");
        exit
    }
}

/// Whether `payload` is a JSON object whose `type` field is the string `"ping"`.
///
/// Other fields are ignored; anything that is not such an object is ordinary
/// application data.
pub fn is_ping_probe(payload: &Payload) -> bool {
    serde_json::from_slice::<serde_json::Value>(payload.as_bytes())
        .ok()
        .and_then(|value| value.get("type").and_then(serde_json::Value::as_str).map(|t| t == "ping"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use tokio::time;

    use super::*;
    use crate::config::HubConfig;
    use crate::errors::TransportError;
    use crate::memory::{self, MemoryPeer};

    #[test]
    fn ping_probe_detection() {
        assert!(is_ping_probe(&Payload::from(r#"{"type":"ping"}"#)));
        assert!(is_ping_probe(&Payload::from(r#"{ "type" : "ping", "ts": 12 }"#)));
        assert!(is_ping_probe(&Payload::from(Bytes::from_static(br#"{"type":"ping"}"#))));

        assert!(!is_ping_probe(&Payload::from(r#"{"type":"pong"}"#)));
        assert!(!is_ping_probe(&Payload::from(r#"{"type":"PING"}"#)));
        assert!(!is_ping_probe(&Payload::from(r#"{"type":1}"#)));
        assert!(!is_ping_probe(&Payload::from(r#"["ping"]"#)));
        assert!(!is_ping_probe(&Payload::from(r#""ping""#)));
        assert!(!is_ping_probe(&Payload::from("ping")));
        assert!(!is_ping_probe(&Payload::from(r#"{"type":"ping""#)));
        assert!(!is_ping_probe(&Payload::from("")));
    }

    /// Hub with one observer registered in `lobby`, plus an ingress pump for
    /// a second connection that is not itself a member.
    struct Fixture {
        hub: Hub,
        observer: MemoryPeer,
        peer: MemoryPeer,
        stop: CancellationToken,
        pump: tokio::task::JoinHandle<IngressExit>,
    }

    async fn start() -> Fixture {
        let (hub, _task) = Hub::spawn(HubConfig::default(), CancellationToken::new());
        let (observer_conn, observer) = memory::pair(16);
        hub.register("lobby", observer_conn).await.unwrap();

        let (connection, peer) = memory::pair(16);
        let (id, _sink, source) = connection.into_parts();
        let stop = CancellationToken::new();
        let pump = IngressPump {
            id,
            room: RoomId::from("lobby"),
            source,
            stop: stop.clone(),
            hub: hub.clone(),
        };
        Fixture {
            hub,
            observer,
            peer,
            stop,
            pump: tokio::spawn(pump.run()),
        }
    }

    #[tokio::test]
    async fn data_frames_become_broadcasts() {
        let mut fx = start().await;
        fx.peer.send("first").unwrap();
        fx.peer.send(Bytes::from_static(b"\x00\x01")).unwrap();
        assert_eq!(fx.observer.recv_data().await, Some(Payload::from("first")));
        assert_eq!(
            fx.observer.recv_data().await,
            Some(Payload::from(Bytes::from_static(b"\x00\x01")))
        );
    }

    #[tokio::test]
    async fn pings_are_swallowed() {
        let mut fx = start().await;
        fx.peer.send(r#"{"type":"ping"}"#).unwrap();
        fx.peer.send_frame(Frame::Ping(Bytes::new())).unwrap();
        fx.peer.send_frame(Frame::Pong(Bytes::new())).unwrap();
        fx.peer.send(r#"{"type":"chat","text":"hi"}"#).unwrap();
        assert_eq!(
            fx.observer.recv_data().await,
            Some(Payload::from(r#"{"type":"chat","text":"hi"}"#))
        );
        let snap = fx.hub.snapshot().await.unwrap();
        assert_eq!(snap.connections, 1);
        assert!(fx.observer.try_recv().is_none());
    }

    #[tokio::test]
    async fn end_of_stream_ends_pump() {
        let mut fx = start().await;
        fx.peer.disconnect();
        let exit = time::timeout(Duration::from_secs(5), fx.pump).await.unwrap().unwrap();
        assert_eq!(exit, IngressExit::PeerClosed);
    }

    #[tokio::test]
    async fn close_frame_ends_pump() {
        let fx = start().await;
        fx.peer.send_frame(Frame::Close).unwrap();
        fx.peer.send("after close").unwrap();
        let exit = time::timeout(Duration::from_secs(5), fx.pump).await.unwrap().unwrap();
        assert_eq!(exit, IngressExit::PeerClosed);
    }

    #[tokio::test]
    async fn read_error_ends_pump() {
        let fx = start().await;
        fx.peer.fail(TransportError::Io("connection reset".into())).unwrap();
        let exit = time::timeout(Duration::from_secs(5), fx.pump).await.unwrap().unwrap();
        assert_eq!(exit, IngressExit::ReadFailed);
    }

    #[tokio::test]
    async fn stop_signal_ends_pump() {
        let fx = start().await;
        fx.stop.cancel();
        let exit = time::timeout(Duration::from_secs(5), fx.pump).await.unwrap().unwrap();
        assert_eq!(exit, IngressExit::Stopped);
        drop(fx.peer);
    }
}
