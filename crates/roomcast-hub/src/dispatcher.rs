//! The hub core loop and its public handle.
//!
//! Every membership change and every broadcast is an event on one channel,
//! consumed by one task that owns the [`RoomRegistry`]. Ordering follows the
//! channel: a broadcast observes exactly the registrations and removals
//! submitted before it.

use metrics::{counter, gauge};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::HubConfig;
use crate::connection::{Connection, ConnectionId, Payload, RoomId};
use crate::delivery::DeliveryPump;
use crate::errors::HubError;
use crate::ingress::IngressPump;
use crate::metrics::{
    HUB_BROADCASTS_TOTAL, HUB_CONNECTIONS_ACTIVE, HUB_EVICTIONS_TOTAL, HUB_REGISTRATIONS_TOTAL,
    HUB_ROOMS_ACTIVE, HUB_UNREGISTRATIONS_TOTAL,
};
use crate::registry::{HubSnapshot, RoomRegistry};

enum Command {
    Register {
        room: RoomId,
        connection: Connection,
    },
    Unregister {
        room: RoomId,
        id: ConnectionId,
    },
    Broadcast {
        room: RoomId,
        payload: Payload,
    },
    Snapshot {
        reply: oneshot::Sender<HubSnapshot>,
    },
}

/// Cloneable handle for submitting events to the dispatcher.
#[derive(Clone, Debug)]
pub struct Hub {
    commands: mpsc::Sender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Register { room, connection } => {
                write!(f, "Register({room}, {})", connection.id())
            }
            Self::Unregister { room, id } => write!(f, "Unregister({room}, {id})"),
            Self::Broadcast { room, payload } => {
                write!(f, "Broadcast({room}, {} bytes)", payload.len())
            }
            Self::Snapshot { .. } => f.write_str("Snapshot"),
        }
    }
}

impl Hub {
    /// Start the dispatcher task.
    ///
    /// The loop runs until `shutdown` is cancelled or every handle (including
    /// those held by connection pumps) is dropped. On exit it closes every
    /// member's queue, which stops all pumps.
    pub fn spawn(config: HubConfig, shutdown: CancellationToken) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.command_buffer.max(1));
        let dispatcher = Dispatcher {
            registry: RoomRegistry::new(config.outbound_queue_capacity),
            config,
            commands: rx,
            handle: tx.downgrade(),
            shutdown,
        };
        let task = tokio::spawn(dispatcher.run());
        (Self { commands: tx }, task)
    }

    /// Admit `connection` into `room` and start its pumps.
    ///
    /// If the dispatcher has stopped the connection is dropped, which closes
    /// the transport.
    pub async fn register(
        &self,
        room: impl Into<RoomId>,
        connection: Connection,
    ) -> Result<(), HubError> {
        self.submit(Command::Register {
            room: room.into(),
            connection,
        })
        .await
    }

    /// Remove connection `id` from `room`. Unknown connections are ignored.
    pub async fn unregister(&self, room: impl Into<RoomId>, id: ConnectionId) -> Result<(), HubError> {
        self.submit(Command::Unregister {
            room: room.into(),
            id,
        })
        .await
    }

    /// Fan `payload` out to the members of `room` as of processing time.
    pub async fn broadcast(
        &self,
        room: impl Into<RoomId>,
        payload: impl Into<Payload>,
    ) -> Result<(), HubError> {
        self.submit(Command::Broadcast {
            room: room.into(),
            payload: payload.into(),
        })
        .await
    }

    /// Room occupancy, consistent with every event submitted before this call.
    pub async fn snapshot(&self) -> Result<HubSnapshot, HubError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Snapshot { reply }).await?;
        rx.await.map_err(|_| HubError::Stopped)
    }

    async fn submit(&self, command: Command) -> Result<(), HubError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| HubError::Stopped)
    }
}

/// Why a member left during fan-out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EvictionCause {
    /// Outbound queue was full.
    Overflow,
    /// Delivery pump already gone.
    Closed,
}

impl EvictionCause {
    fn as_label(self) -> &'static str {
        match self {
            Self::Overflow => "overflow",
            Self::Closed => "closed",
        }
    }
}

#[derive(Debug, Default)]
struct FanOut {
    delivered: usize,
    evicted: Vec<(ConnectionId, EvictionCause)>,
}

/// Enqueue `payload` for every member of `room` without ever waiting.
///
/// A member whose queue is full (or already closed) is removed on the spot.
fn fan_out(registry: &mut RoomRegistry, room: &RoomId, payload: &Payload) -> FanOut {
    let mut outcome = FanOut::default();
    for (id, member) in registry.members(room) {
        match member.queue.try_send(payload.clone()) {
            Ok(()) => outcome.delivered += 1,
            Err(mpsc::error::TrySendError::Full(_)) => {
                outcome.evicted.push((id, EvictionCause::Overflow));
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                outcome.evicted.push((id, EvictionCause::Closed));
            }
        }
    }
    for (id, _) in &outcome.evicted {
        let _ = registry.remove(room, *id);
    }
    outcome
}

struct Dispatcher {
    registry: RoomRegistry,
    config: HubConfig,
    commands: mpsc::Receiver<Command>,
    handle: mpsc::WeakSender<Command>,
    shutdown: CancellationToken,
}

impl Dispatcher {
    async fn run(mut self) {
        info!(
            queue_capacity = self.config.outbound_queue_capacity,
            keepalive_secs = self.config.keepalive_interval.as_secs(),
            "hub dispatcher started"
        );
        loop {
            let command = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                command = self.commands.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
            };
            self.apply(command);
        }
        let closed = self.registry.close_all();
        self.record_gauges();
        info!(closed, "hub dispatcher stopped");
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Register { room, connection } => self.register(room, connection),
            Command::Unregister { room, id } => self.unregister(&room, id),
            Command::Broadcast { room, payload } => self.broadcast(&room, &payload),
            Command::Snapshot { reply } => {
                let _ = reply.send(self.registry.snapshot());
            }
        }
    }

    fn register(&mut self, room: RoomId, connection: Connection) {
        let Some(commands) = self.handle.upgrade() else {
            debug!(connection_id = %connection.id(), "hub closing, dropping registration");
            return;
        };
        let hub = Hub { commands };
        let (id, sink, source) = connection.into_parts();
        let admission = self.registry.add(room.clone(), id);

        counter!(HUB_REGISTRATIONS_TOTAL).increment(1);
        self.record_gauges();
        info!(
            connection_id = %id,
            %room,
            members = self.registry.member_count(&room),
            "connection registered"
        );

        let delivery = DeliveryPump {
            id,
            room: room.clone(),
            sink,
            queue: admission.queue,
            stop: admission.stop.clone(),
            keepalive: self.config.keepalive_interval,
            hub: hub.clone(),
        };
        let ingress = IngressPump {
            id,
            room,
            source,
            stop: admission.stop,
            hub,
        };
        let _ = tokio::spawn(delivery.run());
        let _ = tokio::spawn(ingress.run());
    }

    fn unregister(&mut self, room: &RoomId, id: ConnectionId) {
        if self.registry.remove(room, id) {
            counter!(HUB_UNREGISTRATIONS_TOTAL).increment(1);
            self.record_gauges();
            info!(
                connection_id = %id,
                %room,
                members = self.registry.member_count(room),
                "connection unregistered"
            );
        } else {
            debug!(connection_id = %id, %room, "unregister for absent connection ignored");
        }
    }

    fn broadcast(&mut self, room: &RoomId, payload: &Payload) {
        counter!(HUB_BROADCASTS_TOTAL).increment(1);
        let outcome = fan_out(&mut self.registry, room, payload);
        for (id, cause) in &outcome.evicted {
            counter!(HUB_EVICTIONS_TOTAL, "cause" => cause.as_label()).increment(1);
            match cause {
                EvictionCause::Overflow => warn!(
                    connection_id = %id,
                    %room,
                    capacity = self.config.outbound_queue_capacity,
                    "outbound queue full, evicting slow consumer"
                ),
                EvictionCause::Closed => {
                    debug!(connection_id = %id, %room, "delivery pump gone, evicting");
                }
            }
        }
        if !outcome.evicted.is_empty() {
            self.record_gauges();
        }
        debug!(
            %room,
            bytes = payload.len(),
            delivered = outcome.delivered,
            evicted = outcome.evicted.len(),
            "broadcast fanned out"
        );
    }

    #[allow(clippy::cast_precision_loss)]
    fn record_gauges(&self) {
        gauge!(HUB_CONNECTIONS_ACTIVE).set(self.registry.connection_count() as f64);
        gauge!(HUB_ROOMS_ACTIVE).set(self.registry.room_count() as f64);
    }
}
