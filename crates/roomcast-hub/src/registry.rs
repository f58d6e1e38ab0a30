//! Room membership and per-connection outbound queues.
//!
//! Owned exclusively by the dispatcher task, so nothing here locks.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::connection::{ConnectionId, Payload, RoomId};

/// A member's side of its outbound queue plus its stop signal.
///
/// Dropping a `Member` closes the queue; the delivery pump sees the close
/// once it has drained what was already queued.
#[derive(Debug)]
pub(crate) struct Member {
    pub(crate) queue: mpsc::Sender<Payload>,
    stop: CancellationToken,
}

impl Drop for Member {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

/// What a freshly admitted connection's pumps need.
#[derive(Debug)]
pub(crate) struct Admission {
    /// Consumer end of the outbound queue.
    pub(crate) queue: mpsc::Receiver<Payload>,
    /// Cancelled once the connection leaves the registry.
    pub(crate) stop: CancellationToken,
}

/// Member count of one live room.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RoomOccupancy {
    /// Room key.
    pub room: String,
    /// Connections currently in the room.
    pub members: usize,
}

/// Point-in-time view of the registry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HubSnapshot {
    /// Registered connections across all rooms.
    pub connections: usize,
    /// Live rooms, sorted by key.
    pub rooms: Vec<RoomOccupancy>,
}

/// Room → connection → outbound queue.
#[derive(Debug)]
pub(crate) struct RoomRegistry {
    rooms: HashMap<RoomId, HashMap<ConnectionId, Member>>,
    queue_capacity: usize,
    connections: usize,
}

impl RoomRegistry {
    pub(crate) fn new(queue_capacity: usize) -> Self {
        Self {
            rooms: HashMap::new(),
            queue_capacity: queue_capacity.max(1),
            connections: 0,
        }
    }

    /// Admit `id` into `room`, creating the room if needed.
    pub(crate) fn add(&mut self, room: RoomId, id: ConnectionId) -> Admission {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let stop = CancellationToken::new();
        let member = Member {
            queue: tx,
            stop: stop.clone(),
        };
        if self.rooms.entry(room).or_default().insert(id, member).is_none() {
            self.connections += 1;
        }
        Admission { queue: rx, stop }
    }

    /// Remove `id` from `room`. Returns `false` if it was not a member.
    pub(crate) fn remove(&mut self, room: &RoomId, id: ConnectionId) -> bool {
        let Some(members) = self.rooms.get_mut(room) else {
            return false;
        };
        let removed = members.remove(&id).is_some();
        if members.is_empty() {
            let _ = self.rooms.remove(room);
        }
        if removed {
            self.connections -= 1;
        }
        removed
    }

    /// Current members of `room`; empty if the room does not exist.
    pub(crate) fn members(&self, room: &RoomId) -> impl Iterator<Item = (ConnectionId, &Member)> {
        self.rooms
            .get(room)
            .into_iter()
            .flat_map(|members| members.iter().map(|(id, member)| (*id, member)))
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, room: &RoomId, id: ConnectionId) -> bool {
        self.rooms
            .get(room)
            .is_some_and(|members| members.contains_key(&id))
    }

    pub(crate) fn member_count(&self, room: &RoomId) -> usize {
        self.rooms.get(room).map_or(0, HashMap::len)
    }

    pub(crate) fn connection_count(&self) -> usize {
        self.connections
    }

    pub(crate) fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub(crate) fn snapshot(&self) -> HubSnapshot {
        let mut rooms: Vec<RoomOccupancy> = self
            .rooms
            .iter()
            .map(|(room, members)| RoomOccupancy {
                room: room.to_string(),
                members: members.len(),
            })
            .collect();
        rooms.sort_by(|a, b| a.room.cmp(&b.room));
        HubSnapshot {
            connections: self.connections,
            rooms,
        }
    }

    /// Drop every member, closing all queues. Returns how many were closed.
    pub(crate) fn close_all(&mut self) -> usize {
        let closed = self.connections;
        self.rooms.clear();
        self.connections = 0;
        closed
    }
}
