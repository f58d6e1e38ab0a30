//! `/health` and `/rooms` response bodies.

use std::time::Instant;

use roomcast_hub::{HubSnapshot, RoomOccupancy};
use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"` while the hub is running, `"stopping"` once it is not.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Registered connections.
    pub connections: usize,
    /// Live rooms.
    pub rooms: usize,
}

/// Build a health response. `snapshot` is `None` when the hub has stopped.
pub fn health_check(start_time: Instant, snapshot: Option<&HubSnapshot>) -> HealthResponse {
    HealthResponse {
        status: if snapshot.is_some() { "ok" } else { "stopping" },
        uptime_secs: start_time.elapsed().as_secs(),
        connections: snapshot.map_or(0, |s| s.connections),
        rooms: snapshot.map_or(0, |s| s.rooms.len()),
    }
}

/// `/rooms` response body.
#[derive(Debug, Clone, Serialize)]
pub struct RoomsResponse {
    /// Registered connections.
    pub connections: usize,
    /// Live rooms with member counts, sorted by room.
    pub rooms: Vec<RoomOccupancy>,
}

impl From<HubSnapshot> for RoomsResponse {
    fn from(snapshot: HubSnapshot) -> Self {
        Self {
            connections: snapshot.connections,
            rooms: snapshot.rooms,
        }
    }
}
