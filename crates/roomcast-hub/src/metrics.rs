//! Metric names recorded by the hub.
//!
//! Recording goes through the `metrics` facade; without an installed
//! recorder every call is a no-op.

/// Connections admitted (counter).
pub const HUB_REGISTRATIONS_TOTAL: &str = "hub_registrations_total";
/// Connections removed by explicit or pump-initiated unregister (counter).
pub const HUB_UNREGISTRATIONS_TOTAL: &str = "hub_unregistrations_total";
/// Members evicted during fan-out (counter, labels: cause).
pub const HUB_EVICTIONS_TOTAL: &str = "hub_evictions_total";
/// Broadcast events processed (counter).
pub const HUB_BROADCASTS_TOTAL: &str = "hub_broadcasts_total";
/// `{"type":"ping"}` payloads swallowed by ingress pumps (counter).
pub const HUB_PINGS_SWALLOWED_TOTAL: &str = "hub_pings_swallowed_total";
/// Registered connections (gauge).
pub const HUB_CONNECTIONS_ACTIVE: &str = "hub_connections_active";
/// Non-empty rooms (gauge).
pub const HUB_ROOMS_ACTIVE: &str = "hub_rooms_active";
