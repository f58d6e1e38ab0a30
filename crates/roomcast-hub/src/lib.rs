//! # roomcast-hub
//!
//! Room-scoped fan-out of opaque payloads between live connections.
//!
//! - Dispatcher: one task owns room membership and applies register,
//!   unregister and broadcast events in arrival order
//! - Delivery pump per connection: drains a bounded outbound queue, sends
//!   keepalive pings, closes the transport when the queue closes
//! - Ingress pump per connection: turns inbound frames into broadcasts,
//!   swallows `{"type":"ping"}` probes, unregisters on disconnect
//! - Slow consumers are evicted when their queue overflows; nobody else waits
//! - Transport-agnostic: anything implementing [`FrameSink`] and
//!   [`FrameSource`] can be registered; [`memory`] provides an in-process pair

#![deny(unsafe_code)]

pub mod config;
pub mod connection;
mod delivery;
mod dispatcher;
pub mod errors;
mod ingress;
pub mod memory;
pub mod metrics;
mod registry;

pub use config::HubConfig;
pub use connection::{Connection, ConnectionId, Frame, FrameSink, FrameSource, Payload, RoomId};
pub use dispatcher::Hub;
pub use errors::{HubError, TransportError};
pub use ingress::is_ping_probe;
pub use registry::{HubSnapshot, RoomOccupancy};
