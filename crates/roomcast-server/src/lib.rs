//! # roomcast-server
//!
//! Axum HTTP + `WebSocket` front end for the roomcast hub.
//!
//! - `GET /chating/{room_id}`: WebSocket upgrade; the socket joins `room_id`
//! - `GET /health`, `GET /rooms`: liveness and room occupancy
//! - `GET /metrics`: Prometheus text
//! - Graceful shutdown via [`ShutdownCoordinator`]
//!
//! Room membership is not authorized here; callers that need it put an
//! authenticating layer in front of the router.

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::ServerError;
pub use server::{AppState, RoomcastServer};
pub use shutdown::ShutdownCoordinator;
