//! WebSocket upgrade route and the adapter that turns an axum socket into a
//! hub [`Connection`](roomcast_hub::Connection).

pub mod adapter;
pub mod handler;
