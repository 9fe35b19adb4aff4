//! The chat room: origin admission, the broadcast hub, and the websocket
//! sessions that feed it.

pub mod connection;
pub mod hub;
pub mod origin;
pub mod server;
pub mod session;
