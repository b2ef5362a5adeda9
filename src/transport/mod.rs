//! The `transport` module exposes the broker over WebSockets.
//!
//! It defines the JSON protocol spoken with clients and the server that turns
//! each connection into one attached subscriber: commands are mapped onto
//! broker calls, and the subscriber's inbox is pumped back to the socket.

pub mod message;
pub mod websocket;
