//! The `transport` module is the network-facing layer: the wire codec
//! for command and response envelopes, and the TCP server accepting
//! connections and managing session lifecycle.

pub mod message;
pub mod server;
