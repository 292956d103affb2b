//! # pubrelay
//!
//! A minimal publish/subscribe relay over plain TCP. Clients send
//! newline-framed JSON commands to subscribe to named topics,
//! unsubscribe, and publish; the relay fans each published message out
//! to every current subscriber of its topic, best effort.
//!
//! ## Core Modules
//!
//! - `broker`: the topic registry — topic→subscriber bookkeeping and
//!   command dispatch, shared by all connections.
//! - `session`: one connected peer — its read loop, outbound queue, and
//!   cooperative stop.
//! - `transport`: the wire codec and the TCP listener with its session
//!   lifecycle handling.
//! - `config`: loading and merging server configuration.
//! - `utils`: shared error types and logging setup.

pub mod broker;
pub mod config;
pub mod session;
pub mod transport;
pub mod utils;

#[cfg(test)]
mod tests;
