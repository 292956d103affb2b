//! The `session` module represents one connected peer: the `Session`
//! owning the socket and its read loop, and the cloneable
//! `SessionHandle` every other component uses to reach it.

pub mod handle;
pub mod session;

pub use handle::SessionHandle;
pub use session::{Exit, Session};
