//! Error types used across the relay.

use thiserror::Error;

use crate::broker::topic::SessionId;

/// Reasons an inbound frame fails to decode into a command.
///
/// The `Display` form of each variant is exactly the reason string the
/// offending client receives in its `fail` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The frame is not a JSON document at all.
    #[error("parsing error")]
    Parse,
    /// The frame carries no `cmd` string field.
    #[error("missing command")]
    MissingCommand,
    /// The `cmd` field names no known command.
    #[error("undefined command")]
    UndefinedCommand,
    /// The command requires a `topic` field and none was given.
    #[error("missing topic")]
    MissingTopic,
    /// A `pub` command without a `msg` field.
    #[error("missing message")]
    MissingMessage,
}

/// Returned by `SessionHandle::send` when the session's outbound channel
/// is gone, i.e. its writer task has already wound down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("client#{0} is no longer accepting messages")]
pub struct SessionClosed(pub SessionId);
