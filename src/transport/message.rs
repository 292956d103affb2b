//! Wire protocol between clients and the relay.
//!
//! Framing is one JSON object per newline-terminated line. A single TCP
//! read may carry any number of complete or partial frames, so sessions
//! feed the stream through a buffered line reader instead of assuming a
//! read boundary is a message boundary.

use serde_json::Value;

use crate::broker::message::Response;
use crate::utils::error::DecodeError;

/// Client→broker command, decoded from one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Pub { topic: String, msg: String },
    Sub { topic: String },
    Unsub { topic: String },
}

/// Decodes one frame into a [`Command`].
///
/// Anything that is not a JSON document is a parsing error; a document
/// without a `cmd` string field has no command; otherwise the named
/// command must carry a `topic` (and, for `pub`, a `msg`). The error's
/// `Display` form is the reason string reported back to the client.
pub fn decode_command(frame: &str) -> Result<Command, DecodeError> {
    let value: Value = serde_json::from_str(frame).map_err(|_| DecodeError::Parse)?;
    let Some(object) = value.as_object() else {
        return Err(DecodeError::MissingCommand);
    };
    let topic_field = || {
        object
            .get("topic")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(DecodeError::MissingTopic)
    };
    match object.get("cmd").and_then(Value::as_str) {
        None => Err(DecodeError::MissingCommand),
        Some("pub") => {
            let topic = topic_field()?;
            let msg = object
                .get("msg")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or(DecodeError::MissingMessage)?;
            Ok(Command::Pub { topic, msg })
        }
        Some("sub") => Ok(Command::Sub {
            topic: topic_field()?,
        }),
        Some("unsub") => Ok(Command::Unsub {
            topic: topic_field()?,
        }),
        Some(_) => Err(DecodeError::UndefinedCommand),
    }
}

/// Encodes a response as one newline-terminated frame.
pub fn encode_response(response: &Response) -> String {
    // Response is all string-keyed structs and enums; serialization
    // cannot fail.
    let mut frame = serde_json::to_string(response).expect("response serializes");
    frame.push('\n');
    frame
}
