use serde::{Deserialize, Serialize};

/// Which client command an acknowledgement or rejection refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Pub,
    Sub,
    Unsub,
}

/// Broker→client envelope, serialized as `{"status": ..., "msg": ...}`.
///
/// Every command gets exactly one `Ok`/`Fail` answer; `Msg` is the
/// fan-out delivery a subscriber receives when someone publishes on a
/// topic it follows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "msg", rename_all = "lowercase")]
pub enum Response {
    Ok(Ack),
    Fail(Reject),
    Msg(Delivery),
}

/// Payload of an `ok` acknowledgement. `msg` and `clients` are only
/// present on publish acks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    pub action: Action,
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clients: Option<usize>,
}

/// Payload of a `fail` response: a bare reason string for protocol-level
/// errors, or a command-scoped rejection for domain errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reject {
    Reason(String),
    Command {
        action: Action,
        topic: String,
        msg: String,
    },
}

/// Payload of a `msg` fan-out delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub topic: String,
    pub msg: String,
}

impl Response {
    pub fn sub_ack(topic: &str) -> Self {
        Response::Ok(Ack {
            action: Action::Sub,
            topic: topic.to_string(),
            msg: None,
            clients: None,
        })
    }

    pub fn unsub_ack(topic: &str) -> Self {
        Response::Ok(Ack {
            action: Action::Unsub,
            topic: topic.to_string(),
            msg: None,
            clients: None,
        })
    }

    /// Publish acknowledgement; `clients` is the number of subscribers
    /// the message was handed to at fan-out time.
    pub fn pub_ack(topic: &str, msg: &str, clients: usize) -> Self {
        Response::Ok(Ack {
            action: Action::Pub,
            topic: topic.to_string(),
            msg: Some(msg.to_string()),
            clients: Some(clients),
        })
    }

    pub fn rejected(action: Action, topic: &str, reason: &str) -> Self {
        Response::Fail(Reject::Command {
            action,
            topic: topic.to_string(),
            msg: reason.to_string(),
        })
    }

    pub fn protocol_error(reason: impl ToString) -> Self {
        Response::Fail(Reject::Reason(reason.to_string()))
    }

    pub fn delivery(topic: &str, msg: &str) -> Self {
        Response::Msg(Delivery {
            topic: topic.to_string(),
            msg: msg.to_string(),
        })
    }
}
