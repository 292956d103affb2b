use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tracing::{debug, info, warn};

use crate::broker::message::{Action, Response};
use crate::broker::topic::{SessionId, Topic};
use crate::session::SessionHandle;
use crate::transport::message::Command;

/// The topic registry: maps topic names to their subscriber sets and
/// routes commands coming out of session read loops.
///
/// One `Broker` is shared by every connection task behind a single
/// `Arc<Mutex<_>>`, which is the only exclusion domain in the crate.
/// Subscribe, unsubscribe, publish fan-out and session teardown are all
/// linearized by it, so no caller ever observes a half-mutated registry.
#[derive(Debug, Default)]
pub struct Broker {
    pub(crate) topics: HashMap<String, Topic>,
    pub(crate) sessions: HashMap<SessionId, SessionHandle>,
}

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes a session reachable for replies and fan-out. The listener
    /// calls this before the session's read loop starts, so a session
    /// can never issue a command while unregistered.
    pub fn register_session(&mut self, handle: SessionHandle) {
        self.sessions.insert(handle.id(), handle);
    }

    /// Entry point for every command a session decodes: runs the
    /// matching operation and answers the issuing session.
    pub fn dispatch(&mut self, id: SessionId, cmd: Command) {
        let response = match cmd {
            Command::Sub { topic } => self.subscribe(id, &topic),
            Command::Unsub { topic } => self.unsubscribe(id, &topic),
            Command::Pub { topic, msg } => self.publish(id, &topic, &msg),
        };
        self.reply(id, &response);
    }

    /// Subscribes `id` to `topic`, creating the topic on first use.
    pub fn subscribe(&mut self, id: SessionId, topic: &str) -> Response {
        match self.topics.entry(topic.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(Topic::new(topic)).subscribe(id);
                info!("new topic {} with recipient client#{}", topic, id);
                Response::sub_ack(topic)
            }
            Entry::Occupied(mut occupied) => {
                if occupied.get_mut().subscribe(id) {
                    debug!("add recipient client#{} for topic {}", id, topic);
                    Response::sub_ack(topic)
                } else {
                    Response::rejected(Action::Sub, topic, "already subscribed")
                }
            }
        }
    }

    /// Unsubscribes `id` from `topic`, dropping the topic entry when the
    /// last subscriber leaves.
    pub fn unsubscribe(&mut self, id: SessionId, topic: &str) -> Response {
        let Some(entry) = self.topics.get_mut(topic) else {
            return Response::rejected(Action::Unsub, topic, "topic not found");
        };
        if !entry.unsubscribe(id) {
            return Response::rejected(Action::Unsub, topic, "topic not subscribed");
        }
        debug!("removed client#{} from topic {}", id, topic);
        if entry.is_empty() {
            self.topics.remove(topic);
            info!("removed topic {}", topic);
        }
        Response::unsub_ack(topic)
    }

    /// Publishes `msg` to every subscriber of `topic` and returns the
    /// publisher's acknowledgement carrying the subscriber count at
    /// fan-out time. Publishing to an unknown topic is not an error, the
    /// count is simply zero.
    ///
    /// Fan-out only enqueues on each receiver's outbound channel, so a
    /// slow peer cannot stall the publisher. A failed handoff to one
    /// stale session is skipped without affecting the rest.
    pub fn publish(&self, id: SessionId, topic: &str, msg: &str) -> Response {
        debug!("client#{} publishing to {}", id, topic);
        let clients = match self.topics.get(topic) {
            None => 0,
            Some(entry) => {
                let delivery = Response::delivery(topic, msg);
                for subscriber in &entry.subscribers {
                    match self.sessions.get(subscriber) {
                        Some(handle) => {
                            if let Err(err) = handle.send(&delivery) {
                                warn!("dropping delivery: {}", err);
                            }
                        }
                        None => warn!("no session registered with id {}", subscriber),
                    }
                }
                entry.subscribers.len()
            }
        };
        if clients > 0 {
            info!(
                "published message \"{}\" for {} clients on topic {}",
                msg, clients, topic
            );
        }
        Response::pub_ack(topic, msg, clients)
    }

    /// Removes `id` from every topic it subscribed to, drops the topics
    /// left without subscribers, and forgets the session's handle. Safe
    /// to call more than once for the same id.
    pub fn remove_session(&mut self, id: SessionId) {
        self.sessions.remove(&id);
        self.topics.retain(|name, topic| {
            if topic.unsubscribe(id) {
                debug!("removed client#{} from topic {}", id, name);
            }
            if topic.is_empty() {
                info!("removed topic {}", name);
                false
            } else {
                true
            }
        });
    }

    fn reply(&self, id: SessionId, response: &Response) {
        match self.sessions.get(&id) {
            Some(handle) => {
                if let Err(err) = handle.send(response) {
                    debug!("reply not delivered: {}", err);
                }
            }
            None => debug!("reply for unknown client#{} dropped", id),
        }
    }
}
