use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;
use tokio::sync::mpsc::UnboundedSender;

use crate::broker::message::Response;
use crate::broker::topic::SessionId;
use crate::transport::message::encode_response;
use crate::utils::error::SessionClosed;

/// Cooperative stop signal shared between a session's read loop and its
/// handle.
///
/// `Notify` keeps a single stored permit, so a stop raised while the
/// loop is busy with a command is still observed at its next await.
#[derive(Debug, Default)]
pub(crate) struct StopSignal {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    pub(crate) fn raise(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.notify.notify_one();
        }
    }

    pub(crate) fn is_raised(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub(crate) async fn raised(&self) {
        self.notify.notified().await;
    }
}

/// Registry-facing side of a session.
///
/// Other components never touch a session's connection handle directly:
/// outbound traffic goes through [`SessionHandle::send`], which only
/// enqueues on the session's writer task, and lifecycle control goes
/// through [`SessionHandle::stop`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    outbound: UnboundedSender<String>,
    signal: Arc<StopSignal>,
}

impl SessionHandle {
    pub(crate) fn new(
        id: SessionId,
        outbound: UnboundedSender<String>,
        signal: Arc<StopSignal>,
    ) -> Self {
        Self {
            id,
            outbound,
            signal,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Queues a response for delivery to this session's peer. Callable
    /// from any task; never blocks and never closes the connection.
    pub fn send(&self, response: &Response) -> Result<(), SessionClosed> {
        self.outbound
            .send(encode_response(response))
            .map_err(|_| SessionClosed(self.id))
    }

    /// Asks the session's read loop to exit at its next await point.
    /// Idempotent; an in-flight read is never interrupted.
    pub fn stop(&self) {
        self.signal.raise();
    }
}
