use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::broker::Broker;
use crate::broker::topic::SessionId;
use crate::session::{Exit, Session, SessionHandle};

/// A live entry in the active-session table: the shared handle plus the
/// join handle of the connection task running the read loop.
#[derive(Debug)]
struct SessionEntry {
    handle: SessionHandle,
    task: JoinHandle<()>,
}

/// Accepts connections, hands each one to its own session task, and
/// unwinds session state on disconnect and on shutdown.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    broker: Arc<Mutex<Broker>>,
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
    next_id: AtomicU64,
    stopping: watch::Sender<bool>,
}

impl Server {
    /// Binds the listening socket. Nothing is accepted until
    /// [`Server::serve`] is awaited.
    pub async fn bind(addr: &str, broker: Arc<Mutex<Broker>>) -> io::Result<Server> {
        let listener = TcpListener::bind(addr).await?;
        info!("start listening connections in {}", listener.local_addr()?);
        let (stopping, _) = watch::channel(false);
        Ok(Server {
            listener,
            broker,
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            stopping,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept loop. Runs until [`Server::shutdown`] flips the signal;
    /// an individual accept failure is logged and does not stop the
    /// loop.
    pub async fn serve(self: Arc<Self>) {
        let mut stopping = self.stopping.subscribe();
        loop {
            tokio::select! {
                _ = stopping.changed() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        info!("new connection, address {}", peer);
                        Self::attach(&self, stream);
                    }
                    Err(err) => warn!("accept failed: {}", err),
                },
            }
        }
    }

    /// Registers an accepted stream as a new session and spawns its read
    /// loop. A peer-initiated close reports back through
    /// [`Server::teardown`]; an externally requested stop is cleaned up
    /// by whoever requested it instead.
    fn attach(server: &Arc<Self>, stream: TcpStream) {
        let id = server.next_id.fetch_add(1, Ordering::Relaxed);
        let (session, handle) = Session::open(id, stream);
        server.broker.lock().unwrap().register_session(handle.clone());

        let task_server = Arc::clone(server);
        let broker = Arc::clone(&server.broker);
        let task = tokio::spawn(async move {
            if session.run(broker).await == Exit::Disconnected {
                task_server.teardown(id);
            }
        });

        let mut sessions = server.sessions.lock().unwrap();
        sessions.insert(id, SessionEntry { handle, task });
        info!("added client#{}, total connections: {}", id, sessions.len());
    }

    /// Disconnect teardown: removes the session from every topic, then
    /// retires its id from the active table. Tolerates a duplicate close
    /// report for the same id.
    pub(crate) fn teardown(&self, id: SessionId) {
        self.broker.lock().unwrap().remove_session(id);
        let mut sessions = self.sessions.lock().unwrap();
        match sessions.remove(&id) {
            Some(_) => info!(
                "removed client#{}, total connections: {}",
                id,
                sessions.len()
            ),
            None => debug!("client#{} already removed", id),
        }
    }

    /// Orderly shutdown: stop accepting, ask every live session to
    /// stop, wait for their read loops to finish, then unwind what the
    /// sessions left in the registry.
    pub async fn shutdown(&self) {
        let _ = self.stopping.send(true);

        let entries: Vec<(SessionId, SessionEntry)> = {
            let mut sessions = self.sessions.lock().unwrap();
            sessions.drain().collect()
        };
        for (_, entry) in &entries {
            entry.handle.stop();
        }
        let (ids, tasks): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .map(|(id, entry)| (id, entry.task))
            .unzip();
        let _ = join_all(tasks).await;

        let mut broker = self.broker.lock().unwrap();
        for id in ids {
            broker.remove_session(id);
        }
        info!("closing server");
    }
}
