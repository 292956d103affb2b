use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, info, warn};

use crate::broker::Broker;
use crate::broker::message::Response;
use crate::broker::topic::SessionId;
use crate::session::handle::{SessionHandle, StopSignal};
use crate::transport::message::decode_command;

/// Why a session's read loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The peer closed the connection or a read failed. The caller must
    /// run teardown for this session.
    Disconnected,
    /// A stop was requested as part of an externally driven teardown;
    /// the initiator owns the cleanup, so nothing is reported.
    Stopped,
}

/// One accepted connection: the read loop turning inbound frames into
/// broker commands, plus the writer task draining the outbound queue.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    stream: TcpStream,
    outbound: UnboundedReceiver<String>,
    signal: Arc<StopSignal>,
    handle: SessionHandle,
}

impl Session {
    /// Builds a session for an accepted stream, returning it together
    /// with the handle the rest of the system uses to reach it.
    pub fn open(id: SessionId, stream: TcpStream) -> (Self, SessionHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let signal = Arc::new(StopSignal::default());
        let handle = SessionHandle::new(id, tx, Arc::clone(&signal));
        let session = Self {
            id,
            stream,
            outbound: rx,
            signal,
            handle: handle.clone(),
        };
        (session, handle)
    }

    /// Reads newline-framed commands until the peer disconnects, a read
    /// fails, or a stop is requested.
    ///
    /// Decoded commands go to the broker's dispatch entry point; a frame
    /// that fails to decode gets a `fail` reply and the loop keeps
    /// going. The socket write side is serviced by a separate task, so
    /// fan-out from other sessions never blocks on this peer.
    pub async fn run(self, broker: Arc<Mutex<Broker>>) -> Exit {
        let Session {
            id,
            stream,
            outbound,
            signal,
            handle,
        } = self;
        let (read_half, write_half) = stream.into_split();
        tokio::spawn(write_loop(id, write_half, outbound));

        let mut lines = BufReader::new(read_half).lines();
        loop {
            if signal.is_raised() {
                return Exit::Stopped;
            }
            tokio::select! {
                _ = signal.raised() => return Exit::Stopped,
                line = lines.next_line() => match line {
                    Ok(Some(line)) => handle_frame(&broker, &handle, id, &line),
                    Ok(None) => {
                        info!("client#{} disconnected", id);
                        return Exit::Disconnected;
                    }
                    Err(err) => {
                        warn!("client#{} read failed: {}", id, err);
                        return Exit::Disconnected;
                    }
                },
            }
        }
    }
}

fn handle_frame(broker: &Arc<Mutex<Broker>>, handle: &SessionHandle, id: SessionId, frame: &str) {
    match decode_command(frame) {
        Ok(cmd) => broker.lock().unwrap().dispatch(id, cmd),
        Err(err) => {
            debug!("client#{} sent undecodable input: {}", id, err);
            if handle.send(&Response::protocol_error(err)).is_err() {
                debug!("client#{} gone before error reply", id);
            }
        }
    }
}

async fn write_loop(id: SessionId, mut half: OwnedWriteHalf, mut outbound: UnboundedReceiver<String>) {
    while let Some(frame) = outbound.recv().await {
        if let Err(err) = half.write_all(frame.as_bytes()).await {
            debug!("client#{} write failed: {}", id, err);
            break;
        }
    }
    debug!("send loop closed for client#{}", id);
}
