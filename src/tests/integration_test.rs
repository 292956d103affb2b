//! End-to-end scenarios over real TCP connections.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

use crate::broker::Broker;
use crate::transport::server::Server;

struct TestClient {
    reader: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let (read, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read).lines(),
            writer,
        }
    }

    async fn send(&mut self, frame: Value) {
        let mut line = frame.to_string();
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await.expect("write");
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.expect("write");
    }

    async fn recv(&mut self) -> Value {
        let line = timeout(Duration::from_secs(5), self.reader.next_line())
            .await
            .expect("timed out waiting for a response")
            .expect("read")
            .expect("connection closed early");
        serde_json::from_str(&line).expect("response should be valid JSON")
    }
}

async fn start_server() -> (Arc<Server>, SocketAddr) {
    let broker = Arc::new(Mutex::new(Broker::new()));
    let server = Arc::new(Server::bind("127.0.0.1:0", broker).await.expect("bind"));
    let addr = server.local_addr().expect("local addr");
    tokio::spawn(Arc::clone(&server).serve());
    (server, addr)
}

#[tokio::test]
async fn subscriber_receives_published_message() {
    let (_server, addr) = start_server().await;
    let mut a = TestClient::connect(addr).await;
    let mut b = TestClient::connect(addr).await;

    a.send(json!({"cmd":"sub","topic":"news"})).await;
    assert_eq!(
        a.recv().await,
        json!({"status":"ok","msg":{"action":"sub","topic":"news"}})
    );

    b.send(json!({"cmd":"pub","topic":"news","msg":"hello"})).await;
    assert_eq!(
        b.recv().await,
        json!({"status":"ok","msg":{"action":"pub","topic":"news","msg":"hello","clients":1}})
    );
    assert_eq!(
        a.recv().await,
        json!({"status":"msg","msg":{"topic":"news","msg":"hello"}})
    );
}

#[tokio::test]
async fn duplicate_subscribe_is_rejected() {
    let (_server, addr) = start_server().await;
    let mut a = TestClient::connect(addr).await;

    a.send(json!({"cmd":"sub","topic":"news"})).await;
    assert_eq!(
        a.recv().await,
        json!({"status":"ok","msg":{"action":"sub","topic":"news"}})
    );
    a.send(json!({"cmd":"sub","topic":"news"})).await;
    assert_eq!(
        a.recv().await,
        json!({"status":"fail","msg":{"action":"sub","topic":"news","msg":"already subscribed"}})
    );
}

#[tokio::test]
async fn unsubscribe_without_subscription_is_rejected() {
    let (_server, addr) = start_server().await;
    let mut holder = TestClient::connect(addr).await;
    let mut a = TestClient::connect(addr).await;

    // another client keeps the topic alive, so the failure below is
    // about the missing membership rather than the missing topic
    holder.send(json!({"cmd":"sub","topic":"sports"})).await;
    holder.recv().await;

    a.send(json!({"cmd":"unsub","topic":"sports"})).await;
    assert_eq!(
        a.recv().await,
        json!({"status":"fail","msg":{"action":"unsub","topic":"sports","msg":"topic not subscribed"}})
    );

    a.send(json!({"cmd":"unsub","topic":"absent"})).await;
    assert_eq!(
        a.recv().await,
        json!({"status":"fail","msg":{"action":"unsub","topic":"absent","msg":"topic not found"}})
    );
}

#[tokio::test]
async fn malformed_input_keeps_the_connection_alive() {
    let (_server, addr) = start_server().await;
    let mut a = TestClient::connect(addr).await;

    a.send_raw(b"this is not json\n").await;
    assert_eq!(a.recv().await, json!({"status":"fail","msg":"parsing error"}));

    a.send(json!({"topic":"news"})).await;
    assert_eq!(
        a.recv().await,
        json!({"status":"fail","msg":"missing command"})
    );

    a.send(json!({"cmd":"mystery","topic":"news"})).await;
    assert_eq!(
        a.recv().await,
        json!({"status":"fail","msg":"undefined command"})
    );

    a.send(json!({"cmd":"pub","topic":"news"})).await;
    assert_eq!(
        a.recv().await,
        json!({"status":"fail","msg":"missing message"})
    );

    // the session survives all of it
    a.send(json!({"cmd":"sub","topic":"news"})).await;
    assert_eq!(
        a.recv().await,
        json!({"status":"ok","msg":{"action":"sub","topic":"news"}})
    );
}

#[tokio::test]
async fn frames_do_not_depend_on_read_boundaries() {
    let (_server, addr) = start_server().await;
    let mut a = TestClient::connect(addr).await;

    // two commands in a single write
    a.send_raw(b"{\"cmd\":\"sub\",\"topic\":\"one\"}\n{\"cmd\":\"sub\",\"topic\":\"two\"}\n")
        .await;
    assert_eq!(
        a.recv().await,
        json!({"status":"ok","msg":{"action":"sub","topic":"one"}})
    );
    assert_eq!(
        a.recv().await,
        json!({"status":"ok","msg":{"action":"sub","topic":"two"}})
    );

    // one command split across two writes
    a.send_raw(b"{\"cmd\":\"sub\",\"to").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    a.send_raw(b"pic\":\"three\"}\n").await;
    assert_eq!(
        a.recv().await,
        json!({"status":"ok","msg":{"action":"sub","topic":"three"}})
    );
}

#[tokio::test]
async fn disconnect_tears_down_subscriptions() {
    let (_server, addr) = start_server().await;
    let mut a = TestClient::connect(addr).await;
    let mut b = TestClient::connect(addr).await;

    a.send(json!({"cmd":"sub","topic":"news"})).await;
    a.recv().await;
    drop(a);

    // teardown runs on the departed session's task; poll the subscriber
    // count until it is observed
    let mut clients = usize::MAX;
    for _ in 0..50 {
        b.send(json!({"cmd":"pub","topic":"news","msg":"ping"})).await;
        let ack = b.recv().await;
        clients = ack["msg"]["clients"].as_u64().expect("clients field") as usize;
        if clients == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(clients, 0, "departed subscriber still counted");
}

#[tokio::test]
async fn shutdown_stops_sessions_and_completes() {
    let (server, addr) = start_server().await;
    let mut a = TestClient::connect(addr).await;
    a.send(json!({"cmd":"sub","topic":"news"})).await;
    a.recv().await;

    timeout(Duration::from_secs(5), server.shutdown())
        .await
        .expect("shutdown should complete promptly");

    // the server side wound down; the next read observes EOF
    let eof = timeout(Duration::from_secs(5), a.reader.next_line())
        .await
        .expect("timed out waiting for the close")
        .expect("read");
    assert_eq!(eof, None);
}
