use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use chatstatus::config::ChatServerEntry;
use chatstatus::{ExecutorPool, Gateway, StatusService, server};

pub struct TestServer {
    pub addr: SocketAddr,
    pub gateway: Arc<Gateway>,
    pub contexts: Arc<ExecutorPool>,
    shutdown: CancellationToken,
    task: JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    pub async fn stop(self) {
        self.shutdown.cancel();
        timeout(Duration::from_secs(2), self.task)
            .await
            .expect("listener did not stop")
            .expect("listener task panicked")
            .expect("listener failed");
        self.contexts.stop();
    }
}

#[allow(dead_code)]
pub fn entry(name: &str, host: &str, port: &str) -> ChatServerEntry {
    ChatServerEntry {
        name: name.into(),
        host: host.into(),
        port: port.into(),
    }
}

/// Runs the listener on an ephemeral loopback port with two execution
/// contexts and the given chat servers.
pub async fn start_server(entries: &[ChatServerEntry]) -> TestServer {
    let gateway = Arc::new(Gateway::from_entries(entries).expect("build gateway"));
    let contexts = Arc::new(ExecutorPool::new(2).expect("start contexts"));
    let shutdown = CancellationToken::new();

    let listener = server::bind("127.0.0.1:0".parse().unwrap()).expect("bind loopback");
    let addr = listener.local_addr().unwrap();

    let stop = shutdown.clone();
    let task = tokio::spawn(server::serve(
        listener,
        Arc::clone(&contexts),
        StatusService::new(Arc::clone(&gateway)),
        async move { stop.cancelled().await },
    ));

    TestServer {
        addr,
        gateway,
        contexts,
        shutdown,
        task,
    }
}

pub struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Client {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let (read_half, writer) = stream.into_split();
        Self {
            lines: BufReader::new(read_half).lines(),
            writer,
        }
    }

    /// Sends one line and waits for the reply line.
    pub async fn call(&mut self, line: &str) -> serde_json::Value {
        self.call_bytes(line.as_bytes()).await
    }

    /// Like `call`, for payloads that are not valid text.
    pub async fn call_bytes(&mut self, line: &[u8]) -> serde_json::Value {
        self.writer.write_all(line).await.expect("write");
        self.writer.write_all(b"\n").await.expect("write");

        let reply = timeout(Duration::from_secs(2), self.lines.next_line())
            .await
            .expect("reply timed out")
            .expect("read")
            .expect("connection closed");
        serde_json::from_str(&reply).expect("reply is json")
    }
}
