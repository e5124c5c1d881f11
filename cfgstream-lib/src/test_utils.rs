#![cfg(test)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tokio::task::JoinHandle;

use crate::types::Result;
use crate::{ConfigSink, HostAddr};

/// Time to wait for something to arrive before failing a test
pub(crate) const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// A node that keeps the streaming response open after sending its chunks,
/// like a real cluster does. wiremock always closes the body, so it cannot
/// be used to test long-lived sessions.
pub(crate) struct StreamingServer {
    addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl StreamingServer {
    /// Start a node answering every request with `200 OK` followed by
    /// `chunks`, each sent as a separate HTTP chunk.
    pub(crate) async fn start(chunks: Vec<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));

        let task = tokio::spawn({
            let accepted = Arc::clone(&accepted);
            async move {
                while let Ok((socket, _)) = listener.accept().await {
                    accepted.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(serve(socket, chunks.clone()));
                }
            }
        });

        Self {
            addr,
            accepted,
            task,
        }
    }

    pub(crate) fn host(&self) -> HostAddr {
        HostAddr::new(&self.addr.ip().to_string(), self.addr.port())
    }

    /// Number of connections accepted so far
    pub(crate) fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

impl Drop for StreamingServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(mut socket: TcpStream, chunks: Vec<String>) {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|window| window == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }

    let header = "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ntransfer-encoding: chunked\r\n\r\n";
    if socket.write_all(header.as_bytes()).await.is_err() {
        return;
    }
    for chunk in chunks.iter().filter(|chunk| !chunk.is_empty()) {
        let frame = format!("{:x}\r\n{chunk}\r\n", chunk.len());
        if socket.write_all(frame.as_bytes()).await.is_err() {
            return;
        }
        let _ = socket.flush().await;
    }

    // Keep the stream open until the client goes away
    loop {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
    }
}

/// An address nothing listens on
pub(crate) async fn closed_port() -> HostAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    HostAddr::new(&addr.ip().to_string(), addr.port())
}

/// A sink recording every block it receives
pub(crate) fn recording_sink() -> (impl ConfigSink, UnboundedReceiver<(String, HostAddr)>) {
    let (tx, rx) = unbounded_channel();
    let sink = move |block: &str, source: &HostAddr| -> Result<()> {
        let _ = tx.send((block.to_string(), source.clone()));
        Ok(())
    };
    (sink, rx)
}

/// Receive the next item or fail the test after [`TEST_TIMEOUT`]
pub(crate) async fn next<T>(rx: &mut UnboundedReceiver<T>) -> T {
    tokio::time::timeout(TEST_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for config")
        .expect("channel closed")
}
