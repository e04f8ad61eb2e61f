//! Shared utilities for integration and load testing.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use hwl_proxy::config::{ProxyConfig, ProxyRole};
use hwl_proxy::http::framing::{read_body, read_header_block};
use hwl_proxy::lifecycle::{start, RunningProxy};
use hwl_proxy::whitelist::{parse_rules, Whitelist};

pub const LIMIT: usize = 64 * 1024;

pub const RULES: &str = r#"[
    {"key": "host"},
    {"key": "connection", "val": "(?i)(close|keep-alive)"},
    {"key": "content-length", "val": "\\d+"},
    {"key": "transfer-encoding", "val": "(?i)(chunked)"}
]"#;

pub const ORIGIN_RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello";

pub const BAD_REQUEST: &[u8] = b"HTTP/1.1 400 Bad Request\r\nContent-Length: 11\r\n\r\nBad Request";

pub fn whitelist() -> Whitelist {
    Whitelist::new(parse_rules(RULES).unwrap())
}

/// Intermediary wiring on loopback with ephemeral listeners.
pub fn intermediary_config(relay_port: u16, next_hop: SocketAddr) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.role = ProxyRole::Intermediary;
    config.listener.incoming_address = "127.0.0.1:0".into();
    config.relay.local_out_port = relay_port;
    config.relay.local_in_port = 0;
    config.relay.next_hop_address = next_hop.to_string();
    config.timeouts.connection_secs = 5;
    config.timeouts.shutdown_grace_secs = 1;
    config
}

/// Origin stand-in: answers every request with `ORIGIN_RESPONSE`, keeping
/// connections alive, and reports every request it receives.
pub struct MockOrigin {
    addr: SocketAddr,
    seen: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl MockOrigin {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, seen) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let (read_half, mut write_half) = socket.into_split();
                    let mut reader = BufReader::new(read_half);
                    while let Ok(head) = read_header_block(&mut reader, LIMIT).await {
                        let Ok(request) = read_body(head, &mut reader, false).await else {
                            break;
                        };
                        let _ = tx.send(request);
                        if write_half.write_all(ORIGIN_RESPONSE).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });

        Self { addr, seen }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn next_request(&mut self) -> Vec<u8> {
        tokio::time::timeout(Duration::from_secs(5), self.seen.recv())
            .await
            .expect("origin saw no request")
            .expect("origin stopped")
    }

    /// Requests received so far and not yet taken.
    pub fn drain(&mut self) -> Vec<Vec<u8>> {
        let mut requests = Vec::new();
        while let Ok(request) = self.seen.try_recv() {
            requests.push(request);
        }
        requests
    }
}

pub type Rewrite = Arc<dyn Fn(Vec<u8>) -> Vec<u8> + Send + Sync>;

/// Relay stand-in sitting between the two legs.
///
/// Each connection from the incoming leg gets its own connection to the
/// outgoing leg; requests may be rewritten on the way through.
pub struct MockRelay {
    port: u16,
    target: Arc<Mutex<Option<SocketAddr>>>,
    seen: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl MockRelay {
    pub async fn start() -> Self {
        Self::with_rewrite(Arc::new(|request| request)).await
    }

    pub async fn with_rewrite(rewrite: Rewrite) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let target: Arc<Mutex<Option<SocketAddr>>> = Arc::new(Mutex::new(None));
        let (tx, seen) = mpsc::unbounded_channel();

        let relay_target = Arc::clone(&target);
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let Some(target) = *relay_target.lock().unwrap() else {
                    continue;
                };
                let tx = tx.clone();
                let rewrite = Arc::clone(&rewrite);
                tokio::spawn(async move {
                    let Ok(upstream) = TcpStream::connect(target).await else {
                        return;
                    };
                    let (up_read, mut up_write) = upstream.into_split();
                    let mut up_reader = BufReader::new(up_read);
                    let (down_read, mut down_write) = socket.into_split();
                    let mut down_reader = BufReader::new(down_read);

                    while let Ok(head) = read_header_block(&mut down_reader, LIMIT).await {
                        let Ok(request) = read_body(head, &mut down_reader, false).await else {
                            break;
                        };
                        let _ = tx.send(request.clone());
                        if up_write.write_all(&rewrite(request)).await.is_err() {
                            break;
                        }
                        let Ok(head) = read_header_block(&mut up_reader, LIMIT).await else {
                            break;
                        };
                        let Ok(response) = read_body(head, &mut up_reader, false).await else {
                            break;
                        };
                        if down_write.write_all(&response).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });

        Self { port, target, seen }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Where relayed requests go: the proxy's outgoing leg.
    pub fn forward_to(&self, addr: SocketAddr) {
        *self.target.lock().unwrap() = Some(addr);
    }

    pub async fn next_request(&mut self) -> Vec<u8> {
        tokio::time::timeout(Duration::from_secs(5), self.seen.recv())
            .await
            .expect("relay saw no request")
            .expect("relay stopped")
    }
}

/// A proxy in the intermediary role wired to a mock relay and mock origin.
pub struct Harness {
    pub proxy: RunningProxy,
    pub relay: MockRelay,
    pub origin: MockOrigin,
}

impl Harness {
    pub async fn start() -> Self {
        Self::start_with(MockRelay::start().await, |_| {}).await
    }

    pub async fn start_with(relay: MockRelay, configure: impl FnOnce(&mut ProxyConfig)) -> Self {
        let origin = MockOrigin::start().await;
        let mut config = intermediary_config(relay.port(), origin.addr());
        configure(&mut config);

        let whitelist = if config.whitelist.enabled {
            whitelist()
        } else {
            Whitelist::default()
        };
        let proxy = start(config, whitelist).await.unwrap();
        relay.forward_to(proxy.outgoing_addr().unwrap());

        Self { proxy, relay, origin }
    }

    pub async fn client(&self) -> RawClient {
        RawClient::connect(self.proxy.incoming_addr()).await
    }
}

/// Byte-level HTTP client for exact wire assertions.
pub struct RawClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl RawClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer,
        }
    }

    pub async fn send(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
    }

    /// Reads one complete response.
    pub async fn response(&mut self) -> Vec<u8> {
        let read = async {
            let head = read_header_block(&mut self.reader, LIMIT).await.unwrap();
            read_body(head, &mut self.reader, false).await.unwrap()
        };
        tokio::time::timeout(Duration::from_secs(5), read)
            .await
            .expect("no response")
    }

    pub async fn round_trip(&mut self, request: &[u8]) -> Vec<u8> {
        self.send(request).await;
        self.response().await
    }

    /// Everything the proxy writes until it closes the connection.
    pub async fn read_to_close(mut self) -> Vec<u8> {
        let mut out = Vec::new();
        tokio::time::timeout(Duration::from_secs(10), self.reader.read_to_end(&mut out))
            .await
            .expect("connection was not closed")
            .unwrap_or_default();
        out
    }
}

pub fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Value of the single `X-Message-ID` header in `request`.
pub fn message_id(request: &[u8]) -> String {
    let ids = hwl_proxy::http::field_values(request, "X-Message-ID");
    assert_eq!(ids.len(), 1, "expected one X-Message-ID in {}", text(request));
    text(ids[0])
}
