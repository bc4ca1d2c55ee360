//! In-process RCON server used by the integration tests.
//!
//! Each accepted socket gets its own task. The server decodes client packets
//! with the crate's own codec and answers according to a [`MockBehavior`].

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rcon_supervisor::config::RconConfig;
use rcon_supervisor::core::codec::RconCodec;
use rcon_supervisor::core::packet::{Packet, PacketType, AUTH_FAILED_ID};
use rcon_supervisor::service::server::Endpoint;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};

pub const PASSWORD: &str = "hunter2";

/// How the server answers one command
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Delayed(String, Duration),
    Silent,
    Close,
}

/// How the server answers the AUTH packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Check the password; reply with the sentinel id when it is wrong
    Verify,
    /// Send an empty RESPONSE_VALUE before the AUTH_RESPONSE
    VerifyWithEmptyValue,
    /// Never answer
    Silent,
    /// Accept, then close the socket straight away
    AcceptThenClose,
    /// Accept, then keep the socket open without reading another byte
    AcceptThenStall,
}

type Responder = Arc<dyn Fn(&str) -> Reply + Send + Sync>;

#[derive(Clone)]
pub struct MockBehavior {
    pub auth: AuthMode,
    pub responder: Responder,
}

impl MockBehavior {
    /// Echo every command back as `echo:<text>`
    pub fn echo() -> Self {
        Self {
            auth: AuthMode::Verify,
            responder: Arc::new(|text| Reply::Text(format!("echo:{text}"))),
        }
    }

    pub fn with_auth(mut self, auth: AuthMode) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&str) -> Reply + Send + Sync + 'static,
    {
        self.responder = Arc::new(responder);
        self
    }
}

/// Observations shared between the server tasks and the test body
#[derive(Default)]
pub struct MockLog {
    pub connections: AtomicUsize,
    pub commands: Mutex<Vec<String>>,
    pub disconnected: Notify,
}

impl MockLog {
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn count_of(&self, text: &str) -> usize {
        self.commands().iter().filter(|c| c.as_str() == text).count()
    }
}

pub struct MockServer {
    pub addr: SocketAddr,
    pub log: Arc<MockLog>,
    kill: Arc<Notify>,
    task: JoinHandle<()>,
}

impl MockServer {
    pub async fn start(behavior: MockBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let log = Arc::new(MockLog::default());
        let kill = Arc::new(Notify::new());

        let task = tokio::spawn({
            let log = log.clone();
            let kill = kill.clone();
            async move {
                loop {
                    let (socket, _) = match listener.accept().await {
                        Ok(accepted) => accepted,
                        Err(_) => return,
                    };
                    log.connections.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(serve(socket, behavior.clone(), log.clone(), kill.clone()));
                }
            }
        });

        Self {
            addr,
            log,
            kill,
            task,
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.addr.ip().to_string(), self.addr.port())
    }

    /// Drop every open session from the server side
    pub fn kill_sessions(&self) {
        self.kill.notify_waiters();
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
        self.kill.notify_waiters();
    }
}

async fn serve(socket: TcpStream, behavior: MockBehavior, log: Arc<MockLog>, kill: Arc<Notify>) {
    let (reader, writer) = socket.into_split();
    let mut reader = FramedRead::new(reader, RconCodec::default());
    let mut writer = FramedWrite::new(writer, RconCodec::default());

    // Delayed replies are written by a single writer loop so they can overtake each other.
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Option<Packet>>();
    let write_loop = tokio::spawn(async move {
        while let Some(next) = out_rx.recv().await {
            match next {
                Some(packet) => {
                    if writer.send(packet).await.is_err() {
                        return;
                    }
                }
                None => return,
            }
        }
    });

    let killed = kill.notified();
    tokio::pin!(killed);

    loop {
        let packet = tokio::select! {
            _ = &mut killed => break,
            next = reader.next() => match next {
                Some(Ok(packet)) => packet,
                _ => break,
            },
        };

        if packet.kind() == PacketType::Auth.code() {
            match behavior.auth {
                AuthMode::Silent => {}
                AuthMode::Verify
                | AuthMode::VerifyWithEmptyValue
                | AuthMode::AcceptThenClose
                | AuthMode::AcceptThenStall => {
                    if behavior.auth == AuthMode::VerifyWithEmptyValue {
                        let _ = out_tx.send(Some(Packet::new(
                            packet.request_id(),
                            PacketType::ResponseValue,
                            "",
                        )));
                    }
                    let id = if packet.payload() == PASSWORD {
                        packet.request_id()
                    } else {
                        AUTH_FAILED_ID
                    };
                    let _ = out_tx.send(Some(Packet::new(id, PacketType::AuthResponse, "")));
                    if behavior.auth == AuthMode::AcceptThenClose {
                        let _ = out_tx.send(None);
                        break;
                    }
                    if behavior.auth == AuthMode::AcceptThenStall {
                        (&mut killed).await;
                        break;
                    }
                }
            }
            continue;
        }

        log.commands.lock().unwrap().push(packet.payload().to_owned());
        match (behavior.responder)(packet.payload()) {
            Reply::Text(text) => {
                let _ = out_tx.send(Some(Packet::new(
                    packet.request_id(),
                    PacketType::ResponseValue,
                    text,
                )));
            }
            Reply::Delayed(text, delay) => {
                let out_tx = out_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = out_tx.send(Some(Packet::new(
                        packet.request_id(),
                        PacketType::ResponseValue,
                        text,
                    )));
                });
            }
            Reply::Silent => {}
            Reply::Close => {
                let _ = out_tx.send(None);
                break;
            }
        }
    }

    drop(out_tx);
    let _ = write_loop.await;
    log.disconnected.notify_waiters();
}

/// Client settings short enough for tests to observe every deadline
pub fn fast_config() -> RconConfig {
    RconConfig::default_with_overrides(|config| {
        config.client.connect_timeout = Duration::from_secs(2);
        config.client.auth_timeout = Duration::from_millis(300);
        config.client.command_timeout = Duration::from_millis(300);
        config.client.idle_timeout = Duration::from_secs(5);
        config.client.keepalive_interval = Duration::from_secs(2);
        config.supervisor.sweep_interval = Duration::from_millis(100);
    })
}

/// Poll `check` until it holds or the deadline passes
pub async fn eventually<F>(deadline: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let give_up = tokio::time::Instant::now() + deadline;
    while tokio::time::Instant::now() < give_up {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
