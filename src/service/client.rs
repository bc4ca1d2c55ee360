//! # RCON Client
//!
//! One authenticated console session over one TCP socket.
//!
//! The socket is owned by a single connection task. That task reads bytes,
//! slices packets with [`RconCodec`], correlates responses with pending
//! requests, expires deadlines, sends keep-alives and finally tears everything
//! down. Writes go through a separate writer task, so a peer that stops
//! reading cannot hold up deadlines or shutdown. [`RconClient`] is a cheap,
//! cloneable handle that talks to the task over channels, so no lock guards
//! the pending map or the socket.
//!
//! ## Lifecycle
//! 1. `connect` opens the socket and sends the AUTH packet
//! 2. `connect` resolves once the AUTH_RESPONSE arrives (or the handshake fails)
//! 3. Commands are correlated by request id; keep-alives run every interval
//! 4. `disconnect`, a socket error, an idle timeout or the remote closing ends
//!    the session: every waiter is failed and `closed()` resolves exactly once

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use futures::SinkExt;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_util::codec::{Decoder, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::ClientConfig;
use crate::core::codec::RconCodec;
use crate::core::packet::{Packet, PacketType, SIZE_FIELD_LEN};
use crate::error::{ProtocolError, Result};
use crate::protocol::handshake::{self, AuthOutcome};
use crate::protocol::pending::{PendingRequest, PendingRequests, RequestKind, Responder};
use crate::service::server::Endpoint;
use crate::utils::metrics::global_metrics;
use crate::utils::timeout::with_timeout_error;

/// Queued commands per client before callers wait for room
const REQUEST_QUEUE_DEPTH: usize = 64;

struct CommandRequest {
    text: String,
    reply: oneshot::Sender<Result<String>>,
}

#[derive(Debug, Default)]
struct SessionFlags {
    connected: AtomicBool,
    authenticated: AtomicBool,
}

/// Handle to one RCON session
#[derive(Clone)]
pub struct RconClient {
    endpoint: Endpoint,
    flags: Arc<SessionFlags>,
    requests: mpsc::Sender<CommandRequest>,
    shutdown: CancellationToken,
    closed: CancellationToken,
}

impl std::fmt::Debug for RconClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RconClient")
            .field("endpoint", &self.endpoint)
            .field("connected", &self.is_connected())
            .field("authenticated", &self.is_authenticated())
            .field("closed", &self.closed.is_cancelled())
            .finish()
    }
}

impl RconClient {
    /// Open a socket to `endpoint` and authenticate with `credential`.
    ///
    /// Resolves only after the handshake verdict. On failure the socket is
    /// torn down and nothing is left running.
    #[instrument(skip(credential, config), fields(endpoint = %endpoint))]
    pub async fn connect(
        endpoint: &Endpoint,
        credential: &str,
        config: &ClientConfig,
    ) -> Result<Self> {
        let metrics = global_metrics();

        let address = endpoint.to_string();
        let stream = with_timeout_error(
            async { TcpStream::connect(address.as_str()).await.map_err(connect_error) },
            config.connect_timeout,
            ProtocolError::ConnectTimeout,
        )
        .await
        .inspect_err(|e| {
            metrics.connection_error();
            warn!(error = %e, "TCP connect failed");
        })?;
        // Console traffic is small request/response pairs.
        stream.set_nodelay(true).ok();

        metrics.connection_established();
        info!("Connected, authenticating");

        let flags = Arc::new(SessionFlags::default());
        flags.connected.store(true, Ordering::SeqCst);

        let (request_tx, request_rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        let (auth_tx, auth_rx) = oneshot::channel();
        let shutdown = CancellationToken::new();
        let closed = CancellationToken::new();

        let (reader, writer) = stream.into_split();
        let codec = RconCodec::new(config.max_payload_size);

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (failure_tx, failure_rx) = mpsc::unbounded_channel();
        let writer_stop = shutdown.child_token();
        let writer = tokio::spawn(write_loop(
            FramedWrite::new(writer, codec),
            outbound_rx,
            failure_tx,
            writer_stop.clone(),
        ));

        let connection = Connection {
            endpoint: endpoint.clone(),
            reader,
            outbound: outbound_tx,
            write_failures: failure_rx,
            writer,
            writer_stop,
            codec,
            buffer: BytesMut::with_capacity(4096),
            pending: PendingRequests::new(),
            flags: flags.clone(),
            config: config.clone(),
            requests: request_rx,
            shutdown: shutdown.clone(),
            closed: closed.clone(),
            keepalive: None,
        };
        tokio::spawn(connection.run(credential.to_owned(), auth_tx));

        let client = Self {
            endpoint: endpoint.clone(),
            flags,
            requests: request_tx,
            shutdown,
            closed,
        };

        let verdict = auth_rx.await.unwrap_or(Err(ProtocolError::ConnectionClosed));
        match verdict {
            Ok(()) => Ok(client),
            Err(e) => {
                client.disconnect().await;
                Err(e)
            }
        }
    }

    /// Send a console command and wait for its response text.
    ///
    /// Fails immediately with `NotAuthenticated` when the session is not ready,
    /// without touching the network.
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn send_command(&self, text: &str) -> Result<String> {
        if !self.is_ready() {
            return Err(ProtocolError::NotAuthenticated);
        }

        let (reply, response) = oneshot::channel();
        self.requests
            .send(CommandRequest {
                text: text.to_owned(),
                reply,
            })
            .await
            .map_err(|_| ProtocolError::ConnectionClosed)?;

        response.await.unwrap_or(Err(ProtocolError::ConnectionClosed))
    }

    /// Close the session and wait until teardown finished. Idempotent.
    pub async fn disconnect(&self) {
        self.shutdown.cancel();
        self.closed.cancelled().await;
    }

    /// Resolves once the session has closed, for whatever reason
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    /// Token cancelled when the session closes
    pub fn closed_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.flags.connected.load(Ordering::SeqCst)
    }

    pub fn is_authenticated(&self) -> bool {
        self.flags.authenticated.load(Ordering::SeqCst)
    }

    /// Socket open and authenticated: the session accepts commands
    pub fn is_ready(&self) -> bool {
        !self.closed.is_cancelled() && self.is_connected() && self.is_authenticated()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

fn connect_error(err: std::io::Error) -> ProtocolError {
    match err.kind() {
        std::io::ErrorKind::ConnectionRefused => ProtocolError::ConnectRefused,
        std::io::ErrorKind::TimedOut => ProtocolError::ConnectTimeout,
        _ => ProtocolError::SocketError(err.to_string()),
    }
}

fn socket_error(err: ProtocolError) -> ProtocolError {
    match err {
        ProtocolError::Io(e) => ProtocolError::SocketError(e.to_string()),
        other => other,
    }
}

/// What a queued write is for; decides how a failed write is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WritePurpose {
    Auth,
    Command,
    KeepAlive,
}

struct Outbound {
    packet: Packet,
    purpose: WritePurpose,
}

struct WriteFailure {
    request_id: i32,
    purpose: WritePurpose,
    error: ProtocolError,
}

/// Connection task state; lives for exactly one socket
struct Connection {
    endpoint: Endpoint,
    reader: OwnedReadHalf,
    outbound: mpsc::UnboundedSender<Outbound>,
    write_failures: mpsc::UnboundedReceiver<WriteFailure>,
    writer: JoinHandle<()>,
    writer_stop: CancellationToken,
    codec: RconCodec,
    buffer: BytesMut,
    pending: PendingRequests,
    flags: Arc<SessionFlags>,
    config: ClientConfig,
    requests: mpsc::Receiver<CommandRequest>,
    shutdown: CancellationToken,
    closed: CancellationToken,
    keepalive: Option<Interval>,
}

impl Connection {
    async fn run(mut self, credential: String, auth_reply: oneshot::Sender<Result<()>>) {
        let reason = self.drive(credential, auth_reply).await;
        self.teardown(reason).await;
    }

    async fn drive(
        &mut self,
        credential: String,
        auth_reply: oneshot::Sender<Result<()>>,
    ) -> ProtocolError {
        global_metrics().handshake_attempt();
        let auth_id = self.pending.next_request_id();
        self.pending
            .register(auth_id, Responder::Auth(auth_reply), self.config.auth_timeout);
        debug!(request_id = auth_id, "Sending authentication packet");
        let auth = handshake::auth_packet(auth_id, &credential);
        if let Err(e) = self.queue(auth, WritePurpose::Auth) {
            return e;
        }

        let idle = time::sleep(self.config.idle_timeout);
        tokio::pin!(idle);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return ProtocolError::ConnectionClosed,

                read = self.reader.read_buf(&mut self.buffer) => match read {
                    Ok(0) => return ProtocolError::ConnectionClosed,
                    Ok(n) => {
                        global_metrics().bytes_read(n as u64);
                        idle.as_mut().reset(Instant::now() + self.config.idle_timeout);
                        if let Err(e) = self.drain_packets() {
                            return e;
                        }
                    }
                    Err(e) => return socket_error(e.into()),
                },

                Some(expired) = self.pending.expired(), if !self.pending.is_empty() => {
                    match expired.kind() {
                        RequestKind::Auth => {
                            global_metrics().handshake_failed();
                            warn!("Authentication timed out");
                            expired.fail(ProtocolError::AuthTimeout);
                            return ProtocolError::AuthTimeout;
                        }
                        RequestKind::Command => {
                            global_metrics().command_timeout();
                            warn!(request_id = expired.request_id, "Command timed out");
                            expired.fail(ProtocolError::CommandTimeout);
                        }
                    }
                }

                Some(failure) = self.write_failures.recv() => {
                    if let Some(reason) = self.write_failed(failure) {
                        return reason;
                    }
                }

                request = self.requests.recv() => match request {
                    Some(request) => self.start_command(request),
                    None => return ProtocolError::ConnectionClosed,
                },

                _ = next_tick(&mut self.keepalive) => {
                    if let Err(e) = self.send_keepalive() {
                        warn!(error = %e, "Keep-alive failed");
                        return e;
                    }
                    idle.as_mut().reset(Instant::now() + self.config.idle_timeout);
                }

                _ = &mut idle => {
                    let idle_ms = self.config.idle_timeout.as_millis() as u64;
                    warn!(idle_ms, "Connection idle, closing");
                    return ProtocolError::IdleTimeout;
                }
            }
        }
    }

    /// Slice every complete packet out of the receive buffer
    fn drain_packets(&mut self) -> Result<()> {
        loop {
            match self.codec.decode(&mut self.buffer) {
                Ok(Some(packet)) => self.dispatch(packet)?,
                Ok(None) => return Ok(()),
                Err(e) => {
                    global_metrics().protocol_error();
                    warn!(error = %e, "Malformed packet, closing");
                    return Err(e);
                }
            }
        }
    }

    fn dispatch(&mut self, packet: Packet) -> Result<()> {
        let request_id = packet.request_id();
        debug!(
            request_id,
            kind = packet.kind(),
            len = packet.payload().len(),
            "Received packet"
        );

        if let Some(outcome) = handshake::auth_outcome(&packet) {
            let request = match outcome {
                AuthOutcome::Rejected => self.pending.take_auth(),
                AuthOutcome::Accepted => self.pending.take_kind(request_id, RequestKind::Auth),
            };
            if let Some(request) = request {
                return self.finish_handshake(outcome, request);
            }
        } else if packet.response_type() == Some(PacketType::ResponseValue) {
            if let Some(request) = self.pending.take_kind(request_id, RequestKind::Command) {
                global_metrics().command_answered();
                debug!(
                    request_id,
                    elapsed_ms = request.created_at.elapsed().as_millis() as u64,
                    "Command answered"
                );
                request.succeed(packet.into_payload());
                return Ok(());
            }
        }

        global_metrics().unsolicited_packet();
        debug!(request_id, "Discarding unsolicited packet");
        Ok(())
    }

    fn finish_handshake(
        &mut self,
        outcome: AuthOutcome,
        request: PendingRequest,
    ) -> Result<()> {
        match outcome {
            AuthOutcome::Accepted => {
                self.flags.authenticated.store(true, Ordering::SeqCst);
                let period = self.config.keepalive_interval;
                let mut interval = time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.keepalive = Some(interval);
                global_metrics().handshake_success();
                info!(endpoint = %self.endpoint, "Authentication successful");
                request.succeed(String::new());
                Ok(())
            }
            AuthOutcome::Rejected => {
                global_metrics().handshake_failed();
                warn!(endpoint = %self.endpoint, "Authentication rejected");
                request.fail(ProtocolError::AuthRejected);
                Err(ProtocolError::AuthRejected)
            }
        }
    }

    fn start_command(&mut self, request: CommandRequest) {
        if !self.flags.authenticated.load(Ordering::SeqCst) {
            let _ = request.reply.send(Err(ProtocolError::NotAuthenticated));
            return;
        }

        let id = self.pending.next_request_id();
        debug!(request_id = id, command = %request.text, "Sending command");
        let packet = Packet::new(id, PacketType::ExecCommand, request.text);
        self.pending
            .register(id, Responder::Command(request.reply), self.config.command_timeout);

        if let Err(e) = self.queue(packet, WritePurpose::Command) {
            if let Some(pending) = self.pending.take(id) {
                pending.fail(e);
            }
        }
    }

    fn send_keepalive(&mut self) -> Result<()> {
        if !self.flags.authenticated.load(Ordering::SeqCst) {
            return Ok(());
        }
        let id = self.pending.next_request_id();
        debug!(request_id = id, "Sending keep-alive");
        let command = self.config.keepalive_command.clone();
        self.queue(Packet::new(id, PacketType::ExecCommand, command), WritePurpose::KeepAlive)
    }

    /// Hand a packet to the writer task without waiting on the socket
    fn queue(&self, packet: Packet, purpose: WritePurpose) -> Result<()> {
        self.outbound
            .send(Outbound { packet, purpose })
            .map_err(|_| ProtocolError::ConnectionClosed)
    }

    /// Returns the close reason when the failed write ends the session
    fn write_failed(&mut self, failure: WriteFailure) -> Option<ProtocolError> {
        let error = socket_error(failure.error);
        match failure.purpose {
            WritePurpose::Command => {
                // Only this request fails; a dead socket surfaces on the read side.
                warn!(request_id = failure.request_id, error = %error, "Command write failed");
                if let Some(pending) = self.pending.take(failure.request_id) {
                    pending.fail(error);
                }
                None
            }
            WritePurpose::Auth => {
                warn!(error = %error, "Authentication write failed");
                Some(error)
            }
            WritePurpose::KeepAlive => {
                warn!(error = %error, "Keep-alive failed");
                Some(error)
            }
        }
    }

    async fn teardown(mut self, reason: ProtocolError) {
        self.flags.authenticated.store(false, Ordering::SeqCst);
        self.flags.connected.store(false, Ordering::SeqCst);
        self.keepalive = None;

        // A handshake still in flight reports the real cause; commands see a closed connection.
        let failed = self.pending.fail_all(|kind| match kind {
            RequestKind::Auth => reason.clone(),
            RequestKind::Command => ProtocolError::ConnectionClosed,
        });

        self.requests.close();
        while let Ok(request) = self.requests.try_recv() {
            let _ = request.reply.send(Err(ProtocolError::ConnectionClosed));
        }

        // Stopping abandons a write stuck on a peer that no longer reads.
        self.writer_stop.cancel();
        if let Err(e) = self.writer.await {
            debug!(error = %e, "Writer task ended abnormally");
        }

        global_metrics().connection_closed();
        info!(
            endpoint = %self.endpoint,
            reason = %reason,
            failed_requests = failed,
            "Connection closed"
        );
        self.closed.cancel();
    }
}

/// Owns the write half so a peer that stops reading never blocks the event loop
async fn write_loop(
    mut sink: FramedWrite<OwnedWriteHalf, RconCodec>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    failures: mpsc::UnboundedSender<WriteFailure>,
    stop: CancellationToken,
) {
    loop {
        let Outbound { packet, purpose } = tokio::select! {
            _ = stop.cancelled() => return,
            next = outbound.recv() => match next {
                Some(next) => next,
                None => return,
            },
        };

        let request_id = packet.request_id();
        let bytes = (SIZE_FIELD_LEN + packet.wire_size()) as u64;
        let written = tokio::select! {
            _ = stop.cancelled() => return,
            written = sink.send(packet) => written,
        };

        match (written, purpose) {
            (Ok(()), WritePurpose::Command) => global_metrics().command_sent(bytes),
            (Ok(()), WritePurpose::KeepAlive) => global_metrics().keepalive_sent(bytes),
            (Ok(()), WritePurpose::Auth) => {}
            (Err(error), purpose) => {
                let _ = failures.send(WriteFailure {
                    request_id,
                    purpose,
                    error,
                });
            }
        }
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
