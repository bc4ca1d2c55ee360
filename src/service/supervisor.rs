//! # Connection Supervisor
//!
//! Keeps at most one live [`RconClient`] per server id and tells subscribers
//! whenever connectivity changes.
//!
//! ## Liveness
//! [`ConnectionSupervisor::is_connected`] is the single source of truth: an
//! entry whose socket died is pruned on the first check. A background sweep
//! runs that check for every entry on a fixed interval and publishes one
//! consolidated status update per pass, so dead sockets disappear even when no
//! caller sends anything.
//!
//! ## Locking
//! The client map and the server catalog are only locked for bookkeeping.
//! Connects, disconnects and commands run without any supervisor lock held, so
//! a slow server never blocks the others.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::config::RconConfig;
use crate::error::{ProtocolError, Result};
use crate::service::client::RconClient;
use crate::service::outcome::{BroadcastReport, CommandOutcome, ServerCommandResult};
use crate::service::server::{Endpoint, ServerRecord, ServerStatus};
use crate::utils::metrics::{global_metrics, Timer};

struct ClientEntry {
    client: RconClient,
    generation: u64,
}

enum Liveness {
    Live,
    Absent,
    Pruned,
}

struct Shared {
    config: RconConfig,
    catalog: RwLock<IndexMap<String, ServerRecord>>,
    clients: Mutex<IndexMap<String, ClientEntry>>,
    status_tx: broadcast::Sender<Vec<ServerStatus>>,
    next_generation: AtomicU64,
}

/// Owner of every live RCON session in the process.
///
/// Construct it inside a tokio runtime; the liveness sweep starts immediately
/// and stops when the supervisor is shut down or dropped.
pub struct ConnectionSupervisor {
    shared: Arc<Shared>,
    sweeper: JoinHandle<()>,
}

impl ConnectionSupervisor {
    pub fn new(config: RconConfig) -> Self {
        let (status_tx, _) = broadcast::channel(config.supervisor.status_channel_capacity.max(1));
        let sweep_interval = config.supervisor.sweep_interval;
        let shared = Arc::new(Shared {
            config,
            catalog: RwLock::new(IndexMap::new()),
            clients: Mutex::new(IndexMap::new()),
            status_tx,
            next_generation: AtomicU64::new(1),
        });
        let sweeper = spawn_sweeper(Arc::downgrade(&shared), sweep_interval);
        Self { shared, sweeper }
    }

    /// Receive the full status list every time connectivity changes
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<ServerStatus>> {
        self.shared.status_tx.subscribe()
    }

    // ----- server catalog -----

    /// Add or replace a known server
    pub async fn register_server(&self, record: ServerRecord) {
        debug!(server_id = %record.id, name = %record.name, "Registering server");
        self.shared
            .catalog
            .write()
            .await
            .insert(record.id.clone(), record);
        self.shared.notify().await;
    }

    /// Replace the details of a known server; the live session, if any, is kept
    pub async fn update_server(&self, record: ServerRecord) -> Result<()> {
        {
            let mut catalog = self.shared.catalog.write().await;
            let slot = catalog
                .get_mut(&record.id)
                .ok_or_else(|| ProtocolError::UnknownServer(record.id.clone()))?;
            *slot = record;
        }
        self.shared.notify().await;
        Ok(())
    }

    /// Disconnect and forget a known server
    pub async fn remove_server(&self, server_id: &str) -> Result<ServerRecord> {
        self.disconnect(server_id).await;
        let removed = self.shared.catalog.write().await.shift_remove(server_id);
        let record = removed.ok_or_else(|| ProtocolError::UnknownServer(server_id.to_string()))?;
        self.shared.notify().await;
        Ok(record)
    }

    pub async fn server(&self, server_id: &str) -> Option<ServerRecord> {
        self.shared.catalog.read().await.get(server_id).cloned()
    }

    pub async fn servers(&self) -> Vec<ServerRecord> {
        self.shared.catalog.read().await.values().cloned().collect()
    }

    /// Current connectivity of every known server
    pub async fn statuses(&self) -> Vec<ServerStatus> {
        self.shared.statuses().await
    }

    // ----- connections -----

    /// Open a fresh session for `server_id`, replacing any existing one.
    ///
    /// A status update is published whether or not the connect succeeds.
    #[instrument(skip(self, credential), fields(endpoint = %endpoint))]
    pub async fn connect(
        &self,
        server_id: &str,
        endpoint: Endpoint,
        credential: &str,
    ) -> Result<()> {
        let previous = self.shared.clients.lock().await.shift_remove(server_id);
        if let Some(previous) = previous {
            info!("Server already connected, disconnecting first");
            previous.client.disconnect().await;
        }

        let result = RconClient::connect(&endpoint, credential, &self.shared.config.client).await;
        let result = match result {
            Ok(client) => {
                self.install(server_id, client).await;
                info!("Server connected");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to connect to server");
                Err(e)
            }
        };

        self.shared.notify().await;
        result
    }

    /// Connect a server from the catalog by id
    pub async fn connect_registered(&self, server_id: &str) -> Result<()> {
        let record = self
            .server(server_id)
            .await
            .ok_or_else(|| ProtocolError::UnknownServer(server_id.to_string()))?;
        self.connect(&record.id, record.endpoint(), &record.credential)
            .await
    }

    /// Close the session for `server_id`.
    ///
    /// Returns `false`, without publishing anything, when there was none.
    #[instrument(skip(self))]
    pub async fn disconnect(&self, server_id: &str) -> bool {
        let entry = self.shared.clients.lock().await.shift_remove(server_id);
        match entry {
            Some(entry) => {
                entry.client.disconnect().await;
                info!("Server disconnected");
                self.shared.notify().await;
                true
            }
            None => false,
        }
    }

    /// Run one command on one server.
    ///
    /// Failures that leave the socket unusable prune the entry and publish a
    /// status update before the error is returned; other failures keep it.
    #[instrument(skip(self))]
    pub async fn send_command(&self, server_id: &str, text: &str) -> Result<String> {
        let entry = {
            let clients = self.shared.clients.lock().await;
            clients
                .get(server_id)
                .map(|e| (e.client.clone(), e.generation))
        };
        let Some((client, generation)) = entry else {
            return Err(ProtocolError::NotConnected(server_id.to_string()));
        };

        if !client.is_ready() {
            warn!("Connection lost");
            if self.shared.prune(server_id, Some(generation)).await {
                self.shared.notify().await;
            }
            return Err(ProtocolError::ConnectionLost);
        }

        match client.send_command(text).await {
            Ok(response) => Ok(response),
            Err(e) if e.is_connection_fatal() => {
                warn!(error = %e, "Removing broken connection");
                let removed = self.shared.remove_generation(server_id, generation).await;
                if let Some(entry) = removed {
                    entry.client.disconnect().await;
                    self.shared.notify().await;
                }
                Err(e)
            }
            Err(e) => {
                warn!(error = %e, "Command failed");
                Err(e)
            }
        }
    }

    /// Send `text` to every known server, one after another.
    ///
    /// Each server's result is collected independently; a failure never stops
    /// the remaining sends.
    #[instrument(skip(self))]
    pub async fn send_to_all(&self, text: &str) -> BroadcastReport {
        let _timer = Timer::start("send_to_all");
        let (targets, connected) = self.shared.targets().await;
        if connected == 0 {
            info!(registered = targets.len(), "Broadcast skipped, no server connected");
            return BroadcastReport::nothing_connected();
        }

        let mut results = Vec::with_capacity(targets.len());
        for (server_id, server_name) in targets {
            let outcome = CommandOutcome::from(self.send_command(&server_id, text).await);
            results.push(ServerCommandResult {
                server_id,
                server_name,
                outcome,
            });
        }

        let report = BroadcastReport::from_results(results);
        info!(succeeded = report.succeeded, total = report.results.len(), "Broadcast finished");
        report
    }

    /// Whether `server_id` has a live, authenticated session.
    ///
    /// A dead entry is pruned (and a status update published) on the first call.
    pub async fn is_connected(&self, server_id: &str) -> bool {
        match self.shared.check(server_id, None).await {
            Liveness::Live => true,
            Liveness::Absent => false,
            Liveness::Pruned => {
                self.shared.notify().await;
                false
            }
        }
    }

    /// Run one liveness pass now; returns whether anything was pruned
    pub async fn refresh_status(&self) -> bool {
        self.shared.sweep().await
    }

    /// Ids with a registry entry, in connection order
    pub async fn connected_ids(&self) -> Vec<String> {
        self.shared.clients.lock().await.keys().cloned().collect()
    }

    /// Stop the sweep and disconnect every session
    pub async fn shutdown(&self) {
        self.sweeper.abort();
        let entries: Vec<ClientEntry> = {
            let mut clients = self.shared.clients.lock().await;
            clients.drain(..).map(|(_, entry)| entry).collect()
        };
        let count = entries.len();
        for entry in entries {
            entry.client.disconnect().await;
        }
        info!(disconnected = count, "Supervisor shut down");
        if count > 0 {
            self.shared.notify().await;
        }
    }

    async fn install(&self, server_id: &str, client: RconClient) {
        let generation = self.shared.next_generation.fetch_add(1, Ordering::Relaxed);
        let closed = client.closed_token();

        let replaced = self.shared.clients.lock().await.insert(
            server_id.to_string(),
            ClientEntry {
                client,
                generation,
            },
        );
        // A concurrent connect for the same id finished first.
        if let Some(replaced) = replaced {
            replaced.client.disconnect().await;
        }

        let shared = Arc::downgrade(&self.shared);
        let server_id = server_id.to_string();
        tokio::spawn(async move {
            closed.cancelled().await;
            if let Some(shared) = shared.upgrade() {
                if shared.prune(&server_id, Some(generation)).await {
                    shared.notify().await;
                }
            }
        });
    }
}

impl Drop for ConnectionSupervisor {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

impl Shared {
    /// Check one entry, pruning it if its session is no longer ready.
    ///
    /// With `generation` set, only that exact entry is considered.
    async fn check(&self, server_id: &str, generation: Option<u64>) -> Liveness {
        let removed = {
            let mut clients = self.clients.lock().await;
            let Some(entry) = clients.get(server_id) else {
                return Liveness::Absent;
            };
            if generation.is_some_and(|g| g != entry.generation) {
                return Liveness::Live;
            }
            if entry.client.is_ready() {
                return Liveness::Live;
            }
            clients.shift_remove(server_id)
        };

        match removed {
            Some(entry) => {
                global_metrics().entry_pruned();
                warn!(server_id, "Pruning dead connection");
                entry.client.disconnect().await;
                Liveness::Pruned
            }
            None => Liveness::Absent,
        }
    }

    async fn prune(&self, server_id: &str, generation: Option<u64>) -> bool {
        matches!(self.check(server_id, generation).await, Liveness::Pruned)
    }

    async fn remove_generation(&self, server_id: &str, generation: u64) -> Option<ClientEntry> {
        let mut clients = self.clients.lock().await;
        if clients.get(server_id).is_some_and(|e| e.generation == generation) {
            global_metrics().entry_pruned();
            clients.shift_remove(server_id)
        } else {
            None
        }
    }

    /// One liveness pass over every entry, publishing at most one update
    async fn sweep(&self) -> bool {
        let ids: Vec<String> = self.clients.lock().await.keys().cloned().collect();

        let mut changed = false;
        for server_id in &ids {
            if let Liveness::Pruned = self.check(server_id, None).await {
                changed = true;
            }
        }

        if changed {
            info!("Connection status changed during sweep");
            self.notify().await;
        }
        changed
    }

    /// Known servers in catalog order, then sessions not in the catalog
    /// Broadcast targets plus how many of them have a client entry right now
    async fn targets(&self) -> (Vec<(String, String)>, usize) {
        let mut targets: Vec<(String, String)> = self
            .catalog
            .read()
            .await
            .values()
            .map(|r| (r.id.clone(), r.name.clone()))
            .collect();

        let clients = self.clients.lock().await;
        for server_id in clients.keys() {
            if !targets.iter().any(|(id, _)| id == server_id) {
                targets.push((server_id.clone(), server_id.clone()));
            }
        }
        (targets, clients.len())
    }

    async fn statuses(&self) -> Vec<ServerStatus> {
        let catalog: Vec<ServerRecord> = self.catalog.read().await.values().cloned().collect();
        let clients = self.clients.lock().await;

        let mut statuses: Vec<ServerStatus> = catalog
            .into_iter()
            .map(|record| ServerStatus {
                connected: clients
                    .get(&record.id)
                    .is_some_and(|e| e.client.is_ready()),
                id: record.id,
                name: record.name,
                host: record.host,
                port: record.port,
            })
            .collect();

        for (server_id, entry) in clients.iter() {
            if !statuses.iter().any(|s| &s.id == server_id) {
                let endpoint = entry.client.endpoint();
                statuses.push(ServerStatus {
                    id: server_id.clone(),
                    name: server_id.clone(),
                    host: endpoint.host.clone(),
                    port: endpoint.port,
                    connected: entry.client.is_ready(),
                });
            }
        }
        statuses
    }

    async fn notify(&self) {
        let statuses = self.statuses().await;
        debug!(servers = statuses.len(), "Broadcasting server status");
        // No subscribers is not an error.
        let _ = self.status_tx.send(statuses);
    }
}

fn spawn_sweeper(shared: Weak<Shared>, period: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(shared) = shared.upgrade() else {
                break;
            };
            shared.sweep().await;
        }
    })
}
