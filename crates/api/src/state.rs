//! Application state shared across handlers.

use lifecycle::{ClientSession, SessionLifecycleManager};
use parking_lot::{Mutex, RwLock};
use session_core::AuthToken;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use telemetry::health;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default time a client may go without an authenticated request before
/// it is treated as gone.
pub const DEFAULT_CLIENT_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

struct DirectoryEntry {
    client: Arc<ClientSession>,
    last_seen: Mutex<Instant>,
}

/// Result of one directory sweep.
#[derive(Debug, Default)]
pub struct Sweep {
    /// Entries dropped because the client was already signed out.
    pub signed_out: usize,
    /// Signed-in clients removed for inactivity. The caller ends them.
    pub idle: Vec<Arc<ClientSession>>,
}

/// Signed-in clients by bearer token.
///
/// The HTTP surface is the host for client handles: the heartbeat and
/// termination listener of a client live as long as its entry here.
pub struct ClientDirectory {
    clients: RwLock<HashMap<AuthToken, DirectoryEntry>>,
    idle_ttl: Duration,
}

impl Default for ClientDirectory {
    fn default() -> Self {
        Self::new(DEFAULT_CLIENT_IDLE_TTL)
    }
}

impl ClientDirectory {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            idle_ttl,
        }
    }

    pub fn insert(&self, client: Arc<ClientSession>) {
        let entry = DirectoryEntry {
            client: client.clone(),
            last_seen: Mutex::new(Instant::now()),
        };
        self.clients.write().insert(client.token().clone(), entry);
    }

    /// Returns the client only while it is still signed in, and marks it
    /// as seen.
    pub fn get(&self, token: &AuthToken) -> Option<Arc<ClientSession>> {
        let clients = self.clients.read();
        let entry = clients.get(token).filter(|entry| entry.client.is_signed_in())?;
        *entry.last_seen.lock() = Instant::now();
        Some(entry.client.clone())
    }

    pub fn remove(&self, token: &AuthToken) -> Option<Arc<ClientSession>> {
        self.clients.write().remove(token).map(|entry| entry.client)
    }

    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops clients that were signed out remotely and takes out clients
    /// idle for longer than the TTL.
    pub fn sweep(&self) -> Sweep {
        let now = Instant::now();
        let mut sweep = Sweep::default();

        self.clients.write().retain(|_, entry| {
            if !entry.client.is_signed_in() {
                sweep.signed_out += 1;
                return false;
            }
            if now.duration_since(*entry.last_seen.lock()) > self.idle_ttl {
                sweep.idle.push(entry.client.clone());
                return false;
            }
            true
        });
        sweep
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SessionLifecycleManager>,
    pub clients: Arc<ClientDirectory>,
}

impl AppState {
    pub fn new(manager: Arc<SessionLifecycleManager>) -> Self {
        Self::with_client_idle_ttl(manager, DEFAULT_CLIENT_IDLE_TTL)
    }

    pub fn with_client_idle_ttl(manager: Arc<SessionLifecycleManager>, idle_ttl: Duration) -> Self {
        Self {
            manager,
            clients: Arc::new(ClientDirectory::new(idle_ttl)),
        }
    }

    /// Start the periodic maintenance task: evict signed-out clients, end
    /// idle ones, forget exited account actors, and refresh registry health.
    pub fn start_maintenance(&self, period: Duration) -> tokio::task::JoinHandle<()> {
        let state = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                state.maintain();
            }
        })
    }

    /// One maintenance pass. Idle clients are logged out in the background.
    pub fn maintain(&self) {
        let sweep = self.clients.sweep();
        let idle = sweep.idle.len();
        for client in sweep.idle {
            let manager = self.manager.clone();
            tokio::spawn(async move {
                info!(
                    account_id = %client.account_id(),
                    record_id = %client.record_id(),
                    "Ending idle client"
                );
                if let Err(e) = manager.logout(&client).await {
                    warn!(record_id = %client.record_id(), error = %e, "Idle client logout failed");
                }
            });
        }

        let actors = self.manager.prune_idle_actors();
        if sweep.signed_out > 0 || idle > 0 || actors > 0 {
            debug!(evicted = sweep.signed_out, idle, actors, "Maintenance pass");
        }

        if self.manager.registry().is_healthy() {
            health().registry.set_healthy();
        } else {
            health().registry.set_unhealthy("Registry unreachable");
        }
    }
}
