use crate::config::ServerConfig;
use crate::core_auth::{UserError, UserStore};
use crate::core_fs::Jail;
use crate::core_log::{EventLog, LogEvent, MemorySink};
use crate::core_network::network::{accept_loop, RunContext};
use crate::core_network::ClientInfo;
use crate::state::{ServerState, ServerStatus, StatusReport};
use log::{error, info, warn};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("Server is already running")]
    AlreadyRunning,

    #[error("Server is not running")]
    NotRunning,

    #[error("Failed to bind {address}: {source}")]
    BindError {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Operation not allowed while the server is running")]
    ServerRunning,

    #[error("No client with id {0}")]
    ClientNotFound(u64),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error(transparent)]
    User(#[from] UserError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

struct RunningServer {
    run: Arc<RunContext>,
    accept_task: JoinHandle<()>,
}

/// Owns the server lifecycle and every administrative operation on it.
///
/// Settings changed through the controller apply to the next start, except
/// `max_connections`, logging and the anonymous flag, which apply at once.
pub struct ServerController {
    config: RwLock<ServerConfig>,
    state: Arc<ServerState>,
    users: Arc<UserStore>,
    events: Arc<EventLog>,
    running: tokio::sync::Mutex<Option<RunningServer>>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl ServerController {
    pub fn new(config: ServerConfig, users: Arc<UserStore>, events: Arc<EventLog>) -> Self {
        let state = Arc::new(ServerState::new(config.max_connections));
        state.set_allow_anonymous(config.allow_anonymous);
        events.set_enabled(config.logging_enabled);
        Self {
            config: RwLock::new(config),
            state,
            users,
            events,
            running: tokio::sync::Mutex::new(None),
            local_addr: Mutex::new(None),
        }
    }

    /// Builds a controller with the user store named in the configuration
    /// and an in-memory event log.
    pub fn from_config(config: ServerConfig) -> Result<Self, ControlError> {
        let users = match &config.users_file {
            Some(path) => UserStore::load(path, config.bcrypt_cost)?,
            None => UserStore::in_memory(config.bcrypt_cost)?,
        };
        let events = EventLog::new(Arc::new(MemorySink::default()), config.logging_enabled);
        Ok(Self::new(config, Arc::new(users), Arc::new(events)))
    }

    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }

    pub fn users(&self) -> &Arc<UserStore> {
        &self.users
    }

    pub fn events(&self) -> &Arc<EventLog> {
        &self.events
    }

    /// Snapshot of the current settings.
    pub fn config(&self) -> ServerConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update_config(&self, change: impl FnOnce(&mut ServerConfig)) {
        change(&mut self.config.write().unwrap_or_else(PoisonError::into_inner));
    }

    /// Address the listener is actually bound to, while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Binds the listener and starts accepting connections.
    ///
    /// # Returns
    ///
    /// The bound address, or `AlreadyRunning`, `InvalidPath` when the root is
    /// not a directory, `BindError` when the port cannot be bound.
    pub async fn start(&self) -> Result<SocketAddr, ControlError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(ControlError::AlreadyRunning);
        }
        self.state
            .transition(ServerStatus::Stopped, ServerStatus::Starting)
            .map_err(|_| ControlError::AlreadyRunning)?;

        let config = self.config();
        let (listener, jail) = match bind(&config).await {
            Ok(bound) => bound,
            Err(e) => {
                error!("Failed to start server: {}", e);
                self.state.set_status(ServerStatus::Stopped);
                return Err(e);
            }
        };
        let local_addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                self.state.set_status(ServerStatus::Stopped);
                return Err(e.into());
            }
        };

        let run = Arc::new(RunContext {
            state: Arc::clone(&self.state),
            users: Arc::clone(&self.users),
            jail: Arc::new(jail),
            config: Arc::new(config),
            events: Arc::clone(&self.events),
            shutdown: CancellationToken::new(),
            drain: CancellationToken::new(),
            tracker: TaskTracker::new(),
        });
        let accept_task = tokio::spawn(accept_loop(listener, Arc::clone(&run)));

        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner) = Some(local_addr);
        self.state.mark_started();
        self.state.set_status(ServerStatus::Running);
        self.events.record(LogEvent::Start {
            address: local_addr,
        });
        *running = Some(RunningServer { run, accept_task });
        Ok(local_addr)
    }

    /// Stops the server gracefully.
    ///
    /// Accepting stops at once and idle sessions are told to leave. Sessions
    /// busy with a command get the grace period to finish it; whatever is
    /// left after that is cancelled. On return no session is registered.
    pub async fn stop(&self) -> Result<(), ControlError> {
        let mut running = self.running.lock().await;
        let server = running.take().ok_or(ControlError::NotRunning)?;
        self.state.set_status(ServerStatus::Stopping);
        let grace = self.config().grace_period();

        server.run.drain.cancel();
        if let Err(e) = server.accept_task.await {
            error!("Accept loop ended abnormally: {}", e);
        }
        server.run.tracker.close();

        if timeout(grace, server.run.tracker.wait()).await.is_err() {
            warn!(
                "Grace period elapsed with {} session(s) left, disconnecting them",
                self.state.sessions.len()
            );
            server.run.shutdown.cancel();
            let kicked = self.state.sessions.kick_all();
            info!("Forced {} session(s) to close", kicked);
            if timeout(grace, server.run.tracker.wait()).await.is_err() {
                warn!("Some session tasks are still finishing after shutdown");
            }
        }
        server.run.shutdown.cancel();

        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.state.mark_stopped();
        self.state.set_status(ServerStatus::Stopped);
        self.events.record(LogEvent::Stop);
        Ok(())
    }

    pub fn status(&self) -> StatusReport {
        self.state
            .report(self.local_addr(), self.config().root_path)
    }

    /// Changes the served root. Only allowed while stopped.
    pub fn set_root_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, ControlError> {
        self.ensure_stopped()?;
        let path = path.as_ref();
        let canonical = path
            .canonicalize()
            .map_err(|_| ControlError::InvalidPath(path.display().to_string()))?;
        if !canonical.is_dir() {
            return Err(ControlError::InvalidPath(path.display().to_string()));
        }
        self.update_config(|config| config.root_path = canonical.clone());
        info!("Root path set to {}", canonical.display());
        Ok(canonical)
    }

    /// Changes the listening port. Only allowed while stopped.
    pub fn set_port(&self, port: u16) -> Result<(), ControlError> {
        self.ensure_stopped()?;
        self.update_config(|config| config.listen_port = port);
        info!("Listen port set to {}", port);
        Ok(())
    }

    /// Changes the connection limit. Sessions above a lowered limit stay
    /// connected; only new connections are refused.
    pub fn set_max_connections(&self, max: usize) -> Result<(), ControlError> {
        if max == 0 {
            return Err(ControlError::InvalidValue(
                "max connections must be at least 1".into(),
            ));
        }
        self.update_config(|config| config.max_connections = max);
        self.state.set_max_connections(max);
        info!("Max connections set to {}", max);
        Ok(())
    }

    pub fn set_logging(&self, enabled: bool) {
        self.update_config(|config| config.logging_enabled = enabled);
        self.events.set_enabled(enabled);
    }

    pub fn set_anonymous(&self, allow: bool) {
        self.update_config(|config| config.allow_anonymous = allow);
        self.state.set_allow_anonymous(allow);
    }

    /// Connected clients, ordered by connection id.
    pub fn list_clients(&self) -> Vec<ClientInfo> {
        self.state.sessions.snapshot()
    }

    /// Disconnects one client. It is gone from `list_clients` on return.
    pub fn kick_client(&self, connection_id: u64) -> Result<(), ControlError> {
        if self.state.sessions.kick(connection_id) {
            info!("Kicked session #{}", connection_id);
            Ok(())
        } else {
            Err(ControlError::ClientNotFound(connection_id))
        }
    }

    fn ensure_stopped(&self) -> Result<(), ControlError> {
        match self.state.status() {
            ServerStatus::Stopped => Ok(()),
            _ => Err(ControlError::ServerRunning),
        }
    }
}

async fn bind(config: &ServerConfig) -> Result<(TcpListener, Jail), ControlError> {
    let jail = Jail::new(&config.root_path)
        .map_err(|_| ControlError::InvalidPath(config.root_path.display().to_string()))?;
    let address = format!("{}:{}", config.bind_address, config.listen_port);
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| ControlError::BindError { address, source })?;
    Ok((listener, jail))
}
