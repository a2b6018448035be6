use crate::core_network::registry::SessionRegistry;
use chrono::{DateTime, Local};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ServerStatus::Stopped => "stopped",
            ServerStatus::Starting => "starting",
            ServerStatus::Running => "running",
            ServerStatus::Stopping => "stopping",
        };
        f.write_str(label)
    }
}

/// Process-wide server state, shared by handle between the controller, the
/// accept loop and every session.
pub struct ServerState {
    status: Mutex<ServerStatus>,
    pub sessions: Arc<SessionRegistry>,
    bytes_transferred_total: AtomicU64,
    uploads: AtomicU64,
    downloads: AtomicU64,
    max_connections: AtomicUsize,
    allow_anonymous: AtomicBool,
    started_at: Mutex<Option<(Instant, DateTime<Local>)>>,
    last_accept_error: Mutex<Option<String>>,
}

impl ServerState {
    pub fn new(max_connections: usize) -> Self {
        Self {
            status: Mutex::new(ServerStatus::Stopped),
            sessions: Arc::new(SessionRegistry::new()),
            bytes_transferred_total: AtomicU64::new(0),
            uploads: AtomicU64::new(0),
            downloads: AtomicU64::new(0),
            max_connections: AtomicUsize::new(max_connections),
            allow_anonymous: AtomicBool::new(false),
            started_at: Mutex::new(None),
            last_accept_error: Mutex::new(None),
        }
    }

    pub fn status(&self) -> ServerStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves from `from` to `to`. Returns the actual status when it was not `from`.
    pub fn transition(&self, from: ServerStatus, to: ServerStatus) -> Result<(), ServerStatus> {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        if *status != from {
            return Err(*status);
        }
        *status = to;
        Ok(())
    }

    pub fn set_status(&self, to: ServerStatus) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }

    pub fn is_running(&self) -> bool {
        self.status() == ServerStatus::Running
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections.load(Ordering::SeqCst)
    }

    /// Only gates new connections; sessions already past accept are kept.
    pub fn set_max_connections(&self, max: usize) {
        self.max_connections.store(max, Ordering::SeqCst);
    }

    pub fn allow_anonymous(&self) -> bool {
        self.allow_anonymous.load(Ordering::SeqCst)
    }

    /// Takes effect for the next USER command of every session.
    pub fn set_allow_anonymous(&self, allow: bool) {
        self.allow_anonymous.store(allow, Ordering::SeqCst);
    }

    pub fn record_upload(&self, bytes: u64) {
        self.bytes_transferred_total.fetch_add(bytes, Ordering::SeqCst);
        self.uploads.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_download(&self, bytes: u64) {
        self.bytes_transferred_total.fetch_add(bytes, Ordering::SeqCst);
        self.downloads.fetch_add(1, Ordering::SeqCst);
    }

    pub fn bytes_transferred_total(&self) -> u64 {
        self.bytes_transferred_total.load(Ordering::SeqCst)
    }

    pub fn mark_started(&self) {
        *self.started_at.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((Instant::now(), Local::now()));
        self.clear_accept_error();
    }

    pub fn mark_stopped(&self) {
        *self.started_at.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn started_at(&self) -> Option<DateTime<Local>> {
        self.started_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map(|(_, wall)| wall)
    }

    pub fn uptime(&self) -> Option<Duration> {
        self.started_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map(|(started, _)| started.elapsed())
    }

    pub fn set_accept_error(&self, message: String) {
        *self
            .last_accept_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(message);
    }

    pub fn clear_accept_error(&self) {
        *self
            .last_accept_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn accept_error(&self) -> Option<String> {
        self.last_accept_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn report(&self, local_addr: Option<SocketAddr>, root_path: PathBuf) -> StatusReport {
        StatusReport {
            status: self.status(),
            active_connection_count: self.sessions.len(),
            max_connections: self.max_connections(),
            uptime: self.uptime(),
            bytes_transferred_total: self.bytes_transferred_total(),
            uploads: self.uploads.load(Ordering::SeqCst),
            downloads: self.downloads.load(Ordering::SeqCst),
            local_addr,
            root_path,
            last_accept_error: self.accept_error(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatusReport {
    pub status: ServerStatus,
    pub active_connection_count: usize,
    pub max_connections: usize,
    pub uptime: Option<Duration>,
    pub bytes_transferred_total: u64,
    pub uploads: u64,
    pub downloads: u64,
    pub local_addr: Option<SocketAddr>,
    pub root_path: PathBuf,
    pub last_accept_error: Option<String>,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Server status:")?;
        writeln!(f, "  Status: {}", self.status)?;
        match self.local_addr {
            Some(addr) => writeln!(f, "  Address: {}", addr)?,
            None => writeln!(f, "  Address: -")?,
        }
        writeln!(
            f,
            "  Active connections: {}/{}",
            self.active_connection_count, self.max_connections
        )?;
        writeln!(f, "  Uptime: {}", format_uptime(self.uptime))?;
        writeln!(
            f,
            "  Bytes transferred: {} ({} uploads, {} downloads)",
            self.bytes_transferred_total, self.uploads, self.downloads
        )?;
        write!(f, "  Root path: {}", self.root_path.display())?;
        if let Some(error) = &self.last_accept_error {
            write!(f, "\n  Last accept error: {}", error)?;
        }
        Ok(())
    }
}

fn format_uptime(uptime: Option<Duration>) -> String {
    match uptime {
        Some(uptime) => {
            let secs = uptime.as_secs();
            format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
        None => "-".to_string(),
    }
}
