use crate::constants::LOG_BUFFER_LINES;
use chrono::Local;
use std::collections::VecDeque;
use std::fmt;
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Destination for engine event lines. Persistence and display are up to the
/// implementor.
pub trait LogSink: Send + Sync {
    fn append(&self, line: &str);
    fn clear(&self);
    fn snapshot(&self) -> Vec<String>;
}

/// Bounded in-memory sink. The oldest lines are dropped first.
pub struct MemorySink {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl MemorySink {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new(LOG_BUFFER_LINES)
    }
}

impl LogSink for MemorySink {
    fn append(&self, line: &str) {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line.to_string());
    }

    fn clear(&self) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn snapshot(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone)]
pub enum LogEvent<'a> {
    Start { address: SocketAddr },
    Stop,
    Connect { id: u64, peer: SocketAddr },
    Rejected { peer: SocketAddr },
    Disconnect { id: u64, peer: SocketAddr, reason: &'a str },
    Command { id: u64, user: Option<&'a str>, command: &'a str },
    Error { id: Option<u64>, message: &'a str },
    Admin { command: &'a str },
}

impl fmt::Display for LogEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogEvent::Start { address } => write!(f, "START listening on {}", address),
            LogEvent::Stop => write!(f, "STOP server stopped"),
            LogEvent::Connect { id, peer } => write!(f, "CONNECT #{} from {}", id, peer),
            LogEvent::Rejected { peer } => {
                write!(f, "REJECT {} (too many connections)", peer)
            }
            LogEvent::Disconnect { id, peer, reason } => {
                write!(f, "DISCONNECT #{} {} ({})", id, peer, reason)
            }
            LogEvent::Command { id, user, command } => {
                write!(f, "COMMAND #{} [{}] {}", id, user.unwrap_or("-"), command)
            }
            LogEvent::Error { id: Some(id), message } => write!(f, "ERROR #{} {}", id, message),
            LogEvent::Error { id: None, message } => write!(f, "ERROR {}", message),
            LogEvent::Admin { command } => write!(f, "ADMIN {}", command),
        }
    }
}

/// Formats engine events and appends them to a sink while logging is enabled.
///
/// Every event is also forwarded to the `log` facade, regardless of the flag.
pub struct EventLog {
    sink: Arc<dyn LogSink>,
    enabled: AtomicBool,
}

impl EventLog {
    pub fn new(sink: Arc<dyn LogSink>, enabled: bool) -> Self {
        Self {
            sink,
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn record(&self, event: LogEvent<'_>) {
        match &event {
            LogEvent::Error { .. } => log::warn!("{}", event),
            LogEvent::Command { .. } => log::debug!("{}", event),
            _ => log::info!("{}", event),
        }

        if self.enabled.load(Ordering::Relaxed) {
            let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
            self.sink.append(&format!("[{}] {}", timestamp, event));
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.sink.clear();
    }

    pub fn lines(&self) -> Vec<String> {
        self.sink.snapshot()
    }

    /// Writes the current lines to `destination` and returns how many were written.
    pub fn save(&self, destination: &Path) -> std::io::Result<usize> {
        let lines = self.sink.snapshot();
        let mut file = std::fs::File::create(destination)?;
        for line in &lines {
            writeln!(file, "{}", line)?;
        }
        file.flush()?;
        Ok(lines.len())
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(Arc::new(MemorySink::default()), true)
    }
}
