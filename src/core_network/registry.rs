use chrono::{DateTime, Local};
use log::debug;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Snapshot of one connected client, as shown by `list-clients`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub connection_id: u64,
    pub peer_address: SocketAddr,
    pub username: Option<String>,
    pub connected_since: DateTime<Local>,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Too many connections ({active}/{max})")]
pub struct CapacityExceeded {
    pub active: usize,
    pub max: usize,
}

struct Entry {
    info: ClientInfo,
    cancel: CancellationToken,
}

struct Inner {
    entries: BTreeMap<u64, Entry>,
    next_id: u64,
}

/// Registry of active sessions.
///
/// All access goes through one mutex, so the capacity check and the insert
/// happen together and snapshots never see a half-applied change.
pub struct SessionRegistry {
    inner: Mutex<Inner>,
    emptied: Notify,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: BTreeMap::new(),
                next_id: 1,
            }),
            emptied: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new session unless `max` sessions are already active.
    ///
    /// The returned guard unregisters the session when dropped.
    pub fn try_register(
        self: &Arc<Self>,
        peer_address: SocketAddr,
        max: usize,
        cancel: CancellationToken,
    ) -> Result<SessionGuard, CapacityExceeded> {
        let mut inner = self.lock();
        let active = inner.entries.len();
        if active >= max {
            return Err(CapacityExceeded { active, max });
        }

        let connection_id = inner.next_id;
        inner.next_id += 1;
        inner.entries.insert(
            connection_id,
            Entry {
                info: ClientInfo {
                    connection_id,
                    peer_address,
                    username: None,
                    connected_since: Local::now(),
                },
                cancel: cancel.clone(),
            },
        );
        debug!("Registered session #{} for {}", connection_id, peer_address);

        Ok(SessionGuard {
            connection_id,
            cancel,
            registry: Arc::clone(self),
        })
    }

    /// Removes an entry. Returns false when it was already gone.
    pub fn unregister(&self, connection_id: u64) -> bool {
        let (removed, now_empty) = {
            let mut inner = self.lock();
            let removed = inner.entries.remove(&connection_id).is_some();
            (removed, inner.entries.is_empty())
        };
        if removed {
            debug!("Unregistered session #{}", connection_id);
        }
        if now_empty {
            self.emptied.notify_waiters();
        }
        removed
    }

    pub fn set_username(&self, connection_id: u64, username: Option<String>) {
        if let Some(entry) = self.lock().entries.get_mut(&connection_id) {
            entry.info.username = username;
        }
    }

    /// Removes the entry and cancels its session. Returns false for unknown ids.
    pub fn kick(&self, connection_id: u64) -> bool {
        let entry = {
            let mut inner = self.lock();
            inner.entries.remove(&connection_id)
        };
        match entry {
            Some(entry) => {
                entry.cancel.cancel();
                if self.is_empty() {
                    self.emptied.notify_waiters();
                }
                true
            }
            None => false,
        }
    }

    /// Removes and cancels every session. Returns how many were removed.
    pub fn kick_all(&self) -> usize {
        let entries = std::mem::take(&mut self.lock().entries);
        let count = entries.len();
        for entry in entries.into_values() {
            entry.cancel.cancel();
        }
        self.emptied.notify_waiters();
        count
    }

    /// Consistent copy of all entries, ordered by connection id.
    pub fn snapshot(&self) -> Vec<ClientInfo> {
        self.lock()
            .entries
            .values()
            .map(|entry| entry.info.clone())
            .collect()
    }

    pub fn contains(&self, connection_id: u64) -> bool {
        self.lock().entries.contains_key(&connection_id)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves once no session is registered.
    pub async fn wait_empty(&self) {
        loop {
            let notified = self.emptied.notified();
            if self.is_empty() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps a session registered for as long as it lives.
pub struct SessionGuard {
    connection_id: u64,
    cancel: CancellationToken,
    registry: Arc<SessionRegistry>,
}

impl SessionGuard {
    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.unregister(self.connection_id);
    }
}
