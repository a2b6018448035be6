use crate::core_auth::AuthenticatedUser;
use crate::core_network::data_channel::DataChannel;
use chrono::{DateTime, Local};
use std::fmt;
use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    Ascii,
    Image,
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferType::Ascii => f.write_str("A"),
            TransferType::Image => f.write_str("I"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
    Terminated,
}

/// Server-side state of one control connection. Owned by its connection task.
#[derive(Debug)]
pub struct Session {
    pub connection_id: u64,
    pub peer_address: SocketAddr,
    pub state: SessionState,
    pub user: Option<AuthenticatedUser>,
    pub pending_username: Option<String>, // Set by USER, consumed by PASS
    pub current_dir: String,              // Virtual path, always normalized
    pub transfer_type: TransferType,
    pub rename_from: Option<String>, // Virtual path set by RNFR
    pub restart_offset: u64,         // Set by REST, consumed by the next transfer
    pub data_channel: Option<DataChannel>,
    pub created_at: DateTime<Local>,
    pub commands_processed: u64,
}

impl Session {
    pub fn new(connection_id: u64, peer_address: SocketAddr) -> Self {
        Self {
            connection_id,
            peer_address,
            state: SessionState::Unauthenticated,
            user: None,
            pending_username: None,
            current_dir: String::from("/"),
            transfer_type: TransferType::Ascii,
            rename_from: None,
            restart_offset: 0,
            data_channel: None,
            created_at: Local::now(),
            commands_processed: 0,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    pub fn is_terminated(&self) -> bool {
        self.state == SessionState::Terminated
    }

    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.username.as_str())
    }

    /// Home of the logged in user, "/" before login.
    pub fn home(&self) -> &str {
        self.user.as_ref().map(|u| u.home_path.as_str()).unwrap_or("/")
    }

    pub fn login(&mut self, user: AuthenticatedUser) {
        self.current_dir = user.home_path.clone();
        self.user = Some(user);
        self.pending_username = None;
        self.state = SessionState::Authenticated;
    }

    /// Drops the logged in user (a new USER command restarts authentication).
    pub fn logout(&mut self) {
        if self.state == SessionState::Authenticated {
            self.state = SessionState::Unauthenticated;
        }
        self.user = None;
        self.rename_from = None;
        self.data_channel = None;
        self.current_dir = String::from("/");
    }

    pub fn terminate(&mut self) {
        self.state = SessionState::Terminated;
        self.data_channel = None;
    }

    pub fn take_restart_offset(&mut self) -> u64 {
        std::mem::take(&mut self.restart_offset)
    }
}
