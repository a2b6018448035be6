// src/constants.rs

pub const USERNAME_REGEX: &str = r"^[A-Za-z0-9_.-]{1,32}$";
pub const ANONYMOUS_USERNAME: &str = "anonymous";

/// Longest control line accepted before the session is dropped.
pub const MAX_COMMAND_LINE: usize = 8 * 1024;

pub const DEFAULT_CONFIG_FILE: &str = "gestorftpd.toml";
pub const DEFAULT_LISTEN_PORT: u16 = 2121;
pub const DEFAULT_MAX_CONNECTIONS: usize = 10;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 5;
pub const DEFAULT_DATA_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TRANSFER_BUFFER_SIZE: usize = 64 * 1024;

/// Number of event lines kept by the in-memory log sink.
pub const LOG_BUFFER_LINES: usize = 10_000;

pub const BANNER: &str = "220 gestorftpd ready.\r\n";
pub const CAPACITY_EXCEEDED_REPLY: &str = "421 Too many connections, try again later.\r\n";
pub const SHUTDOWN_REPLY: &str = "421 Server shutting down.\r\n";
pub const KICKED_REPLY: &str = "421 Disconnected by administrator.\r\n";
pub const IDLE_TIMEOUT_REPLY: &str = "421 Idle timeout exceeded, closing control connection.\r\n";
