// Errors a command handler can end with. They become replies at the dispatcher.
use crate::core_fs::FsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FtpError {
    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Login incorrect")]
    AuthFailure,

    #[error("Syntax error: {0}")]
    CommandError(String),

    #[error("Bad sequence of commands: {0}")]
    BadSequence(String),

    #[error(transparent)]
    Fs(#[from] FsError),

    #[error("No data connection")]
    NoDataConnection,

    #[error("Transfer aborted: {0}")]
    TransferAborted(String),

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FtpError {
    pub fn to_ftp_response(&self) -> String {
        match self {
            FtpError::NotAuthenticated => "530 Please login with USER and PASS.".to_string(),
            FtpError::AuthFailure => "530 Login incorrect.".to_string(),
            FtpError::CommandError(msg) => format!("501 {}", msg),
            FtpError::BadSequence(msg) => format!("503 {}", msg),
            FtpError::Fs(e) => e.to_ftp_response(),
            FtpError::NoDataConnection => "425 Can't open data connection.".to_string(),
            FtpError::TransferAborted(_) => "426 Connection closed; transfer aborted.".to_string(),
            FtpError::ProtocolViolation(_) => "500 Command line not understood.".to_string(),
            FtpError::Io(_) => "451 Requested action aborted. Local error in processing.".to_string(),
        }
    }

    /// Only a broken control stream ends the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FtpError::ProtocolViolation(_))
    }
}

/// Maps an I/O failure on a resolved path onto the confinement taxonomy.
pub fn fs_error(err: std::io::Error, virtual_path: &str) -> FtpError {
    match err.kind() {
        std::io::ErrorKind::NotFound => FsError::NotFound(virtual_path.to_string()).into(),
        std::io::ErrorKind::PermissionDenied => {
            FsError::PermissionDenied(virtual_path.to_string()).into()
        }
        _ => FsError::Io(err).into(),
    }
}
