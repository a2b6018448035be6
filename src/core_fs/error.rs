// Errors raised while confining client paths to the served root
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FsError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Path is outside of the allowed area: {0}")]
    OutOfBounds(String),

    #[error("No such file or directory: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FsError {
    pub fn to_ftp_response(&self) -> String {
        match self {
            FsError::InvalidPath(_) => "553 Requested action not taken. File name not allowed.".to_string(),
            FsError::OutOfBounds(_) => "550 Path is outside of the allowed area.".to_string(),
            FsError::NotFound(_) => "550 No such file or directory.".to_string(),
            FsError::PermissionDenied(_) => "550 Permission denied.".to_string(),
            FsError::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => "550 No such file or directory.".to_string(),
                std::io::ErrorKind::PermissionDenied => "550 Permission denied.".to_string(),
                _ => "451 Requested action aborted. Local error in processing.".to_string(),
            },
        }
    }
}
