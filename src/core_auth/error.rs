// User store errors
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UserError {
    /// Unknown user, wrong credential and disabled account all map here.
    #[error("Authentication failed")]
    AuthFailure,

    #[error("User already exists: {0}")]
    DuplicateUser(String),

    #[error("User not found: {0}")]
    NotFound(String),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Invalid home path: {0}")]
    InvalidHome(String),

    #[error("User storage error: {0}")]
    Storage(String),
}

impl UserError {
    pub fn to_ftp_response(&self) -> String {
        match self {
            UserError::AuthFailure => "530 Login incorrect.".to_string(),
            _ => "451 Requested action aborted. Local error in processing.".to_string(),
        }
    }
}
