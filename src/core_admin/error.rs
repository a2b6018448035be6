use crate::server::ControlError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdminError {
    #[error("Unknown command: {0}. Type 'help' for the list of commands.")]
    UnknownCommand(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error(transparent)]
    Control(#[from] ControlError),
}
