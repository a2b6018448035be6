pub mod command;
pub mod console;
pub mod error;

#[cfg(test)]
mod test_console;

pub use command::AdminCommand;
pub use console::{AdminOutput, Console};
pub use error::AdminError;
