// Here's the list of the FTP commands implemented
pub mod abor;
pub mod cdup;
pub mod cwd;
pub mod dele;
pub mod feat;
pub mod list;
pub mod mkd;
pub mod noop;
pub mod opts;
pub mod pass;
pub mod pwd;
pub mod quit;
pub mod rest;
pub mod retr;
pub mod rmd;
pub mod rnfr;
pub mod rnto;
pub mod size;
pub mod stor;
pub mod syst;
pub mod type_;
pub mod user;

// Parsing, dispatch and the common transfer helpers
pub mod error;
pub mod ftpcommand;
pub mod handlers;
pub mod reply;
pub mod utils;

#[cfg(test)]
mod test_dispatcher;

pub use error::FtpError;
pub use ftpcommand::FtpCommand;
pub use handlers::{dispatch, CommandContext};
pub use reply::Reply;
