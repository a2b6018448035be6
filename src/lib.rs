pub mod config;
pub mod constants;
pub mod core_admin;
pub mod core_auth;
pub mod core_cli;
pub mod core_fs;
pub mod core_ftpcommand;
pub mod core_log;
pub mod core_network;
pub mod server;
pub mod session;
pub mod state;
