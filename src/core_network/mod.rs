pub mod data_channel;
pub mod network;
pub mod pasv;
pub mod port;
pub mod registry;

#[cfg(test)]
mod test_listener;

pub use registry::{CapacityExceeded, ClientInfo, SessionGuard, SessionRegistry};
