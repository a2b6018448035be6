pub mod error;
pub mod jail;

pub use error::FsError;
pub use jail::{Existence, Jail, Resolved};
