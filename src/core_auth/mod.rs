#[allow(clippy::module_inception)]
pub mod core_auth;
pub mod error;
pub mod helper;
pub mod store;

pub use core_auth::{AuthenticatedUser, User, UserUpdate};
pub use error::UserError;
pub use store::UserStore;
