use serde::{Deserialize, Serialize};

/// An account record as persisted in the users file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub credential_hash: String,
    /// Virtual path relative to the served root, e.g. "/" or "/alice".
    pub home_path: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

/// Fields that `modify` may change. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub credential: Option<String>,
    pub home_path: Option<String>,
    pub enabled: Option<bool>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.credential.is_none() && self.home_path.is_none() && self.enabled.is_none()
    }
}

/// What a session keeps after a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub username: String,
    pub home_path: String,
    pub read_only: bool,
}

impl From<&User> for AuthenticatedUser {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            home_path: user.home_path.clone(),
            read_only: false,
        }
    }
}
