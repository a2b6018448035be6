use crate::constants::USERNAME_REGEX;
use crate::core_auth::core_auth::{User, UserUpdate};
use crate::core_auth::error::UserError;
use crate::core_auth::helper::{hash_password, verify_password};
use crate::core_fs::Jail;
use log::{debug, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Default, Serialize, Deserialize)]
struct UsersFile {
    #[serde(default)]
    users: Vec<User>,
}

/// Account store backed by a TOML file.
///
/// Every mutation is applied to a copy, written to disk, and only then made
/// visible, so a failed write leaves both the file and memory unchanged.
pub struct UserStore {
    users: RwLock<BTreeMap<String, User>>,
    storage_file: Option<PathBuf>,
    cost: u32,
    // Verified against when the username is unknown, so that unknown users
    // and wrong passwords take the same time.
    dummy_hash: String,
    username_re: Regex,
}

impl UserStore {
    /// Loads the store from `storage_file`. A missing file yields an empty store.
    pub fn load(storage_file: impl Into<PathBuf>, cost: u32) -> Result<Self, UserError> {
        let storage_file = storage_file.into();
        let users = if storage_file.exists() {
            let content = std::fs::read_to_string(&storage_file).map_err(|e| {
                UserError::Storage(format!(
                    "Failed to read {}: {}",
                    storage_file.display(),
                    e
                ))
            })?;
            let parsed: UsersFile = toml::from_str(&content).map_err(|e| {
                UserError::Storage(format!(
                    "Failed to parse {}: {}",
                    storage_file.display(),
                    e
                ))
            })?;
            parsed
                .users
                .into_iter()
                .map(|u| (u.username.clone(), u))
                .collect()
        } else {
            info!(
                "Users file {} not found, starting with no accounts",
                storage_file.display()
            );
            BTreeMap::new()
        };

        info!("Loaded {} user(s) from {}", users.len(), storage_file.display());
        Self::build(users, Some(storage_file), cost)
    }

    /// A store that is never written to disk.
    pub fn in_memory(cost: u32) -> Result<Self, UserError> {
        Self::build(BTreeMap::new(), None, cost)
    }

    fn build(
        users: BTreeMap<String, User>,
        storage_file: Option<PathBuf>,
        cost: u32,
    ) -> Result<Self, UserError> {
        let username_re = Regex::new(USERNAME_REGEX)
            .map_err(|e| UserError::Storage(format!("Invalid username pattern: {}", e)))?;
        Ok(Self {
            users: RwLock::new(users),
            storage_file,
            cost,
            dummy_hash: hash_password("gestorftpd-no-such-user", cost)?,
            username_re,
        })
    }

    pub fn storage_file(&self) -> Option<&Path> {
        self.storage_file.as_deref()
    }

    /// Checks a credential. Every failure is the same `AuthFailure`.
    pub fn authenticate(&self, username: &str, credential: &str) -> Result<User, UserError> {
        let user = self
            .users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(username)
            .cloned();

        match user {
            Some(user) => {
                let valid = verify_password(credential, &user.credential_hash);
                if valid && user.enabled {
                    debug!("User {} authenticated", username);
                    Ok(user)
                } else {
                    Err(UserError::AuthFailure)
                }
            }
            None => {
                let _ = verify_password(credential, &self.dummy_hash);
                Err(UserError::AuthFailure)
            }
        }
    }

    pub fn add(&self, username: &str, credential: &str, home: &str) -> Result<User, UserError> {
        self.validate_username(username)?;
        let home_path = normalize_home(home)?;
        let credential_hash = hash_password(credential, self.cost)?;

        let user = User {
            username: username.to_string(),
            credential_hash,
            home_path,
            enabled: true,
        };

        self.mutate(|users| {
            if users.contains_key(username) {
                return Err(UserError::DuplicateUser(username.to_string()));
            }
            users.insert(username.to_string(), user.clone());
            Ok(())
        })?;

        info!("User {} added with home {}", username, user.home_path);
        Ok(user)
    }

    pub fn modify(&self, username: &str, update: UserUpdate) -> Result<User, UserError> {
        let credential_hash = match &update.credential {
            Some(credential) => Some(hash_password(credential, self.cost)?),
            None => None,
        };
        let home_path = match &update.home_path {
            Some(home) => Some(normalize_home(home)?),
            None => None,
        };

        let user = self.mutate(|users| {
            let user = users
                .get_mut(username)
                .ok_or_else(|| UserError::NotFound(username.to_string()))?;
            if let Some(hash) = credential_hash {
                user.credential_hash = hash;
            }
            if let Some(home) = home_path {
                user.home_path = home;
            }
            if let Some(enabled) = update.enabled {
                user.enabled = enabled;
            }
            Ok(user.clone())
        })?;

        info!("User {} modified", username);
        Ok(user)
    }

    /// All users ordered by username.
    pub fn list(&self) -> Vec<User> {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn delete(&self, username: &str) -> Result<(), UserError> {
        self.mutate(|users| {
            users
                .remove(username)
                .map(|_| ())
                .ok_or_else(|| UserError::NotFound(username.to_string()))
        })?;
        info!("User {} deleted", username);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.users.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn validate_username(&self, username: &str) -> Result<(), UserError> {
        if !self.username_re.is_match(username) {
            warn!("Rejected invalid username: {:?}", username);
            return Err(UserError::InvalidUsername(username.to_string()));
        }
        Ok(())
    }

    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut BTreeMap<String, User>) -> Result<T, UserError>,
    ) -> Result<T, UserError> {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = users.clone();
        let result = change(&mut next)?;
        if let Some(path) = &self.storage_file {
            persist(path, &next)?;
        }
        *users = next;
        Ok(result)
    }
}

fn normalize_home(home: &str) -> Result<String, UserError> {
    Jail::normalize("/", home).map_err(|_| UserError::InvalidHome(home.to_string()))
}

fn persist(path: &Path, users: &BTreeMap<String, User>) -> Result<(), UserError> {
    let file = UsersFile {
        users: users.values().cloned().collect(),
    };
    let content = toml::to_string(&file)
        .map_err(|e| UserError::Storage(format!("Failed to serialize users: {}", e)))?;

    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, content)
        .and_then(|_| std::fs::rename(&tmp, path))
        .map_err(|e| UserError::Storage(format!("Failed to write {}: {}", path.display(), e)))?;

    debug!("Persisted {} user(s) to {}", users.len(), path.display());
    Ok(())
}
