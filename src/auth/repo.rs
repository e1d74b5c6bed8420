use std::sync::Arc;

use anyhow::Context;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::auth::password::{verify_password, PasswordHasherConfig};
use crate::auth::repo_types::User;
use crate::kv::KeyValueStore;

#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error("Username already exists")]
    DuplicateUsername(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Credential store persisted as one JSON array under a single key.
pub struct UserStore {
    kv: Arc<dyn KeyValueStore>,
    key: String,
    hasher: PasswordHasherConfig,
    // serialises every load/modify/save of the collection
    lock: Mutex<()>,
}

impl UserStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, key: impl Into<String>, hasher: PasswordHasherConfig) -> Self {
        Self {
            kv,
            key: key.into(),
            hasher,
            lock: Mutex::new(()),
        }
    }

    pub async fn init(&self) -> Result<(), UserStoreError> {
        self.kv
            .get_item(&self.key)
            .await
            .context("check credential storage")?;
        info!(backend = self.backend_name(), key = %self.key, "credential store initialized");
        Ok(())
    }

    async fn load(&self) -> anyhow::Result<Vec<User>> {
        let raw = self
            .kv
            .get_item(&self.key)
            .await
            .context("read user collection")?;
        match raw {
            Some(json) => serde_json::from_str(&json).context("decode user collection"),
            None => Ok(Vec::new()),
        }
    }

    async fn save(&self, users: &[User]) -> anyhow::Result<()> {
        let json = serde_json::to_string(users).context("encode user collection")?;
        self.kv
            .set_item(&self.key, &json)
            .await
            .context("write user collection")
    }

    pub async fn create_user(&self, username: &str, plain: &str) -> Result<User, UserStoreError> {
        let hasher = self.hasher.clone();
        let plain = plain.to_owned();
        let hash = tokio::task::spawn_blocking(move || hasher.hash_password(&plain))
            .await
            .context("hash task panicked")??;

        let _guard = self.lock.lock().await;
        let mut users = self.load().await.map_err(|e| {
            error!(error = %e, "create_user: load failed");
            e
        })?;

        if users.iter().any(|u| u.username == username) {
            warn!(username, "username already exists");
            return Err(UserStoreError::DuplicateUsername(username.to_string()));
        }

        let id = users
            .iter()
            .filter_map(|u| u.id)
            .max()
            .unwrap_or(0)
            .checked_add(1)
            .ok_or_else(|| {
                error!("create_user: user id space exhausted");
                anyhow::anyhow!("user id space exhausted")
            })?;
        let user = User {
            id: Some(id),
            username: username.to_string(),
            password: hash,
        };
        users.push(user.clone());

        self.save(&users).await.map_err(|e| {
            error!(error = %e, "create_user: save failed");
            e
        })?;

        info!(user_id = id, username, "user created");
        Ok(user)
    }

    /// `Ok(None)` for both an unknown username and a wrong password.
    pub async fn verify_user(&self, username: &str, plain: &str) -> Result<Option<User>, UserStoreError> {
        let user = {
            let _guard = self.lock.lock().await;
            let users = self.load().await.map_err(|e| {
                error!(error = %e, "verify_user: load failed");
                e
            })?;
            users.into_iter().find(|u| u.username == username)
        };

        let Some(user) = user else {
            debug!(username, "verify_user: no such user");
            return Ok(None);
        };

        let hash = user.password.clone();
        let plain = plain.to_owned();
        let ok = tokio::task::spawn_blocking(move || verify_password(&plain, &hash))
            .await
            .context("verify task panicked")?
            .context("stored password hash is unreadable")?;

        if ok {
            debug!(user_id = ?user.id, username, "verify_user: match");
            Ok(Some(user))
        } else {
            debug!(user_id = ?user.id, username, "verify_user: wrong password");
            Ok(None)
        }
    }

    pub async fn list_users(&self) -> Result<Vec<User>, UserStoreError> {
        let _guard = self.lock.lock().await;
        let users = self.load().await.map_err(|e| {
            error!(error = %e, "list_users: load failed");
            e
        })?;
        Ok(users.iter().map(User::redacted).collect())
    }

    pub async fn find_by_id(&self, id: u64) -> Result<Option<User>, UserStoreError> {
        let _guard = self.lock.lock().await;
        let users = self.load().await?;
        Ok(users.into_iter().find(|u| u.id == Some(id)).map(|u| u.redacted()))
    }

    pub async fn clear_all(&self) -> Result<(), UserStoreError> {
        let _guard = self.lock.lock().await;
        self.kv
            .remove_item(&self.key)
            .await
            .context("remove user collection")
            .map_err(|e| {
                error!(error = %e, "clear_all failed");
                e
            })?;
        info!(key = %self.key, "all users cleared");
        Ok(())
    }

    pub fn is_available(&self) -> bool {
        true
    }

    pub fn backend_name(&self) -> &'static str {
        self.kv.name()
    }
}
