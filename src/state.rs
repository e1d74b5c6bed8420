use crate::auth::password::PasswordHasherConfig;
use crate::auth::repo::UserStore;
use crate::config::{AppConfig, StorageBackend};
use crate::kv::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<UserStore>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let kv: Arc<dyn KeyValueStore> = match config.storage.backend {
            StorageBackend::File => Arc::new(FileKeyValueStore::new(&config.storage.data_dir)),
            StorageBackend::Memory => Arc::new(MemoryKeyValueStore::new()),
        };
        let hasher = PasswordHasherConfig::from_config(&config.hash)?;
        let users = Arc::new(UserStore::new(kv, config.storage.users_key.clone(), hasher));
        users.init().await?;

        Ok(Self::from_parts(config, users))
    }

    pub fn from_parts(config: Arc<AppConfig>, users: Arc<UserStore>) -> Self {
        Self { config, users }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        Self::fake_with_kv().0
    }

    /// Test state plus a handle on its backing store, for seeding raw blobs.
    #[cfg(test)]
    pub fn fake_with_kv() -> (Self, Arc<MemoryKeyValueStore>) {
        use crate::config::{HashConfig, JwtConfig, ServerConfig, StorageConfig};

        let config = Arc::new(AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 0,
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                data_dir: "unused".into(),
                users_key: "@tap2go/users".into(),
            },
            hash: HashConfig::default(),
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test".into(),
                audience: "test".into(),
                ttl_minutes: 5,
            },
        });

        let kv = Arc::new(MemoryKeyValueStore::new());
        let users = Arc::new(UserStore::new(
            kv.clone(),
            config.storage.users_key.clone(),
            crate::auth::password::fast_hasher(),
        ));
        (Self::from_parts(config, users), kv)
    }
}
