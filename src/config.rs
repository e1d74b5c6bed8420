use std::net::SocketAddr;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    File,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            other => anyhow::bail!("unknown STORAGE_BACKEND '{}'", other),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_dir: String,
    pub users_key: String,
}

/// Argon2 cost overrides; `None` keeps the library default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HashConfig {
    pub memory_kib: Option<u32>,
    pub iterations: Option<u32>,
    pub parallelism: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid APP_HOST/APP_PORT '{}:{}': {}", self.host, self.port, e))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub hash: HashConfig,
    pub jwt: JwtConfig,
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse::<T>().ok())
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let server = ServerConfig {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: match std::env::var("APP_PORT") {
                Ok(v) => v
                    .parse()
                    .map_err(|_| anyhow::anyhow!("invalid APP_PORT '{}'", v))?,
                Err(_) => 8080,
            },
        };
        let storage = StorageConfig {
            backend: std::env::var("STORAGE_BACKEND")
                .unwrap_or_else(|_| "file".into())
                .parse()?,
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".into()),
            users_key: std::env::var("USERS_KEY").unwrap_or_else(|_| "@tap2go/users".into()),
        };
        let hash = HashConfig {
            memory_kib: env_parse("HASH_MEMORY_KIB"),
            iterations: env_parse("HASH_ITERATIONS"),
            parallelism: env_parse("HASH_PARALLELISM"),
        };
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "tap2go".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "tap2go-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES").unwrap_or(60),
        };
        Ok(Self {
            server,
            storage,
            hash,
            jwt,
        })
    }
}
