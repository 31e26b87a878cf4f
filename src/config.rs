use std::env;

use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:4000";
pub const DEFAULT_DATABASE_NAME: &str = "collabhub";
pub const DEFAULT_ORIGINS: &str = "http://localhost:8080,http://localhost:5173,http://localhost:3000";
pub const DEFAULT_ASSET_FOLDER: &str = "collabhub/projects";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Mongo { uri: String, database: String },
    /// Process-local storage, lost on restart.
    Memory,
}

#[derive(Clone, Debug, Default)]
pub struct AssetConfig {
    pub upload_url: Option<String>,
    pub destroy_url: Option<String>,
    pub api_key: Option<String>,
    pub folder: String,
}

#[derive(Clone)]
pub struct Config {
    pub bind_addr: String,
    pub storage: StorageBackend,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub bcrypt_cost: u32,
    pub frontend_origins: Vec<String>,
    pub assets: AssetConfig,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key/value source; `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let storage = match get("STORAGE_BACKEND").as_deref().unwrap_or("mongo") {
            "mongo" => StorageBackend::Mongo {
                uri: get("MONGO_URI").ok_or(ConfigError::Missing("MONGO_URI"))?,
                database: get("DATABASE_NAME").unwrap_or_else(|| DEFAULT_DATABASE_NAME.to_string()),
            },
            "memory" => StorageBackend::Memory,
            other => {
                return Err(ConfigError::Invalid {
                    name: "STORAGE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let token_ttl_hours = parse_or(get("TOKEN_TTL_HOURS"), "TOKEN_TTL_HOURS", 24)?;
        let bcrypt_cost = parse_or(get("BCRYPT_COST"), "BCRYPT_COST", bcrypt::DEFAULT_COST)?;
        let max_upload_bytes =
            parse_or(get("MAX_UPLOAD_BYTES"), "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;

        let frontend_origins = get("FRONTEND_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ORIGINS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            storage,
            jwt_secret: get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?,
            token_ttl_hours,
            bcrypt_cost,
            frontend_origins,
            assets: AssetConfig {
                upload_url: get("ASSET_UPLOAD_URL"),
                destroy_url: get("ASSET_DESTROY_URL"),
                api_key: get("ASSET_API_KEY"),
                folder: get("ASSET_FOLDER").unwrap_or_else(|| DEFAULT_ASSET_FOLDER.to_string()),
            },
            max_upload_bytes,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    raw: Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
