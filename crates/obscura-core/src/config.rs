//! Runtime configuration.
//!
//! Secrets and backend selection come from the environment; listener and
//! cache sizing come from command-line flags and are merged into the struct
//! by the binary after parsing.

use std::env;

pub const ENV_ACCESS_TOKEN: &str = "ACCESS_TOKEN";
pub const ENV_POSTGRES_URL: &str = "POSTGRES_URL";
pub const ENV_STORE_PATH: &str = "STORE_PATH";

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_LINK_CACHE_CAPACITY: usize = 1000;
pub const DEFAULT_META_CACHE_CAPACITY: usize = 250;
pub const DEFAULT_HASH_CACHE_CAPACITY: usize = 1000;
pub const DEFAULT_STORE_PATH: &str = "./store";

/// Load `.env` if present. Missing files are fine; callers should invoke this
/// before reading any configuration.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

#[derive(Clone, Debug)]
pub struct Config {
    /// Shared secret gating the admin endpoints.
    pub access_token: String,
    /// When unset, the metadata store degrades to the no-op backend.
    pub postgres_url: Option<String>,
    /// Root directory of the filesystem object store.
    pub store_path: String,
    pub port: u16,
    pub link_cache_capacity: usize,
    pub meta_cache_capacity: usize,
    pub hash_cache_capacity: usize,
}

impl Config {
    /// Build a configuration from the environment. Fails when the admin
    /// access token is missing, which is the one setting without a sane
    /// default.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let access_token = env::var(ENV_ACCESS_TOKEN).map_err(|_| {
            anyhow::anyhow!(
                "please set {} in the environment for securing endpoints",
                ENV_ACCESS_TOKEN
            )
        })?;

        let postgres_url = env::var(ENV_POSTGRES_URL).ok().filter(|url| !url.is_empty());

        let store_path = env::var(ENV_STORE_PATH)
            .ok()
            .filter(|path| !path.is_empty())
            .unwrap_or_else(|| DEFAULT_STORE_PATH.to_string());

        Ok(Config {
            access_token,
            postgres_url,
            store_path: store_path.trim_end_matches('/').to_string(),
            port: DEFAULT_PORT,
            link_cache_capacity: DEFAULT_LINK_CACHE_CAPACITY,
            meta_cache_capacity: DEFAULT_META_CACHE_CAPACITY,
            hash_cache_capacity: DEFAULT_HASH_CACHE_CAPACITY,
        })
    }
}
