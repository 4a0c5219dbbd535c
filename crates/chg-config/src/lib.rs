//! # chg-config
//!
//! Layered configuration loading for chg using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`CHG_*` prefix, `__` as separator)
//! 2. Project-level `.chg/config.toml`
//! 3. User-level `~/.config/chg/config.toml`
//! 4. Built-in defaults
//!
//! `CHG_STORE__CONNECTION_STRING` maps to `store.connection_string`,
//! `CHG_SINK__CONCURRENT_SAVES` to `sink.concurrent_saves`, and so on.
//!
//! # Usage
//!
//! ```no_run
//! use chg_config::ChgConfig;
//!
//! let config = ChgConfig::load_with_dotenv().expect("config");
//! if config.store.is_configured() {
//!     println!("changes go to {}", config.store.connection_string);
//! }
//! ```

mod error;
mod sink;
mod store;

pub use error::ConfigError;
pub use sink::{DEFAULT_CONCURRENT_SAVES, SinkConfig};
pub use store::{DEFAULT_COLLECTION, REMOTE_SCHEMES, StoreConfig, is_remote_url};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChgConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub sink: SinkConfig,
}

impl ChgConfig {
    /// Load configuration from TOML files and environment variables.
    ///
    /// Does NOT call `dotenvy`; use [`Self::load_with_dotenv`] for `.env`
    /// support.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a source fails to parse or the sink section
    /// holds unusable values.
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment().extract()?;
        config.sink.validate()?;
        Ok(config)
    }

    /// Load configuration after reading `.env` from the current directory.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`].
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::load()
    }

    /// Build the figment provider chain.
    ///
    /// Public so tests and hosts can layer extra providers on top.
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        let local_path = PathBuf::from(".chg/config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        figment.merge(Env::prefixed("CHG_").split("__"))
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("chg").join("config.toml"))
    }
}
