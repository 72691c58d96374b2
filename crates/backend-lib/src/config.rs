// ============================
// crates/backend-lib/src/config.rs
// ============================
//! Configuration management.
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Postgres connection string
    pub database_url: String,
    /// Allowed CORS origin for the browser client
    pub client_url: String,
    /// Log level
    pub log_level: String,
    /// Outbound event buffer per live connection
    pub ws_channel_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".parse().unwrap(),
            database_url: "postgres://localhost/livepoll".to_string(),
            client_url: "http://localhost:3000".to_string(),
            log_level: "info".to_string(),
            ws_channel_capacity: 32,
        }
    }
}

impl Settings {
    /// Load settings from `config/default.toml` merged with
    /// `LIVEPOLL_`-prefixed environment variables.
    pub fn load() -> Result<Self> {
        Self::load_from("config/default.toml")
    }

    /// Load settings from an explicit TOML path plus the environment.
    /// Missing keys fall back to the defaults.
    pub fn load_from(path: &str) -> Result<Self> {
        let settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("LIVEPOLL_"))
            .extract()?;
        Ok(settings)
    }
}
