//! Daemon configuration (`STOCKHOLD_*` environment variables).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    /// Directory holding one JSON file per collection.
    pub data_dir: PathBuf,
    pub upstream_base_url: String,
    pub request_timeout: Duration,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = get("STOCKHOLD_BIND")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse()
            .context("STOCKHOLD_BIND must be a socket address such as 0.0.0.0:8080")?;
        let data_dir = get("STOCKHOLD_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data"));
        let upstream_base_url = get("STOCKHOLD_UPSTREAM_URL")
            .context("STOCKHOLD_UPSTREAM_URL is required")?;
        let request_timeout = match get("STOCKHOLD_REQUEST_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.parse()
                    .with_context(|| format!("STOCKHOLD_REQUEST_TIMEOUT_SECS: invalid value '{v}'"))?,
            ),
            None => Duration::from_secs(15),
        };

        Ok(Self {
            bind_addr,
            data_dir,
            upstream_base_url,
            request_timeout,
        })
    }
}
