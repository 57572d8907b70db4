use std::path::PathBuf;

use crate::error::AppError;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_SITE_DIR: &str = "site";
const SNAPSHOT_REL_PATH: &str = "data/stacks.json";

/// Server configuration loaded explicitly from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Directory holding the UI assets; nothing outside it is served.
    pub site_dir: PathBuf,
    /// Snapshot read by the guide API.
    pub snapshot_path: PathBuf,
}

impl Config {
    /// Optional:
    /// - `PORT` (default: 3000)
    /// - `RULEBOOK_SITE_DIR` (default: "site")
    /// - `RULEBOOK_SNAPSHOT` (default: "<site dir>/data/stacks.json")
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_values(
            std::env::var("PORT").ok(),
            std::env::var("RULEBOOK_SITE_DIR").ok(),
            std::env::var("RULEBOOK_SNAPSHOT").ok(),
        )
    }

    fn from_values(
        port: Option<String>,
        site_dir: Option<String>,
        snapshot: Option<String>,
    ) -> Result<Self, AppError> {
        let port = match port {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| AppError::Config(format!("PORT must be a port number, got {raw:?}: {e}")))?,
            None => DEFAULT_PORT,
        };

        let site_dir = PathBuf::from(site_dir.unwrap_or_else(|| DEFAULT_SITE_DIR.to_string()));
        if !site_dir.is_dir() {
            return Err(AppError::Config(format!(
                "site directory not found: {}",
                site_dir.display()
            )));
        }

        let snapshot_path = snapshot
            .map(PathBuf::from)
            .unwrap_or_else(|| site_dir.join(SNAPSHOT_REL_PATH));

        Ok(Self {
            port,
            site_dir,
            snapshot_path,
        })
    }
}
