//! Typed configuration structs, grouped by concern.
//!
//! Loaded from environment variables with unified fallback logic.

use super::env_keys::{gateway, limits, repo, store};
use super::loader::{env_optional, env_or, env_u64};
use std::path::PathBuf;

/// Tool catalog store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the SQLite catalog database.
    pub db_path: PathBuf,
}

impl StoreConfig {
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        let db_path = env_optional(store::TOOLCELL_CATALOG_DB, &[])
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".toolcell")
                    .join("catalog.db")
            });
        Self { db_path }
    }
}

/// Artifact repository access configuration.
#[derive(Debug, Clone)]
pub struct ArtifactRepoConfig {
    /// Base URL of the repository (the `Tools/` directory lives under it).
    pub base_url: String,
    /// Optional bearer token for authenticated access.
    pub token: Option<String>,
}

impl ArtifactRepoConfig {
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        Self {
            base_url: env_or(repo::TOOLCELL_REPO_URL, &[], String::new),
            token: env_optional(repo::TOOLCELL_REPO_TOKEN, repo::REPO_TOKEN_ALIASES),
        }
    }

    /// None when no repository URL is configured.
    pub fn try_from_env() -> Option<Self> {
        let cfg = Self::from_env();
        if cfg.base_url.trim().is_empty() {
            None
        } else {
            Some(cfg)
        }
    }
}

/// HTTP gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Listen address, `host:port`.
    pub listen: String,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        Self {
            listen: env_or(gateway::TOOLCELL_LISTEN, &[], || "0.0.0.0:8080".to_string()),
        }
    }
}

/// Pipeline timeouts, in seconds.
///
/// Defaults: sandbox create 120, runtime verification 30, per-package
/// install 300, launch wall clock 300.
#[derive(Debug, Clone, Copy)]
pub struct PipelineLimits {
    pub create_timeout_secs: u64,
    pub verify_timeout_secs: u64,
    pub install_timeout_secs: u64,
    pub launch_timeout_secs: u64,
}

impl Default for PipelineLimits {
    fn default() -> Self {
        Self {
            create_timeout_secs: 120,
            verify_timeout_secs: 30,
            install_timeout_secs: 300,
            launch_timeout_secs: 300,
        }
    }
}

impl PipelineLimits {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            create_timeout_secs: env_u64(limits::TOOLCELL_CREATE_TIMEOUT_SECS, d.create_timeout_secs),
            verify_timeout_secs: env_u64(limits::TOOLCELL_VERIFY_TIMEOUT_SECS, d.verify_timeout_secs),
            install_timeout_secs: env_u64(limits::TOOLCELL_INSTALL_TIMEOUT_SECS, d.install_timeout_secs),
            launch_timeout_secs: env_u64(limits::TOOLCELL_LAUNCH_TIMEOUT_SECS, d.launch_timeout_secs),
        }
    }
}
