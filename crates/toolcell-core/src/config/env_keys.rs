//! Environment variable key constants.

/// Catalog store.
pub mod store {
    pub const TOOLCELL_CATALOG_DB: &str = "TOOLCELL_CATALOG_DB";
}

/// Artifact repository access.
pub mod repo {
    pub const TOOLCELL_REPO_URL: &str = "TOOLCELL_REPO_URL";
    pub const TOOLCELL_REPO_TOKEN: &str = "TOOLCELL_REPO_TOKEN";
    pub const REPO_TOKEN_ALIASES: &[&str] = &["GITHUB_TOKEN"];
}

/// HTTP gateway.
pub mod gateway {
    pub const TOOLCELL_LISTEN: &str = "TOOLCELL_LISTEN";
}

/// Pipeline timeouts (seconds).
pub mod limits {
    pub const TOOLCELL_CREATE_TIMEOUT_SECS: &str = "TOOLCELL_CREATE_TIMEOUT_SECS";
    pub const TOOLCELL_VERIFY_TIMEOUT_SECS: &str = "TOOLCELL_VERIFY_TIMEOUT_SECS";
    pub const TOOLCELL_INSTALL_TIMEOUT_SECS: &str = "TOOLCELL_INSTALL_TIMEOUT_SECS";
    pub const TOOLCELL_LAUNCH_TIMEOUT_SECS: &str = "TOOLCELL_LAUNCH_TIMEOUT_SECS";
}

/// Observability and logging.
pub mod observability {
    pub const TOOLCELL_QUIET: &str = "TOOLCELL_QUIET";
    pub const TOOLCELL_LOG_LEVEL: &str = "TOOLCELL_LOG_LEVEL";
    pub const TOOLCELL_LOG_JSON: &str = "TOOLCELL_LOG_JSON";
    pub const TOOLCELL_AUDIT_LOG: &str = "TOOLCELL_AUDIT_LOG";
}
