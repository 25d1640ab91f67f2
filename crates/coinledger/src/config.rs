//! Configuration loading

use anyhow::{Context, Result};
use coinledger_auth::{AuthorityConfig, ProtectedRoute, RouteTable};
use coinledger_client::TransportConfig;
use coinledger_store::RequiredRole;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Protected dashboard views
    #[serde(default = "default_routes")]
    pub routes: Vec<RouteConfig>,
}

/// Ledger API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_logout_path")]
    pub logout_path: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub skip_tls_verify: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            login_path: default_login_path(),
            refresh_path: default_refresh_path(),
            logout_path: default_logout_path(),
            timeout_secs: default_timeout_secs(),
            skip_tls_verify: false,
        }
    }
}

impl ApiConfig {
    pub fn authority(&self) -> AuthorityConfig {
        AuthorityConfig {
            base_url: self.base_url.clone(),
            login_path: self.login_path.clone(),
            refresh_path: self.refresh_path.clone(),
            logout_path: self.logout_path.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            skip_tls_verify: self.skip_tls_verify,
        }
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            skip_tls_verify: self.skip_tls_verify,
        }
    }
}

/// Session storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_session_path")]
    pub session_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            session_path: default_session_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Protected route: one role means that role, several mean any of them,
/// none means any logged-in user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouteConfig {
    pub path: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl RouteConfig {
    fn new(path: &str, roles: &[&str]) -> Self {
        Self {
            path: path.to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }
}

// Default value functions
fn default_base_url() -> String {
    "https://api.blockchain.deliver.ar".to_string()
}

fn default_login_path() -> String {
    "/api/auth/login".to_string()
}

fn default_refresh_path() -> String {
    "/api/auth/refresh".to_string()
}

fn default_logout_path() -> String {
    "/api/auth/logout".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_session_path() -> String {
    "./data/session.json".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_routes() -> Vec<RouteConfig> {
    vec![
        RouteConfig::new("/admin", &["admin"]),
        RouteConfig::new("/admin/tokens", &["admin"]),
        RouteConfig::new("/admin/stats", &["admin", "auditor"]),
        RouteConfig::new("/dashboard", &["user", "core", "admin"]),
        RouteConfig::new("/transactions", &["user", "core", "admin"]),
        RouteConfig::new("/wallet/balance", &["user", "core", "admin"]),
        RouteConfig::new("/payments", &["user", "core", "admin"]),
    ]
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &str) -> Result<Self> {
        let config_path = Path::new(path);

        if !config_path.exists() {
            info!("Config file not found at {}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        info!("Loaded configuration from {}", path);
        Ok(config)
    }

    /// Route table for the guard
    pub fn route_table(&self) -> RouteTable {
        RouteTable::new(
            self.routes
                .iter()
                .map(|r| ProtectedRoute {
                    path: r.path.clone(),
                    required: RequiredRole::from_roles(r.roles.iter().map(String::as_str)),
                })
                .collect(),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
            routes: default_routes(),
        }
    }
}
