//! Configuration management for metabee
//!
//! This module handles loading, parsing, and validating application configuration
//! from YAML files and environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::auth::session::{SigningSecret, MAX_TOKEN_TTL};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Cross-origin configuration
    #[serde(default)]
    pub cors: CorsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // First, expand environment variables in the YAML string
        let expanded = expand_env_vars(yaml);
        serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))
    }

    /// Load configuration from environment variables with prefix METABEE_
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // Server config from env
        if let Ok(host) = std::env::var("METABEE_SERVER_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("METABEE_SERVER_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid port number".to_string()))?;
        }

        // Database config from env
        if let Ok(path) = std::env::var("METABEE_DATABASE_PATH") {
            config.database.path = path;
        }

        // Auth config from env
        if let Ok(secret) = std::env::var("METABEE_AUTH_JWT_SECRET") {
            config.auth.jwt_secret = SigningSecret::new(secret);
        }
        if let Ok(ttl) = std::env::var("METABEE_AUTH_TOKEN_TTL_SECS") {
            config.auth.token_ttl_secs = ttl
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid token TTL".to_string()))?;
        }

        // Logging config from env
        if let Ok(level) = std::env::var("METABEE_LOG_LEVEL") {
            config.logging.level = level;
        }

        Ok(config)
    }

    /// Check values that would make the service unusable
    ///
    /// Called once at startup; any error here is fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::MissingRequired("auth.jwt_secret".to_string()));
        }
        if self.auth.token_ttl_secs == 0 || self.auth.token_ttl() > MAX_TOKEN_TTL {
            return Err(ConfigError::InvalidValue(format!(
                "auth.token_ttl_secs must be between 1 and {}",
                MAX_TOKEN_TTL.as_secs()
            )));
        }
        if self.auth.lookup_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "auth.lookup_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.auth.password_hash.iterations == 0 || self.auth.password_hash.parallelism == 0 {
            return Err(ConfigError::InvalidValue(
                "auth.password_hash iterations and parallelism must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthConfig {
    /// HMAC secret used to sign session tokens
    #[serde(default)]
    pub jwt_secret: SigningSecret,

    /// Session token validity window in seconds
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,

    /// Upper bound on a single account lookup in milliseconds
    #[serde(default = "default_lookup_timeout")]
    pub lookup_timeout_ms: u64,

    /// Argon2id cost parameters for new password hashes
    #[serde(default)]
    pub password_hash: PasswordHashConfig,
}

impl AuthConfig {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: SigningSecret::default(),
            token_ttl_secs: default_token_ttl(),
            lookup_timeout_ms: default_lookup_timeout(),
            password_hash: PasswordHashConfig::default(),
        }
    }
}

fn default_token_ttl() -> u64 {
    24 * 60 * 60
}

fn default_lookup_timeout() -> u64 {
    5000
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PasswordHashConfig {
    /// Memory cost in KiB
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,

    /// Number of passes
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Degree of parallelism
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

impl Default for PasswordHashConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

fn default_memory_kib() -> u32 {
    19 * 1024
}

fn default_iterations() -> u32 {
    2
}

fn default_parallelism() -> u32 {
    1
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "/data/db/metabee.db".to_string()
}

/// Cross-origin configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorsConfig {
    /// Exact origins that may call the API
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Also allow any `http://localhost:<port>` / `http://127.0.0.1:<port>` origin
    #[serde(default = "default_true")]
    pub allow_localhost: bool,

    /// Also allow `file://` and `null` origins (desktop client)
    #[serde(default = "default_true")]
    pub allow_file_origin: bool,

    /// Preflight cache lifetime in seconds
    #[serde(default = "default_cors_max_age")]
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
            allow_localhost: true,
            allow_file_origin: true,
            max_age_secs: default_cors_max_age(),
        }
    }
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_cors_max_age() -> u64 {
    12 * 60 * 60
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format
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

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Configuration error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

/// Expand environment variables in a string
///
/// Supports `${VAR_NAME}` syntax; unknown variables are left as-is.
fn expand_env_vars(input: &str) -> String {
    let re = match regex_lite::Regex::new(r"\$\{([^}]+)\}") {
        Ok(re) => re,
        Err(_) => return input.to_string(),
    };

    re.replace_all(input, |caps: &regex_lite::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
