//! Configuration loading and types for lfs-gateway.
//!
//! Configuration is read from a YAML file and deserialized into the
//! [`Config`] struct.  Each subsection governs a different part of the
//! system: networking and URL layout, authentication, the object storage
//! backend, and logging.

use serde::Deserialize;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Authentication settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Object storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind host address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Whether clients reach this server over TLS.  Only affects the
    /// scheme used when echoing canonical request URLs; TLS termination
    /// itself happens in front of the gateway.
    #[serde(default)]
    pub tls: bool,

    /// Path template under which the LFS endpoints are mounted.  Must
    /// contain the `{scope}` placeholder naming the project-scope path
    /// segment, e.g. `/api/projects/{scope}/lfs`.
    #[serde(default = "default_scope_path")]
    pub scope_path: String,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            tls: false,
            scope_path: default_scope_path(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// Authentication settings.
///
/// An empty `username`/`password` pair leaves the gateway in open-access
/// mode: every request passes the auth gate.  This is an explicit
/// deployment choice, mirrored by the example config file.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthConfig {
    /// Basic-auth username accepted by the built-in credential check.
    #[serde(default)]
    pub username: String,

    /// Basic-auth password accepted by the built-in credential check.
    #[serde(default)]
    pub password: String,

    /// Secret for minting `token` query parameters on presigned URLs.
    /// Empty disables token minting.
    #[serde(default)]
    pub url_token_secret: String,
}

impl AuthConfig {
    /// Whether the built-in credential pair is configured.
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

/// Object storage backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Backend type: `aws` or `memory`.
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// Presigned URL validity window in seconds.  Fixed per deployment;
    /// never taken from per-request input.
    #[serde(default = "default_url_expiry")]
    pub url_expiry_seconds: u64,

    /// AWS S3 gateway configuration.
    #[serde(default)]
    pub aws: Option<AwsStorageConfig>,

    /// Memory backend configuration.
    #[serde(default)]
    pub memory: Option<MemoryStorageConfig>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            url_expiry_seconds: default_url_expiry(),
            aws: None,
            memory: None,
        }
    }
}

/// AWS S3 gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AwsStorageConfig {
    /// Backing S3 bucket name.
    pub bucket: String,
    /// AWS region.
    #[serde(default = "default_region")]
    pub region: String,
    /// Key prefix in the backing bucket.
    #[serde(default)]
    pub prefix: String,
    /// Custom S3-compatible endpoint (e.g. MinIO, LocalStack).
    #[serde(default)]
    pub endpoint_url: String,
    /// Force path-style URL addressing.
    #[serde(default)]
    pub use_path_style: bool,
    /// Explicit AWS access key (falls back to env/credential chain).
    #[serde(default)]
    pub access_key_id: String,
    /// Explicit AWS secret key (falls back to env/credential chain).
    #[serde(default)]
    pub secret_access_key: String,
}

/// Memory backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryStorageConfig {
    /// Base URL that minted signed URLs point at.
    #[serde(default = "default_memory_endpoint")]
    pub endpoint: String,
}

impl Default for MemoryStorageConfig {
    fn default() -> Self {
        Self {
            endpoint: default_memory_endpoint(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
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

// -- Defaults ----------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9414
}

fn default_scope_path() -> String {
    "/api/projects/{scope}/lfs".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_storage_backend() -> String {
    "aws".to_string()
}

fn default_url_expiry() -> u64 {
    900 // 15 minutes
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_memory_endpoint() -> String {
    "http://127.0.0.1:9414/_memory".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Loader ------------------------------------------------------------------

/// Load and parse configuration from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let config: Config = serde_yaml::from_str(&contents)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_from_empty_yaml() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.server.port, 9414);
        assert_eq!(config.server.scope_path, "/api/projects/{scope}/lfs");
        assert!(!config.server.tls);
        assert_eq!(config.storage.backend, "aws");
        assert_eq!(config.storage.url_expiry_seconds, 900);
        assert!(!config.auth.has_credentials());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "server:\n  port: 8080\n  tls: true\nauth:\n  username: lfs\n  password: hunter2\nstorage:\n  backend: memory\n  url_expiry_seconds: 60"
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert!(config.server.tls);
        assert!(config.auth.has_credentials());
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.storage.url_expiry_seconds, 60);
    }

    #[test]
    fn test_aws_section_parses() {
        let yaml = "storage:\n  backend: aws\n  aws:\n    bucket: lfs-objects\n    region: us-west-2\n    prefix: 'lfs/'";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let aws = config.storage.aws.unwrap();
        assert_eq!(aws.bucket, "lfs-objects");
        assert_eq!(aws.region, "us-west-2");
        assert_eq!(aws.prefix, "lfs/");
        assert!(!aws.use_path_style);
    }
}
