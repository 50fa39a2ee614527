//! Server configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via ENDPOINTD_CONFIG)
//! 3. Environment variables

use endpointd_protocol::{DEFAULT_PORT, MAX_FRAME_SIZE};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::{Path, PathBuf};

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network configuration.
    pub network: NetworkConfig,
    /// TLS configuration.
    pub tls: TlsConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("ENDPOINTD_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.network.apply_overrides(&lookup);
        self.tls.apply_overrides(&lookup);
        self.storage.apply_overrides(&lookup);
    }

    /// Checks that the configuration can start a server.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.network.validate()?;
        self.tls.validate()?;
        self.storage.validate()
    }
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind to.
    #[serde(with = "socket_addr_serde")]
    pub bind_addr: SocketAddr,
    /// Largest accepted frame payload in bytes.
    pub max_frame_size: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

impl NetworkConfig {
    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("ENDPOINTD_BIND") {
            if let Ok(parsed) = addr.parse() {
                self.bind_addr = parsed;
            }
        }

        if let Some(max) = lookup("ENDPOINTD_MAX_FRAME_SIZE") {
            if let Ok(n) = max.parse() {
                self.max_frame_size = n;
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_frame_size == 0 {
            return Err(ConfigError::ValidationError(
                "max_frame_size must be greater than zero".to_string(),
            ));
        }
        if self.max_frame_size > u32::MAX as usize {
            return Err(ConfigError::ValidationError(format!(
                "max_frame_size {} exceeds the 4-byte length prefix (max {})",
                self.max_frame_size,
                u32::MAX
            )));
        }
        Ok(())
    }
}

/// TLS configuration.
///
/// Every connection is mutually authenticated, so all three paths are required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Path to PEM-encoded server certificate chain.
    pub cert_path: Option<PathBuf>,
    /// Path to PEM-encoded server private key.
    pub key_path: Option<PathBuf>,
    /// Path to PEM-encoded CA certificate(s) for verifying client certs.
    pub client_ca_path: Option<PathBuf>,
}

impl TlsConfig {
    /// Creates a configuration from the three required paths.
    pub fn new(
        cert_path: impl Into<PathBuf>,
        key_path: impl Into<PathBuf>,
        client_ca_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            cert_path: Some(cert_path.into()),
            key_path: Some(key_path.into()),
            client_ca_path: Some(client_ca_path.into()),
        }
    }

    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("ENDPOINTD_TLS_CERT") {
            self.cert_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("ENDPOINTD_TLS_KEY") {
            self.key_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("ENDPOINTD_TLS_CLIENT_CA") {
            self.client_ca_path = Some(PathBuf::from(path));
        }
    }

    /// Validates TLS configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cert_path.is_none() {
            return Err(ConfigError::ValidationError(
                "tls.cert_path not set".to_string(),
            ));
        }
        if self.key_path.is_none() {
            return Err(ConfigError::ValidationError(
                "tls.key_path not set".to_string(),
            ));
        }
        if self.client_ca_path.is_none() {
            return Err(ConfigError::ValidationError(
                "tls.client_ca_path not set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Record store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// PostgreSQL `endpoints` table.
    #[default]
    Postgres,
    /// Process-local map, lost on restart.
    Memory,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend to serve records from.
    pub backend: StorageBackend,
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Size of the database connection pool.
    pub max_connections: u32,
    /// Apply bundled migrations at startup.
    pub run_migrations: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Postgres,
            database_url: "postgres://postgres@localhost:5432/endpoints".to_string(),
            max_connections: 10,
            run_migrations: true,
        }
    }
}

impl StorageConfig {
    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(backend) = lookup("ENDPOINTD_STORE") {
            match backend.to_lowercase().as_str() {
                "postgres" | "postgresql" => self.backend = StorageBackend::Postgres,
                "memory" => self.backend = StorageBackend::Memory,
                _ => {}
            }
        }

        if let Some(url) = lookup("ENDPOINTD_DATABASE_URL") {
            self.database_url = url;
        }

        if let Some(max) = lookup("ENDPOINTD_DB_MAX_CONNECTIONS") {
            if let Ok(n) = max.parse() {
                self.max_connections = n;
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == StorageBackend::Postgres {
            if self.database_url.is_empty() {
                return Err(ConfigError::ValidationError(
                    "storage.database_url not set".to_string(),
                ));
            }
            if self.max_connections == 0 {
                return Err(ConfigError::ValidationError(
                    "storage.max_connections must be greater than zero".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serializes a SocketAddr as a plain string in YAML.
mod socket_addr_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::net::SocketAddr;

    pub fn serialize<S>(addr: &SocketAddr, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&addr.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.network.bind_addr.port(), 13800);
        assert!(config.network.bind_addr.ip().is_unspecified());
        assert_eq!(config.network.max_frame_size, MAX_FRAME_SIZE);
        assert_eq!(config.storage.backend, StorageBackend::Postgres);
        assert!(config.storage.run_migrations);
        assert!(config.tls.cert_path.is_none());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut config = Config::default();
        config.tls = TlsConfig::new("server.pem", "server.key", "ca.pem");
        config.storage.backend = StorageBackend::Memory;

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.network.bind_addr, config.network.bind_addr);
        assert_eq!(parsed.tls.client_ca_path, Some(PathBuf::from("ca.pem")));
        assert_eq!(parsed.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "network:\n  bind_addr: \"127.0.0.1:9000\"\ntls:\n  cert_path: /etc/endpointd/server.pem\nstorage:\n  backend: memory"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.network.bind_addr.port(), 9000);
        assert_eq!(config.network.max_frame_size, MAX_FRAME_SIZE);
        assert_eq!(
            config.tls.cert_path,
            Some(PathBuf::from("/etc/endpointd/server.pem"))
        );
        assert!(config.tls.key_path.is_none());
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn test_from_file_errors() {
        let result = Config::from_file("/nonexistent/endpointd.yaml");
        assert!(matches!(result, Err(ConfigError::IoError(..))));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "network:\n  bind_addr: not-an-address").unwrap();
        let result = Config::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(..))));
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config.apply_overrides(lookup(&[
            ("ENDPOINTD_BIND", "127.0.0.1:4000"),
            ("ENDPOINTD_MAX_FRAME_SIZE", "4096"),
            ("ENDPOINTD_TLS_CERT", "c.pem"),
            ("ENDPOINTD_TLS_KEY", "k.pem"),
            ("ENDPOINTD_TLS_CLIENT_CA", "ca.pem"),
            ("ENDPOINTD_STORE", "memory"),
            ("ENDPOINTD_DB_MAX_CONNECTIONS", "3"),
        ]));

        assert_eq!(config.network.bind_addr.port(), 4000);
        assert_eq!(config.network.max_frame_size, 4096);
        assert_eq!(config.tls.key_path, Some(PathBuf::from("k.pem")));
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.max_connections, 3);
        config.validate().unwrap();
    }

    #[test]
    fn test_unparseable_overrides_ignored() {
        let mut config = Config::default();
        config.apply_overrides(lookup(&[
            ("ENDPOINTD_BIND", "nowhere"),
            ("ENDPOINTD_MAX_FRAME_SIZE", "big"),
            ("ENDPOINTD_STORE", "redis"),
        ]));

        assert_eq!(config.network.bind_addr.port(), 13800);
        assert_eq!(config.network.max_frame_size, MAX_FRAME_SIZE);
        assert_eq!(config.storage.backend, StorageBackend::Postgres);
    }

    #[test]
    fn test_validate_requires_tls_paths() {
        let mut config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cert_path"));

        config.tls.cert_path = Some("c.pem".into());
        config.tls.key_path = Some("k.pem".into());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("client_ca_path"));

        config.tls.client_ca_path = Some("ca.pem".into());
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_frame_bound() {
        let mut config = Config::default();
        config.tls = TlsConfig::new("c.pem", "k.pem", "ca.pem");
        config.network.max_frame_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        config.network.max_frame_size = u32::MAX as usize;
        config.validate().unwrap();
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_validate_frame_bound_fits_length_prefix() {
        let mut config = Config::default();
        config.tls = TlsConfig::new("c.pem", "k.pem", "ca.pem");
        config.network.max_frame_size = u32::MAX as usize + 1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("length prefix"));
    }
}
