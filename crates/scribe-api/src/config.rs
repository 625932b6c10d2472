//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use scribe_core::{defaults, Error, Result};

/// Where records live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    /// Process-local store; everything is lost on restart.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(StorageBackend::Postgres),
            "memory" | "mem" => Ok(StorageBackend::Memory),
            other => Err(Error::Config(format!("unknown STORAGE backend: {other}"))),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub storage: StorageBackend,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::SERVER_HOST.to_string(),
            port: defaults::SERVER_PORT,
            database_url: "postgres://localhost/scribe".to_string(),
            upload_dir: PathBuf::from(defaults::UPLOAD_DIR),
            max_upload_bytes: defaults::MAX_UPLOAD_BYTES,
            storage: StorageBackend::Postgres,
        }
    }
}

impl ServerConfig {
    /// Read configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `HOST` | `0.0.0.0` |
    /// | `PORT` | `3000` |
    /// | `DATABASE_URL` | `postgres://localhost/scribe` |
    /// | `UPLOAD_DIR` | `./uploads` |
    /// | `MAX_UPLOAD_BYTES` | 200 MB |
    /// | `STORAGE` | `postgres` (`memory` for a database-less run) |
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(host) = std::env::var("HOST") {
            config.host = host;
        }
        if let Some(port) = std::env::var("PORT").ok().and_then(|v| v.parse().ok()) {
            config.port = port;
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = url;
        }
        if let Ok(dir) = std::env::var("UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(dir);
        }
        if let Some(bytes) = std::env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.max_upload_bytes = bytes;
        }
        if let Ok(storage) = std::env::var("STORAGE") {
            config.storage = storage.parse()?;
        }
        Ok(config)
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| Error::Config(format!("invalid HOST/PORT: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_backend_parses() {
        assert_eq!("postgres".parse::<StorageBackend>().unwrap(), StorageBackend::Postgres);
        assert_eq!("Memory".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert!("sqlite".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_default_addr() {
        let config = ServerConfig::default();
        assert_eq!(config.addr().unwrap().port(), 3000);
        assert_eq!(config.storage, StorageBackend::Postgres);
    }

    #[test]
    fn test_bad_host_is_config_error() {
        let config = ServerConfig {
            host: "not a host".into(),
            ..Default::default()
        };
        assert!(matches!(config.addr(), Err(Error::Config(_))));
    }
}
