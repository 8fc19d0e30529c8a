//! Listen address persisted across restarts.
//!
//! The first start writes the configured values; later starts reuse the
//! stored port so the node keeps the address it advertised.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use arbor_protocol::Address;

use crate::ConfigError;

pub const SUPPORTED_ENCODING: &str = "utf-8";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeOptions {
    pub host: IpAddr,
    pub port: u16,
    pub buffer_size: usize,
    pub encoding: String,
}

impl NodeOptions {
    pub fn new(host: IpAddr, port: u16, buffer_size: usize) -> Self {
        Self { host, port, buffer_size, encoding: SUPPORTED_ENCODING.to_string() }
    }

    pub fn address(&self) -> Address {
        Address::new(self.host, self.port)
    }
}

#[derive(Debug)]
pub struct PersistedOptions {
    path: PathBuf,
    options: NodeOptions,
}

impl PersistedOptions {
    /// Read the options file, or create it from `defaults`.
    ///
    /// Only the port is taken from an existing file; host and buffer size
    /// follow the current configuration.
    pub fn load_or_create(path: impl Into<PathBuf>, defaults: NodeOptions) -> Result<Self, ConfigError> {
        let path = path.into();
        let mut options = defaults;

        if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|source| io_error(&path, source))?;
            let stored: NodeOptions = serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
                path: path.display().to_string(),
                source,
            })?;
            check_encoding(&stored.encoding)?;
            options.port = stored.port;
            tracing::debug!(path = %path.display(), port = options.port, "Loaded persisted options");
            Ok(Self { path, options })
        } else {
            check_encoding(&options.encoding)?;
            let persisted = Self { path, options };
            persisted.save()?;
            Ok(persisted)
        }
    }

    pub fn options(&self) -> &NodeOptions {
        &self.options
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store a new port, in the file and in memory.
    pub fn change_port(&mut self, port: u16) -> Result<(), ConfigError> {
        self.options.port = port;
        self.save()
    }

    fn save(&self) -> Result<(), ConfigError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| io_error(dir, source))?;
        }
        let json = serde_json::to_string_pretty(&self.options).map_err(|source| ConfigError::Json {
            path: self.path.display().to_string(),
            source,
        })?;
        std::fs::write(&self.path, json).map_err(|source| io_error(&self.path, source))
    }
}

fn check_encoding(encoding: &str) -> Result<(), ConfigError> {
    let normalized = encoding.to_ascii_lowercase().replace('_', "-");
    if normalized == SUPPORTED_ENCODING || normalized == "utf8" {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("unsupported text encoding '{encoding}'")))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> ConfigError {
    ConfigError::Io { path: path.display().to_string(), source }
}
