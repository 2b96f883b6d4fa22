//! Secret lookup
//!
//! The LLM key is read by name from whichever store the process is given.

use anyhow::{Context, Result};
use config::{Config, File};
use std::env;
use std::path::{Path, PathBuf};

pub trait SecretStore: Send + Sync {
    /// Read one named secret
    fn get(&self, name: &str) -> Result<String>;
}

/// Secrets from the process environment (after `.env` has been loaded)
#[derive(Debug, Default)]
pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn get(&self, name: &str) -> Result<String> {
        match env::var(name) {
            Ok(value) if !value.trim().is_empty() => Ok(value),
            Ok(_) => Err(anyhow::anyhow!("Secret '{}' is empty", name)),
            Err(_) => Err(anyhow::anyhow!("Secret '{}' is not set in the environment", name)),
        }
    }
}

/// Secrets from a flat TOML file, e.g. `API_KEY = "..."`
#[derive(Debug)]
pub struct FileSecretStore {
    path: PathBuf,
    config: Config,
}

impl FileSecretStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let config = Config::builder()
            .add_source(File::from(path.as_path()).format(config::FileFormat::Toml))
            .build()
            .with_context(|| format!("Failed to read secrets file {:?}", path))?;

        Ok(Self { path, config })
    }
}

impl SecretStore for FileSecretStore {
    fn get(&self, name: &str) -> Result<String> {
        let value = self
            .config
            .get_string(name)
            .with_context(|| format!("Secret '{}' not found in {:?}", name, self.path))?;

        if value.trim().is_empty() {
            return Err(anyhow::anyhow!("Secret '{}' is empty", name));
        }
        Ok(value)
    }
}
