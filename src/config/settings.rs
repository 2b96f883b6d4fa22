use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub llm: LLMConfig,
    pub agent: AgentConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Base URL of an OpenAI-compatible API, without the `/chat/completions` suffix
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub max_attempts: u32,
    /// Name of the secret holding the API key
    pub api_key_secret: String,
    /// Optional TOML secrets file; the process environment is used when unset
    pub secrets_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub max_iterations: usize,
    pub top_k: usize,
    pub max_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Local SQLite file, resolved against the executable's directory when relative
    pub local_path: PathBuf,
    pub table: String,
    pub cache_ttl_secs: u64,
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    Memory,
    Filesystem,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub storage: StorageKind,
    pub storage_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config_env = env::var("CONFIG_ENV").unwrap_or_else(|_| "default".to_string());

        let config = Self::defaults()?
            .add_source(File::with_name(&format!("config/{}", config_env)).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("llm.base_url", "https://api.groq.com/openai/v1")?
            .set_default("llm.model", "llama3-70b-8192")?
            .set_default("llm.max_tokens", 1024)?
            .set_default("llm.temperature", 0.0)?
            .set_default("llm.max_attempts", 1)?
            .set_default("llm.api_key_secret", "API_KEY")?
            .set_default("agent.max_iterations", 15)?
            .set_default("agent.top_k", 10)?
            .set_default("agent.max_rows", 100)?
            .set_default("database.local_path", "inventory.db")?
            .set_default("database.table", "Inventory")?
            .set_default("database.cache_ttl_secs", 2 * 60 * 60)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("server.listen_addr", "127.0.0.1:8501")?
            .set_default("session.storage", "memory")?
            .set_default("session.storage_dir", "./sessions")?
            .set_default("logging.level", "info")
    }
}
