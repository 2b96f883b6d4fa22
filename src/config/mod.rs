mod secrets;
mod settings;

pub use secrets::{EnvSecretStore, FileSecretStore, SecretStore};
pub use settings::{
    AgentConfig, DatabaseConfig, LLMConfig, LoggingConfig, ServerConfig, SessionConfig, Settings,
    StorageKind,
};

impl Settings {
    /// Resolve the LLM API key from the configured secret store
    pub fn api_key(&self) -> anyhow::Result<String> {
        let store: Box<dyn SecretStore> = match &self.llm.secrets_file {
            Some(path) => Box::new(FileSecretStore::open(path)?),
            None => Box::new(EnvSecretStore),
        };
        store.get(&self.llm.api_key_secret)
    }
}
