//! invchat - chat with an inventory database through a SQL-issuing agent
//!
//! A data source (bundled read-only SQLite file or a MySQL server) is opened
//! through a time-bounded cache, an agent answers questions by running SQL
//! against it, and each session keeps an append-only transcript.

pub mod agent;
pub mod cli;
mod config;
pub mod core;
pub mod database;
pub mod error;
pub mod session;
pub mod storage;
pub mod tools;
pub mod utils;
pub mod web;

pub use config::{
    AgentConfig, DatabaseConfig, EnvSecretStore, FileSecretStore, LLMConfig, SecretStore,
    SessionConfig, Settings, StorageKind,
};
pub use database::{ConnectionProvider, DataSource, RemoteParams};
pub use error::ChatError;
pub use session::{ChatService, ChatSession, ChatTurn, Role};

use crate::core::llm::LLMClient;
use std::sync::Arc;

/// Wire the provider, model client and transcript storage described by `settings`
///
/// Fails if the API key secret cannot be read.
pub async fn build_chat_service(settings: &Settings) -> anyhow::Result<Arc<ChatService>> {
    let api_key = settings.api_key()?;
    let model = Arc::new(LLMClient::new(api_key, settings.llm.clone()));
    let provider = Arc::new(ConnectionProvider::from_config(&settings.database)?);
    let storage = storage::from_config(&settings.session).await?;

    tracing::info!(
        "invchat ready: model {}, local database {:?}, table {}",
        settings.llm.model,
        provider.local_path(),
        provider.table()
    );

    Ok(Arc::new(ChatService::new(
        provider,
        model,
        storage,
        settings.agent.clone(),
    )))
}
