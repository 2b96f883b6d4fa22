//! Transcript Storage Abstraction
//!
//! Information Hiding:
//! - Storage backend implementation details hidden behind trait
//! - Allows swapping between memory and filesystem without API changes

use crate::config::{SessionConfig, StorageKind};
use crate::session::ChatTurn;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub mod filesystem;
pub mod memory;

pub use filesystem::FileSystemStorage;
pub use memory::InMemoryStorage;

/// Persists chat transcripts keyed by session id
#[async_trait]
pub trait ConversationStorage: Send + Sync {
    /// Save the transcript for a session
    async fn save(&self, session_id: &str, history: &[ChatTurn]) -> Result<()>;

    /// Load the transcript for a session
    /// Returns empty vector if session doesn't exist
    async fn load(&self, session_id: &str) -> Result<Vec<ChatTurn>>;
}

/// Build the backend selected in settings
pub async fn from_config(config: &SessionConfig) -> Result<Arc<dyn ConversationStorage>> {
    Ok(match config.storage {
        StorageKind::Memory => Arc::new(InMemoryStorage::new()),
        StorageKind::Filesystem => {
            Arc::new(FileSystemStorage::new(config.storage_dir.clone()).await?)
        }
    })
}
