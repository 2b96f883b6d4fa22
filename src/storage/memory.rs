//! In-Memory Transcript Storage
//!
//! Lost when the process exits; the default for the web server.

use super::ConversationStorage;
use crate::session::ChatTurn;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryStorage {
    sessions: RwLock<HashMap<String, Vec<ChatTurn>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStorage for InMemoryStorage {
    async fn save(&self, session_id: &str, history: &[ChatTurn]) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), history.to_vec());
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Vec<ChatTurn>> {
        Ok(self
            .sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }
}
