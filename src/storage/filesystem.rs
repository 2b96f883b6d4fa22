//! File System Transcript Storage
//!
//! Information Hiding:
//! - One JSON file per session, written via a temp file and rename
//! - Session ids checked before they become file names

use super::ConversationStorage;
use crate::session::{validate_session_id, ChatTurn};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

/// Transcripts stored as `{base_path}/{session_id}.json`
pub struct FileSystemStorage {
    base_path: PathBuf,
}

impl FileSystemStorage {
    pub async fn new(base_path: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_path)
            .await
            .with_context(|| format!("Failed to create session directory {:?}", base_path))?;

        Ok(Self { base_path })
    }

    fn session_path(&self, session_id: &str) -> Result<PathBuf> {
        validate_session_id(session_id)?;
        Ok(self.base_path.join(format!("{}.json", session_id)))
    }
}

#[async_trait]
impl ConversationStorage for FileSystemStorage {
    async fn save(&self, session_id: &str, history: &[ChatTurn]) -> Result<()> {
        let path = self.session_path(session_id)?;
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(history).context("Failed to serialize transcript")?;

        fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write {:?}", tmp))?;
        fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Failed to move transcript into {:?}", path))?;

        tracing::debug!(
            "[FileSystemStorage] Saved {} turns for session '{}'",
            history.len(),
            session_id
        );
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Vec<ChatTurn>> {
        let path = self.session_path(session_id)?;

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("Failed to read {:?}", path)),
        };

        serde_json::from_slice(&bytes).with_context(|| format!("Corrupt transcript file {:?}", path))
    }
}
