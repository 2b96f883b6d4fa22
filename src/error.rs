use thiserror::Error;

/// Failures surfaced to whoever drives a chat turn
#[derive(Debug, Error)]
pub enum ChatError {
    /// The selected data source is incomplete; nothing was attempted
    #[error("{0}")]
    Configuration(String),

    /// The database could not be opened or reached
    #[error("Database connection failed: {0:#}")]
    Connection(#[source] anyhow::Error),

    /// The agent (model call, tools) failed mid-turn
    #[error("Agent failed: {0:#}")]
    Agent(#[source] anyhow::Error),

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Invalid session id '{0}'")]
    InvalidSession(String),

    #[error("Session storage failed: {0:#}")]
    Storage(#[source] anyhow::Error),
}

impl ChatError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, ChatError::Configuration(_))
    }
}
