//! Chat sessions
//!
//! A session is a transcript plus a two-state machine. It is loaded by id,
//! handed to the chat loop, and stored back after every mutation.

pub mod service;

use crate::error::ChatError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub use service::{ChatService, TurnOutcome};

pub const GREETING: &str = "How can I help you?";

static SESSION_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").unwrap());

/// Reject ids that could escape the storage directory or are unreasonably long
pub fn validate_session_id(id: &str) -> Result<(), ChatError> {
    if SESSION_ID.is_match(id) {
        Ok(())
    } else {
        Err(ChatError::InvalidSession(id.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Processing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatSession {
    id: String,
    transcript: Vec<ChatTurn>,
    state: SessionState,
}

impl ChatSession {
    /// Fresh session holding only the greeting
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            transcript: vec![ChatTurn::assistant(GREETING)],
            state: SessionState::Idle,
        }
    }

    /// Rebuild a session from stored turns; an empty history starts fresh
    pub fn restore(id: impl Into<String>, transcript: Vec<ChatTurn>) -> Self {
        if transcript.is_empty() {
            return Self::new(id);
        }
        Self {
            id: id.into(),
            transcript,
            state: SessionState::Idle,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn transcript(&self) -> &[ChatTurn] {
        &self.transcript
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Idle -> Processing, appending the user's message
    ///
    /// Blank messages leave the session untouched and return `None`.
    pub fn begin_turn(&mut self, message: &str) -> Option<&ChatTurn> {
        if message.trim().is_empty() || self.state == SessionState::Processing {
            return None;
        }
        self.transcript.push(ChatTurn::user(message));
        self.state = SessionState::Processing;
        self.transcript.last()
    }

    /// Processing -> Idle, appending the assistant's reply
    pub fn complete_turn(&mut self, answer: impl Into<String>) -> Option<&ChatTurn> {
        if self.state != SessionState::Processing {
            return None;
        }
        self.transcript.push(ChatTurn::assistant(answer));
        self.state = SessionState::Idle;
        self.transcript.last()
    }

    /// Processing -> Idle without a reply; the user's message stays
    pub fn abort_turn(&mut self) {
        self.state = SessionState::Idle;
    }

    /// Back to the greeting alone
    pub fn clear(&mut self) {
        self.transcript = vec![ChatTurn::assistant(GREETING)];
        self.state = SessionState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_seeded() {
        let session = ChatSession::new("s1");
        assert_eq!(session.transcript(), &[ChatTurn::assistant(GREETING)]);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_turns_append_in_order() {
        let mut session = ChatSession::new("s1");
        for i in 0..3 {
            session.begin_turn(&format!("question {}", i)).unwrap();
            assert_eq!(session.state(), SessionState::Processing);
            session.complete_turn(format!("answer {}", i)).unwrap();
            assert_eq!(session.state(), SessionState::Idle);
        }

        let transcript = session.transcript();
        assert_eq!(transcript.len(), 1 + 2 * 3);
        assert_eq!(transcript[1], ChatTurn::user("question 0"));
        assert_eq!(transcript[2], ChatTurn::assistant("answer 0"));
        assert_eq!(transcript[6], ChatTurn::assistant("answer 2"));
    }

    #[test]
    fn test_blank_message_does_not_transition() {
        let mut session = ChatSession::new("s1");
        assert!(session.begin_turn("   ").is_none());
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.transcript().len(), 1);
        assert!(session.complete_turn("orphan").is_none());
        assert_eq!(session.transcript().len(), 1);
    }

    #[test]
    fn test_message_kept_verbatim() {
        let mut session = ChatSession::new("s1");
        let turn = session.begin_turn("  bolts in stock?\n").unwrap();
        assert_eq!(turn.content, "  bolts in stock?\n");
    }

    #[test]
    fn test_abort_keeps_user_turn() {
        let mut session = ChatSession::new("s1");
        session.begin_turn("question").unwrap();
        session.abort_turn();

        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.transcript().last(), Some(&ChatTurn::user("question")));
    }

    #[test]
    fn test_clear_at_any_point() {
        let mut session = ChatSession::new("s1");
        session.begin_turn("q").unwrap();
        session.clear();
        assert_eq!(session.transcript(), &[ChatTurn::assistant(GREETING)]);
        assert_eq!(session.state(), SessionState::Idle);

        session.begin_turn("q").unwrap();
        session.complete_turn("a").unwrap();
        session.clear();
        assert_eq!(session.transcript().len(), 1);
    }

    #[test]
    fn test_restore_empty_history_seeds_greeting() {
        let session = ChatSession::restore("s1", Vec::new());
        assert_eq!(session.transcript().len(), 1);

        let restored = ChatSession::restore("s1", vec![ChatTurn::assistant("hi"), ChatTurn::user("q")]);
        assert_eq!(restored.transcript().len(), 2);
    }

    #[test]
    fn test_session_id_validation() {
        assert!(validate_session_id("abc-123_X").is_ok());
        assert!(validate_session_id("").is_err());
        assert!(validate_session_id("../etc/passwd").is_err());
        assert!(validate_session_id(&"a".repeat(65)).is_err());
    }
}
