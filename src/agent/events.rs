//! Intermediate agent output
//!
//! The agent reports each step as it happens; whoever drives the turn
//! decides where the events go (terminal, SSE stream, test collector).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    Thought { text: String },
    ToolStart { tool: String, input: Value },
    ToolEnd { tool: String, output: String },
    ToolError { tool: String, error: String },
    Finish { answer: String },
}

pub trait AgentEventSink: Send + Sync {
    fn on_event(&self, event: &AgentEvent);
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<AgentEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AgentEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl AgentEventSink for CollectingSink {
    fn on_event(&self, event: &AgentEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Forwards events to a channel; a closed receiver is ignored
pub struct ChannelSink {
    sender: UnboundedSender<AgentEvent>,
}

impl ChannelSink {
    pub fn new(sender: UnboundedSender<AgentEvent>) -> Self {
        Self { sender }
    }
}

impl AgentEventSink for ChannelSink {
    fn on_event(&self, event: &AgentEvent) {
        let _ = self.sender.send(event.clone());
    }
}
