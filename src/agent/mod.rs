//! SQL-issuing agent and its progress events

pub mod events;
pub mod sql_agent;

pub use events::{AgentEvent, AgentEventSink, ChannelSink, CollectingSink};
pub use sql_agent::{SqlAgent, STOPPED_ANSWER};
