use crate::agent::{AgentEvent, AgentEventSink};
use colored::*;

pub fn print_header(text: &str) {
    println!("\n{}", text.bright_cyan().bold());
    println!("{}", "=".repeat(text.len()).bright_cyan());
}

pub fn print_success(text: &str) {
    println!("{}", text.green());
}

pub fn print_error(text: &str) {
    eprintln!("{}", text.red().bold());
}

pub fn print_info(text: &str) {
    println!("{}", text.blue());
}

pub fn print_prompt(text: &str) {
    print!("{}", text.yellow().bold());
}

pub fn print_turn(role: &str, content: &str) {
    println!("{} {}", format!("{}:", role).bold(), content);
}

/// Renders agent steps to the terminal as they arrive
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl AgentEventSink for ConsoleSink {
    fn on_event(&self, event: &AgentEvent) {
        match event {
            AgentEvent::Thought { text } => println!("  {} {}", "thought".dimmed(), text.dimmed()),
            AgentEvent::ToolStart { tool, input } => {
                println!("  {} {} {}", "→".cyan(), tool.cyan(), input.to_string().dimmed())
            }
            AgentEvent::ToolEnd { output, .. } => {
                for line in output.lines().take(12) {
                    println!("    {}", line);
                }
            }
            AgentEvent::ToolError { tool, error } => {
                println!("  {} {}: {}", "✗".red(), tool, error.red())
            }
            AgentEvent::Finish { .. } => {}
        }
    }
}
