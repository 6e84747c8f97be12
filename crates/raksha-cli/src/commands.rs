//! Slash commands for interactive mode

use raksha_chat::ChatSession;
use raksha_stream::{MessageStatus, Role};

/// Result of executing a slash command
#[derive(Debug, PartialEq, Eq)]
pub enum CommandResult {
    /// Clear the conversation
    Clear,
    /// Show a message to the user (not sent to the assistant)
    Message(String),
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse and execute a slash command
pub fn execute_command(input: &str, session: &ChatSession) -> Option<CommandResult> {
    let input = input.trim();
    let command = input.strip_prefix('/')?;
    let command = command
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_lowercase();

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),
        "clear" | "c" => CommandResult::Clear,
        "history" => CommandResult::Message(history_text(session)),
        "quit" | "exit" | "q" => CommandResult::Exit,
        _ => CommandResult::Unknown(command),
    })
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?     Show this help message
  /history          Show the conversation so far
  /clear, /c        Start a new conversation
  /quit, /q         Exit

Press Ctrl-C while a reply is streaming to stop it."#
        .to_string()
}

fn history_text(session: &ChatSession) -> String {
    let messages = session.messages();
    if messages.is_empty() {
        return "No messages yet.".to_string();
    }

    messages
        .iter()
        .enumerate()
        .map(|(i, msg)| {
            let role = match msg.role {
                Role::User => "you",
                Role::Assistant => "assistant",
            };
            let marker = match msg.status {
                MessageStatus::Incomplete => " (incomplete)",
                MessageStatus::Streaming => " (streaming)",
                MessageStatus::Complete => "",
            };
            let preview: String = msg.content.chars().take(80).collect();
            format!("  {}: [{}{}] {}", i, role, marker, preview.replace('\n', " "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
