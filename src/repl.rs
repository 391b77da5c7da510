//! Line-based console shell.
//!
//! Reads lines from stdin, dispatches built-in commands, and treats any
//! other input as a chat turn: persist the user message, build the request
//! from the system prompt plus the short-term window, call the model, then
//! persist and print the reply. One turn at a time — each store write and
//! HTTP call is awaited before the next line is accepted.
//!
//! Errors surfaced by a turn are printed and the loop continues; a single
//! bad turn never kills the session.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::llm::azure::AzureChatClient;
use crate::llm::{ChatMessage, Role};
use crate::memory::MemoryManager;

/// System prompt prepended to every model request.
const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

// ── Commands ─────────────────────────────────────────────────────────────────

/// A parsed input line. Anything that isn't a built-in is a chat turn.
#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Exit,
    Help,
    Clear,
    History,
    Conversations,
    New(&'a str),
    Switch(&'a str),
    Chat(&'a str),
}

impl<'a> Command<'a> {
    /// Parse a trimmed input line; `None` for blank input.
    ///
    /// `new` and `switch` require an argument — a bare `new` is a chat turn,
    /// same as the original shell.
    pub fn parse(line: &'a str) -> Option<Self> {
        let text = line.trim();
        if text.is_empty() {
            return None;
        }
        Some(match text {
            "exit" | "quit" => Command::Exit,
            "help" => Command::Help,
            "clear" => Command::Clear,
            "history" => Command::History,
            "conversations" => Command::Conversations,
            _ => {
                if let Some(title) = text.strip_prefix("new ") {
                    Command::New(title.trim())
                } else if let Some(id) = text.strip_prefix("switch ") {
                    Command::Switch(id.trim())
                } else {
                    Command::Chat(text)
                }
            }
        })
    }
}

// ── Shell loop ───────────────────────────────────────────────────────────────

/// Run the shell until `exit`, EOF, or shutdown cancellation.
///
/// Creates (and activates) a `default` conversation on startup.
pub async fn run(
    client: AzureChatClient,
    mut mem: MemoryManager,
    config: &Config,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let conv = mem.create_conversation(Some("default")).await?;
    let mut active_id = conv.id;
    info!(conversation_id = %active_id, "shell started");

    println!("palaver console (type \"help\" for commands)");

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    loop {
        print!("> ");
        use std::io::Write as _;
        let _ = std::io::stdout().flush();

        let line = tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                println!();
                info!("shutdown signal received — closing shell");
                break;
            }

            line = lines.next_line() => match line {
                Err(e) => {
                    warn!("stdin read error: {e}");
                    break;
                }
                Ok(None) => {
                    info!("stdin closed");
                    break;
                }
                Ok(Some(input)) => input,
            },
        };

        let Some(command) = Command::parse(&line) else {
            continue;
        };

        match command {
            Command::Exit => {
                println!("bye.");
                break;
            }
            Command::Help => {
                println!("commands: exit|quit, clear, history, conversations, new <title>, switch <id>, help");
                println!("anything else is sent to the model as a chat turn");
            }
            Command::Clear => {
                mem.clear_short_term(&active_id);
                println!("short-term memory cleared.");
            }
            Command::History => {
                let context = mem.short_term_context(&active_id);
                if context.is_empty() {
                    println!("(short-term memory is empty)");
                }
                for (i, m) in context.iter().enumerate() {
                    println!("{}. [{}] {}", i + 1, m.role, m.content);
                }
            }
            Command::Conversations => match mem.list_conversations().await {
                Ok(convs) => {
                    for c in convs {
                        println!(
                            "{} - {} - updated: {}",
                            c.id,
                            c.title.as_deref().unwrap_or("(no title)"),
                            c.updated_at
                        );
                    }
                }
                Err(e) => println!("[error] {e}"),
            },
            Command::New(title) => {
                let title = if title.is_empty() { "untitled" } else { title };
                match mem.create_conversation(Some(title)).await {
                    Ok(c) => {
                        println!("new conversation created: {}", c.id);
                        active_id = c.id;
                    }
                    Err(e) => println!("[error] {e}"),
                }
            }
            Command::Switch(id) => match mem.conversation_by_id(id).await {
                Ok(Some(c)) => {
                    active_id = c.id;
                    println!("switched to conversation {active_id}");
                }
                Ok(None) => println!("conversation not found"),
                Err(e) => println!("[error] {e}"),
            },
            Command::Chat(text) => {
                print!("thinking... ");
                let _ = std::io::stdout().flush();
                match chat_turn(&client, &mut mem, &active_id, text, config).await {
                    Ok(reply) => println!("\n{reply}"),
                    Err(e) => println!("\n[error] {e}"),
                }
            }
        }
    }

    Ok(())
}

/// One full chat turn: persist the user message, assemble the request from
/// the system prompt + short-term window + the user turn, call the model,
/// persist the reply.
async fn chat_turn(
    client: &AzureChatClient,
    mem: &mut MemoryManager,
    conversation_id: &str,
    text: &str,
    config: &Config,
) -> Result<String, AppError> {
    mem.add_message(conversation_id, Role::User, text).await?;

    let context = mem.short_term_context(conversation_id);
    let mut messages = Vec::with_capacity(context.len() + 2);
    messages.push(ChatMessage::new(Role::System, SYSTEM_PROMPT));
    messages.extend(context);
    messages.push(ChatMessage::new(Role::User, text));

    debug!(conversation_id, message_count = messages.len(), "sending chat turn");
    let reply = client.chat(&messages, config.temperature, config.max_tokens).await?;

    mem.add_message(conversation_id, Role::Assistant, &reply.text).await?;
    Ok(reply.text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_parse_to_none() {
        assert_eq!(Command::parse(""), None);
        assert_eq!(Command::parse("   "), None);
    }

    #[test]
    fn builtins_parse() {
        assert_eq!(Command::parse("exit"), Some(Command::Exit));
        assert_eq!(Command::parse("quit"), Some(Command::Exit));
        assert_eq!(Command::parse("help"), Some(Command::Help));
        assert_eq!(Command::parse("clear"), Some(Command::Clear));
        assert_eq!(Command::parse("history"), Some(Command::History));
        assert_eq!(Command::parse("conversations"), Some(Command::Conversations));
    }

    #[test]
    fn new_and_switch_take_arguments() {
        assert_eq!(Command::parse("new my chat"), Some(Command::New("my chat")));
        assert_eq!(Command::parse("switch abc-123"), Some(Command::Switch("abc-123")));
        assert_eq!(Command::parse("new   spaced title"), Some(Command::New("spaced title")));
    }

    #[test]
    fn bare_new_is_a_chat_turn() {
        // Matches the original shell: only the spaced forms are commands.
        assert_eq!(Command::parse("new"), Some(Command::Chat("new")));
        assert_eq!(Command::parse("switch"), Some(Command::Chat("switch")));
    }

    #[test]
    fn everything_else_is_chat() {
        assert_eq!(
            Command::parse("  what is rust?  "),
            Some(Command::Chat("what is rust?"))
        );
        assert_eq!(Command::parse("helpme"), Some(Command::Chat("helpme")));
    }
}
