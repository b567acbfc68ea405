//! Interactive chat application for a streaming chat backend.
//!
//! This binary provides a streaming REPL with several server-side sessions.
//!
//! # Usage
//!
//! ```bash
//! # Talk to a backend on localhost
//! chatstream-chat
//!
//! # Point at another backend and keep the session list elsewhere
//! chatstream-chat --base-url https://chat.example.com/api/ --sessions-file ./sessions.json
//!
//! # Disable colors (useful for piping output)
//! chatstream-chat --no-color
//! ```
//!
//! Set `RUST_LOG=chatstream=debug` to see stream diagnostics on stderr.
//!
//! # Commands
//!
//! - `/new` - Start a new session
//! - `/switch <id|#n>` - Switch sessions
//! - `/sessions` - List sessions
//! - `/history` - Show the active conversation
//! - `/reload` - Reload the active conversation from the server
//! - `/quit` - Exit the application

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use chatstream::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatSession, PlainTextRenderer, Renderer, StreamInterrupt,
    help_text, parse_command,
};
use chatstream::{Client, FileSlot, SessionIndex};

/// Main entry point for the chatstream-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("chatstream-chat [OPTIONS]");
    let config = ChatConfig::from(args);

    let client = Client::with_options(config.base_url.clone(), Some(config.timeout))?;
    println!("Chat backend: {}", client.base_url());
    let index = SessionIndex::open(FileSlot::new(&config.sessions_file), config.order)?;
    let latest = index.latest().cloned();

    let mut session = ChatSession::new(client, index);
    let mut renderer = PlainTextRenderer::with_color(config.use_color);
    let mut rl = DefaultEditor::new()?;

    let interrupt = StreamInterrupt::new();
    let handler_interrupt = interrupt.clone();
    ctrlc::set_handler(move || {
        handler_interrupt.interrupt();
    })?;

    if let Some(id) = latest {
        match session.switch_session(id.as_str()).await {
            Ok(id) => renderer.print_info(&format!(
                "Resumed session {id} ({} turns)",
                session.turns().len()
            )),
            Err(err) => renderer.print_error(&format!("Could not resume {id}: {err}")),
        }
    }
    println!("Type /help for commands, /quit to exit\n");

    loop {
        let readline = rl.readline("You: ");

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                // Check for slash commands
                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {}", line);
                            }
                        }
                        ChatCommand::New => match session.new_session().await {
                            Ok(id) => renderer.print_info(&format!("Started session {id}")),
                            Err(err) => renderer
                                .print_error(&format!("Failed to create session: {err}")),
                        },
                        ChatCommand::Switch(target) => {
                            match session.switch_session(&target).await {
                                Ok(id) => {
                                    renderer.print_info(&format!("Switched to session {id}"));
                                    for turn in session.turns() {
                                        renderer.print_turn(turn);
                                    }
                                }
                                Err(err) => renderer
                                    .print_error(&format!("Failed to switch session: {err}")),
                            }
                        }
                        ChatCommand::Sessions => {
                            renderer.print_sessions(&session.sessions(), session.active_session());
                        }
                        ChatCommand::History => {
                            if session.turns().is_empty() {
                                renderer.print_info("No messages yet.");
                            }
                            for turn in session.turns() {
                                renderer.print_turn(turn);
                            }
                        }
                        ChatCommand::Reload => match session.reload().await {
                            Ok(()) => renderer.print_info(&format!(
                                "Reloaded {} turns.",
                                session.turns().len()
                            )),
                            Err(err) => renderer.print_error(&format!("Failed to reload: {err}")),
                        },
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                // Regular message - send to the backend
                let cancel = interrupt.arm();
                if let Err(e) = session.send_streaming(line, &mut renderer, cancel).await {
                    renderer.print_error(&e.to_string());
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}
