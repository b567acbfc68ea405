//! Chat application module for interactive, multi-session conversations.
//!
//! This module provides a streaming REPL chat interface built on top of the
//! chatstream client library. It supports:
//!
//! - Streaming responses with real-time token display
//! - Several sessions, created on the server and remembered locally
//! - Slash commands for session control
//! - Interrupting a response while it streams
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: Session switching and streaming turns
//! - [`commands`]: Slash command parsing

mod commands;
mod config;
mod session;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
pub use session::{ChatSession, StreamInterrupt};
