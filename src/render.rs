//! Output rendering for the chat shell.
//!
//! This module provides a trait-based rendering abstraction so the session
//! logic can drive a terminal, a test recorder, or anything else that wants
//! to display a conversation as it streams.

use std::io::{self, Stdout, Write};

use crate::{SessionId, Turn};

/// ANSI escape code for dim text (used for session ids and notices).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for prompts in history).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for green text (used for the active session marker).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Trait for rendering chat output.
pub trait Renderer: Send {
    /// Print a chunk of response text.
    ///
    /// This is called incrementally as content frames arrive.
    fn print_text(&mut self, text: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Print one stored turn of a conversation.
    fn print_turn(&mut self, turn: &Turn);

    /// Print the known sessions, marking the active one.
    ///
    /// Positions are 1-based and match what `/switch #n` accepts.
    fn print_sessions(&mut self, sessions: &[&SessionId], active: Option<&SessionId>);

    /// Called when a response is complete.
    ///
    /// Used to ensure proper newlines after streaming.
    fn finish_response(&mut self);

    /// Called when the stream is interrupted by the user.
    fn print_interrupted(&mut self);
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
        }
    }

    /// Flushes stdout to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn styled(&self, style: &str, text: &str) -> String {
        if self.use_color {
            format!("{style}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn print_text(&mut self, text: &str) {
        print!("{text}");
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        eprintln!("\n{}", self.styled(ANSI_RED, &format!("Error: {error}")));
    }

    fn print_info(&mut self, info: &str) {
        println!("{info}");
    }

    fn print_turn(&mut self, turn: &Turn) {
        println!("{}", self.styled(ANSI_CYAN, &format!("> {}", turn.prompt)));
        println!("{}", turn.response);
        println!();
    }

    fn print_sessions(&mut self, sessions: &[&SessionId], active: Option<&SessionId>) {
        if sessions.is_empty() {
            println!("{}", self.styled(ANSI_DIM, "No sessions yet. Use /new."));
            return;
        }
        for (position, id) in sessions.iter().enumerate() {
            if active == Some(*id) {
                println!(
                    "{} {}",
                    self.styled(ANSI_GREEN, &format!("* #{}", position + 1)),
                    id
                );
            } else {
                println!("  #{} {}", position + 1, self.styled(ANSI_DIM, id.as_str()));
            }
        }
    }

    fn finish_response(&mut self) {
        println!();
        self.flush();
    }

    fn print_interrupted(&mut self) {
        println!("\n{}", self.styled(ANSI_DIM, "[interrupted]"));
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renderer_default_has_color() {
        let renderer = PlainTextRenderer::new();
        assert!(renderer.use_color);
    }

    #[test]
    fn renderer_without_color() {
        let renderer = PlainTextRenderer::with_color(false);
        assert!(!renderer.use_color);
        assert_eq!(renderer.styled(ANSI_RED, "boom"), "boom");
    }

    #[test]
    fn styled_wraps_and_resets() {
        let renderer = PlainTextRenderer::with_color(true);
        assert_eq!(
            renderer.styled(ANSI_GREEN, "ok"),
            format!("{ANSI_GREEN}ok{ANSI_RESET}")
        );
    }
}
