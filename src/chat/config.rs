//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior.

use std::path::PathBuf;
use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::session_index::SessionOrder;

/// Default timeout, in seconds, for connecting and for non-streaming requests.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// File name of the session list when no path is given.
const DEFAULT_SESSIONS_FILE: &str = ".chatstream-sessions.json";

/// Command-line arguments for the chatstream-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Base URL of the chat backend.
    #[arrrg(optional, "Backend base URL (default: $CHATSTREAM_BASE_URL or localhost)", "URL")]
    pub base_url: Option<String>,

    /// Where the list of known sessions is kept.
    #[arrrg(optional, "Session list file (default: ~/.chatstream-sessions.json)", "PATH")]
    pub sessions_file: Option<String>,

    /// Timeout for connecting and non-streaming requests, in seconds.
    #[arrrg(optional, "Request timeout in seconds (default: 60)", "SECS")]
    pub timeout: Option<u64>,

    /// List sessions in creation order instead of newest first.
    #[arrrg(flag, "List sessions oldest first")]
    pub oldest_first: bool,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Base URL of the backend.  `None` defers to the environment.
    pub base_url: Option<String>,

    /// Path of the durable session list.
    pub sessions_file: PathBuf,

    /// Timeout for connecting and non-streaming requests.
    pub timeout: Duration,

    /// Order in which sessions are listed.
    pub order: SessionOrder,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Base URL: from the environment
    /// - Sessions file: in the home directory
    /// - Timeout: 60 seconds
    /// - Order: newest first
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            base_url: None,
            sessions_file: default_sessions_file(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            order: SessionOrder::NewestFirst,
            use_color: true,
        }
    }

    /// Sets the backend base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the session list path.
    pub fn with_sessions_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sessions_file = path.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the session presentation order.
    pub fn with_order(mut self, order: SessionOrder) -> Self {
        self.order = order;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        let defaults = ChatConfig::new();
        ChatConfig {
            base_url: args.base_url,
            sessions_file: args
                .sessions_file
                .map(PathBuf::from)
                .unwrap_or(defaults.sessions_file),
            timeout: args
                .timeout
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            order: if args.oldest_first {
                SessionOrder::OldestFirst
            } else {
                SessionOrder::NewestFirst
            },
            use_color: !args.no_color,
        }
    }
}

fn default_sessions_file() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(DEFAULT_SESSIONS_FILE),
        None => PathBuf::from(DEFAULT_SESSIONS_FILE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ChatConfig::new();
        assert!(config.base_url.is_none());
        assert!(config.sessions_file.ends_with(DEFAULT_SESSIONS_FILE));
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.order, SessionOrder::NewestFirst);
        assert!(config.use_color);
    }

    #[test]
    fn config_from_args_defaults() {
        let config = ChatConfig::from(ChatArgs::default());
        assert_eq!(config, ChatConfig::new());
    }

    #[test]
    fn config_from_args_custom() {
        let args = ChatArgs {
            base_url: Some("http://chat.internal:9000/api/".to_string()),
            sessions_file: Some("/tmp/sessions.json".to_string()),
            timeout: Some(5),
            oldest_first: true,
            no_color: true,
        };
        let config = ChatConfig::from(args);
        assert_eq!(
            config.base_url.as_deref(),
            Some("http://chat.internal:9000/api/")
        );
        assert_eq!(config.sessions_file, PathBuf::from("/tmp/sessions.json"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.order, SessionOrder::OldestFirst);
        assert!(!config.use_color);
    }

    #[test]
    fn config_builder_pattern() {
        let config = ChatConfig::new()
            .with_base_url("http://localhost:1234/")
            .with_sessions_file("sessions.json")
            .with_timeout(Duration::from_secs(2))
            .with_order(SessionOrder::OldestFirst)
            .without_color();

        assert_eq!(config.base_url.as_deref(), Some("http://localhost:1234/"));
        assert_eq!(config.sessions_file, PathBuf::from("sessions.json"));
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.order, SessionOrder::OldestFirst);
        assert!(!config.use_color);
    }
}
