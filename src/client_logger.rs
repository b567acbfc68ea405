//! Logging trait for backend client operations.
//!
//! This module provides the [`ClientLogger`] trait that allows users to capture
//! and log the traffic passing through the [`Client`](crate::Client).

use crate::{SessionId, StreamEvent, Turn};

/// A trait for logging backend client operations.
///
/// Implement this trait to capture sessions as they are created, every
/// decoded stream event, and every conversation reloaded from the backend.
///
/// # Example
///
/// ```rust,ignore
/// use chatstream::{ClientLogger, SessionId, StreamEvent, Turn};
/// use std::io::Write;
/// use std::sync::Mutex;
///
/// struct FileLogger {
///     file: Mutex<std::fs::File>,
/// }
///
/// impl ClientLogger for FileLogger {
///     fn log_session_created(&self, id: &SessionId) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "created {id}").unwrap();
///     }
///
///     fn log_stream_event(&self, id: &SessionId, event: &StreamEvent) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "{id}: {}", serde_json::to_string(event).unwrap()).unwrap();
///     }
///
///     fn log_turns(&self, id: &SessionId, turns: &[Turn]) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "{id}: loaded {} turns", turns.len()).unwrap();
///     }
/// }
/// ```
pub trait ClientLogger: Send + Sync {
    /// Log a session issued by the backend.
    fn log_session_created(&self, id: &SessionId);

    /// Log an individual decoded stream event.
    ///
    /// Called in wire order for every event, terminal ones included.
    /// Discarded frames never reach the logger.
    fn log_stream_event(&self, id: &SessionId, event: &StreamEvent);

    /// Log a conversation loaded from the backend.
    fn log_turns(&self, id: &SessionId, turns: &[Turn]);
}
