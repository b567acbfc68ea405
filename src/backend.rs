//! The collaborator interface the chat shell drives.

use crate::stream::EventStream;
use crate::{CreatedSession, Result, SessionId, Turn};

/// Server-side operations a chat session depends on.
///
/// [`Client`](crate::Client) implements this over HTTP; tests and other
/// shells can substitute their own implementation.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// Issue a new session identifier.
    async fn create_session(&self) -> Result<CreatedSession>;

    /// Open the event stream answering `prompt` within session `id`.
    ///
    /// Errors returned here (non-2xx status, connection failure) happen before
    /// any frame is read.
    async fn open_stream(&self, id: &SessionId, prompt: &str) -> Result<EventStream>;

    /// Load every turn of session `id`, oldest first.
    async fn list_turns(&self, id: &SessionId) -> Result<Vec<Turn>>;
}
