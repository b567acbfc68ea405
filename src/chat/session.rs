//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which ties the message
//! store, the session index and a [`ChatBackend`] together, and drives
//! streaming turns into a [`Renderer`].

use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::backend::ChatBackend;
use crate::error::{Error, Result};
use crate::render::Renderer;
use crate::session_index::SessionIndex;
use crate::store::{SessionMessageStore, TurnRef};
use crate::stream::{StreamHandler, StreamOutcome, StreamTask};
use crate::types::{SessionId, StreamEvent, Turn};

/// A chat session that manages conversation state and backend interactions.
///
/// Exactly one session is active at a time.  Its turns live in a
/// [`SessionMessageStore`]; the list of every session the user has created
/// lives in a [`SessionIndex`].
pub struct ChatSession<B: ChatBackend> {
    backend: Arc<B>,
    store: SessionMessageStore,
    index: SessionIndex,
}

impl<B: ChatBackend + 'static> ChatSession<B> {
    /// Creates a new chat session over `backend` and `index`.
    ///
    /// No session is active until one is created or switched to.
    pub fn new(backend: B, index: SessionIndex) -> Self {
        Self {
            backend: Arc::new(backend),
            store: SessionMessageStore::new(),
            index,
        }
    }

    /// The active session, if any.
    pub fn active_session(&self) -> Option<&SessionId> {
        self.store.session_id()
    }

    /// Known sessions in presentation order.
    pub fn sessions(&self) -> Vec<&SessionId> {
        self.index.sessions()
    }

    /// The session index.
    pub fn index(&self) -> &SessionIndex {
        &self.index
    }

    /// Turns of the active session, oldest first.
    pub fn turns(&self) -> &[Turn] {
        self.store.turns()
    }

    /// The message store of the active session.
    pub fn store(&self) -> &SessionMessageStore {
        &self.store
    }

    /// Ask the backend for a new session, record it and make it active.
    pub async fn new_session(&mut self) -> Result<SessionId> {
        let created = self.backend.create_session().await?;
        let id = created.id;
        self.index.add(id.clone())?;
        self.index.set_active(&id)?;
        self.store.switch_session(id.clone(), Vec::new());
        debug!(session = %id, "created session");
        Ok(id)
    }

    /// Make another session active and load its turns from the backend.
    ///
    /// `target` is either a session id or a 1-based `#n` position in the
    /// session list.  An id the index does not know yet is adopted once the
    /// backend confirms it exists.  On failure the active session is left as
    /// it was.
    ///
    /// Any stream still feeding the previously active session stops landing
    /// in the store from this point on.
    pub async fn switch_session(&mut self, target: &str) -> Result<SessionId> {
        let id = self.resolve(target)?;
        let turns = self.backend.list_turns(&id).await?;
        self.index.add(id.clone())?;
        self.index.set_active(&id)?;
        self.store.switch_session(id.clone(), turns);
        debug!(session = %id, turns = self.store.turns().len(), "switched session");
        Ok(id)
    }

    /// Reload the active session from the backend.
    pub async fn reload(&mut self) -> Result<()> {
        let id = self.require_active()?;
        let turns = self.backend.list_turns(&id).await?;
        self.store.switch_session(id, turns);
        Ok(())
    }

    /// Start a turn for `prompt` in the active session and spawn its stream.
    ///
    /// The returned task yields the stream's events; feed them back through
    /// [`ChatSession::apply`].  Cancelling `cancel` aborts the request.
    pub fn begin_turn(
        &mut self,
        prompt: &str,
        cancel: CancellationToken,
    ) -> Result<(TurnRef, StreamTask)> {
        let id = self.require_active()?;
        let turn = self.store.start_turn(prompt);
        let backend = Arc::clone(&self.backend);
        let prompt = prompt.to_string();
        let task = StreamTask::spawn_with_token(
            async move { backend.open_stream(&id, &prompt).await },
            cancel,
        );
        Ok((turn, task))
    }

    /// Apply one stream event to the turn it belongs to.
    ///
    /// Returns false when the turn's session is no longer loaded.
    pub fn apply(&mut self, turn: TurnRef, event: &StreamEvent) -> bool {
        self.store.apply(turn, event)
    }

    /// Sends a message and streams the response.
    ///
    /// A session is created first if none is active.  Response text is
    /// appended to the new turn and rendered as it arrives.  Failures of the
    /// stream are reported through the renderer and recorded on the turn;
    /// they are not returned as errors.
    ///
    /// # Errors
    ///
    /// Returns an error if no session could be created.
    pub async fn send_streaming(
        &mut self,
        prompt: &str,
        renderer: &mut dyn Renderer,
        cancel: CancellationToken,
    ) -> Result<StreamOutcome> {
        if self.active_session().is_none() {
            self.new_session().await?;
        }
        let (turn, mut task) = self.begin_turn(prompt, cancel)?;

        let mut handler = TurnHandler {
            store: &mut self.store,
            turn,
            renderer,
        };
        let outcome = task.dispatch(&mut handler).await;
        if outcome.is_aborted() {
            handler.store.abort_turn(turn);
            handler.renderer.print_interrupted();
        }
        Ok(outcome)
    }

    fn require_active(&self) -> Result<SessionId> {
        self.active_session().cloned().ok_or_else(|| {
            Error::validation("no active session; use /new or /switch", None)
        })
    }

    fn resolve(&self, target: &str) -> Result<SessionId> {
        let target = target.trim();
        if let Some(position) = target.strip_prefix('#') {
            let position: usize = position.parse().map_err(|_| {
                Error::validation(
                    format!("{target} is not a session position"),
                    Some("target".to_string()),
                )
            })?;
            return self.index.nth(position).cloned().ok_or_else(|| {
                Error::not_found(
                    format!("there is no session #{position}"),
                    Some("session".to_string()),
                    Some(target.to_string()),
                )
            });
        }
        if target.is_empty() {
            return Err(Error::validation(
                "session id cannot be empty",
                Some("target".to_string()),
            ));
        }
        Ok(SessionId::from(target))
    }
}

/// Routes the callbacks of one stream into the store and the renderer.
struct TurnHandler<'a> {
    store: &'a mut SessionMessageStore,
    turn: TurnRef,
    renderer: &'a mut dyn Renderer,
}

impl StreamHandler for TurnHandler<'_> {
    fn on_content(&mut self, text: &str) {
        if self.store.append_to_turn(self.turn, text) {
            self.renderer.print_text(text);
        }
    }

    fn on_complete(&mut self) {
        self.store.finish_turn(self.turn);
        self.renderer.finish_response();
    }

    fn on_error(&mut self, message: &str) {
        self.store.fail_turn(self.turn, message);
        self.renderer.print_error(message);
    }
}

/// Routes Ctrl-C to whichever stream is currently running.
///
/// The shell arms a fresh token before each turn; the signal handler calls
/// [`StreamInterrupt::interrupt`] from its own thread.
#[derive(Clone, Default)]
pub struct StreamInterrupt {
    current: Arc<Mutex<CancellationToken>>,
}

impl StreamInterrupt {
    /// Creates an interrupt with nothing armed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install and return a fresh token for the next stream.
    pub fn arm(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.lock() = token.clone();
        token
    }

    /// Cancel the armed token.  Returns true if a live stream was interrupted.
    pub fn interrupt(&self) -> bool {
        let current = self.lock();
        let live = !current.is_cancelled();
        current.cancel();
        live
    }

    fn lock(&self) -> MutexGuard<'_, CancellationToken> {
        match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
