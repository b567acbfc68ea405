//! Conversation state for the active session.
//!
//! The store owns the ordered [`Turn`]s of whichever session is active and
//! applies the updates an in-flight stream produces.  Every load of a session
//! starts a new generation; a [`TurnRef`] remembers the generation it was
//! issued in, so updates from a stream that outlived a session switch are
//! dropped instead of landing in the newly loaded conversation.

use crate::observability::STORE_APPENDS_DROPPED;
use crate::{SessionId, StreamEvent, Turn};

/// A handle on one turn, valid for the session load that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TurnRef {
    generation: u64,
    index: usize,
}

impl TurnRef {
    /// Position of the turn within its session.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Where a turn stands with respect to its stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnStatus {
    /// Text may still be appended.
    Streaming,
    /// The server finished the response (or the turn was loaded complete).
    Complete,
    /// The stream failed with the given message.
    Failed(String),
    /// The user cancelled the stream.
    Aborted,
}

/// The ordered turns of the active session.
#[derive(Debug, Default)]
pub struct SessionMessageStore {
    session: Option<SessionId>,
    generation: u64,
    turns: Vec<Turn>,
    statuses: Vec<TurnStatus>,
}

impl SessionMessageStore {
    /// Create an empty store with no active session.
    pub fn new() -> Self {
        Self::default()
    }

    /// The session whose turns are loaded, if any.
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }

    /// The loaded turns, oldest first.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Look up a turn by reference.  Stale references resolve to `None`.
    pub fn turn(&self, turn: TurnRef) -> Option<&Turn> {
        self.resolve(turn).map(|index| &self.turns[index])
    }

    /// The status of a turn.  Stale references resolve to `None`.
    pub fn status(&self, turn: TurnRef) -> Option<&TurnStatus> {
        self.resolve(turn).map(|index| &self.statuses[index])
    }

    /// True while any turn of the active session is streaming.
    pub fn is_streaming(&self) -> bool {
        self.statuses.contains(&TurnStatus::Streaming)
    }

    /// True while the referenced turn is streaming.
    pub fn is_turn_streaming(&self, turn: TurnRef) -> bool {
        self.status(turn) == Some(&TurnStatus::Streaming)
    }

    /// Append a new turn for `prompt` with an empty response.
    ///
    /// Other turns that are still streaming are unaffected; each keeps
    /// receiving text through its own reference.
    pub fn start_turn(&mut self, prompt: impl Into<String>) -> TurnRef {
        self.turns.push(Turn::new(prompt));
        self.statuses.push(TurnStatus::Streaming);
        TurnRef {
            generation: self.generation,
            index: self.turns.len() - 1,
        }
    }

    /// Append `text` to the response of `turn`.
    ///
    /// Returns false, without touching any state, when the reference belongs
    /// to a session that is no longer loaded.
    pub fn append_to_turn(&mut self, turn: TurnRef, text: &str) -> bool {
        match self.resolve(turn) {
            Some(index) => {
                self.turns[index].response.push_str(text);
                true
            }
            None => {
                STORE_APPENDS_DROPPED.click();
                false
            }
        }
    }

    /// Clear the streaming flag of `turn`.  The text is left as is.
    pub fn finish_turn(&mut self, turn: TurnRef) -> bool {
        self.settle(turn, TurnStatus::Complete)
    }

    /// Clear the streaming flag of `turn` and remember why it failed.
    pub fn fail_turn(&mut self, turn: TurnRef, message: impl Into<String>) -> bool {
        self.settle(turn, TurnStatus::Failed(message.into()))
    }

    /// Clear the streaming flag of `turn` after a user cancellation.
    pub fn abort_turn(&mut self, turn: TurnRef) -> bool {
        self.settle(turn, TurnStatus::Aborted)
    }

    /// Route a stream event to the matching operation.
    pub fn apply(&mut self, turn: TurnRef, event: &StreamEvent) -> bool {
        match event {
            StreamEvent::Content { text, .. } => self.append_to_turn(turn, text),
            StreamEvent::Done { .. } => self.finish_turn(turn),
            StreamEvent::Error { message } => self.fail_turn(turn, message.as_str()),
        }
    }

    /// Replace the active conversation with a freshly loaded one.
    ///
    /// References issued before the switch stop resolving, even when `id` is
    /// the session that was already active.
    pub fn switch_session(&mut self, id: SessionId, turns: Vec<Turn>) {
        self.generation += 1;
        self.statuses = vec![TurnStatus::Complete; turns.len()];
        self.turns = turns;
        self.session = Some(id);
    }

    fn resolve(&self, turn: TurnRef) -> Option<usize> {
        if turn.generation == self.generation && turn.index < self.turns.len() {
            Some(turn.index)
        } else {
            None
        }
    }

    fn settle(&mut self, turn: TurnRef, status: TurnStatus) -> bool {
        let Some(index) = self.resolve(turn) else {
            return false;
        };
        if self.statuses[index] == TurnStatus::Streaming {
            self.statuses[index] = status;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded(id: &str, turns: &[(&str, &str)]) -> SessionMessageStore {
        let mut store = SessionMessageStore::new();
        store.switch_session(
            SessionId::new(id),
            turns
                .iter()
                .map(|(prompt, response)| Turn::with_response(*prompt, *response))
                .collect(),
        );
        store
    }

    #[test]
    fn start_turn_appends_empty_response() {
        let mut store = loaded("s1", &[("earlier", "answer")]);
        let turn = store.start_turn("Who are you?");

        assert_eq!(turn.index(), 1);
        assert_eq!(store.turns().len(), 2);
        assert_eq!(store.turn(turn).unwrap().prompt, "Who are you?");
        assert_eq!(store.turn(turn).unwrap().response, "");
        assert!(store.is_streaming());
        assert!(store.is_turn_streaming(turn));
    }

    #[test]
    fn appends_concatenate_in_call_order() {
        let mut store = SessionMessageStore::new();
        let turn = store.start_turn("greet");
        for chunk in ["Hel", "lo", ", ", "w\u{f6}rld", "!"] {
            assert!(store.append_to_turn(turn, chunk));
        }
        assert_eq!(store.turn(turn).unwrap().response, "Hello, w\u{f6}rld!");
    }

    #[test]
    fn finish_clears_streaming_without_touching_text() {
        let mut store = SessionMessageStore::new();
        let turn = store.start_turn("q");
        store.append_to_turn(turn, "partial");
        assert!(store.finish_turn(turn));

        assert!(!store.is_streaming());
        assert_eq!(store.status(turn), Some(&TurnStatus::Complete));
        assert_eq!(store.turn(turn).unwrap().response, "partial");
    }

    #[test]
    fn failure_is_recorded_for_display() {
        let mut store = SessionMessageStore::new();
        let turn = store.start_turn("q");
        store.apply(turn, &StreamEvent::error("upstream timeout"));

        assert!(!store.is_streaming());
        assert_eq!(
            store.status(turn),
            Some(&TurnStatus::Failed("upstream timeout".to_string()))
        );
    }

    #[test]
    fn terminal_status_is_sticky() {
        let mut store = SessionMessageStore::new();
        let turn = store.start_turn("q");
        store.abort_turn(turn);
        store.apply(turn, &StreamEvent::done());
        assert_eq!(store.status(turn), Some(&TurnStatus::Aborted));
    }

    #[test]
    fn concurrent_turns_are_independent() {
        let mut store = SessionMessageStore::new();
        let first = store.start_turn("one");
        let second = store.start_turn("two");

        store.append_to_turn(first, "a");
        store.append_to_turn(second, "x");
        store.append_to_turn(first, "b");
        store.finish_turn(second);
        store.append_to_turn(first, "c");

        assert_eq!(store.turn(first).unwrap().response, "abc");
        assert_eq!(store.turn(second).unwrap().response, "x");
        assert!(store.is_streaming());
        assert!(store.is_turn_streaming(first));
        assert!(!store.is_turn_streaming(second));
    }

    #[test]
    fn switching_sessions_orphans_old_refs() {
        let mut store = loaded("old", &[]);
        let orphan = store.start_turn("still streaming");
        store.append_to_turn(orphan, "before");

        let reloaded = vec![
            Turn::with_response("hi", "hello"),
            Turn::with_response("and?", "that's all"),
        ];
        store.switch_session(SessionId::new("new"), reloaded.clone());

        assert!(!store.append_to_turn(orphan, " after"));
        assert!(!store.finish_turn(orphan));
        assert!(!store.apply(orphan, &StreamEvent::content("more")));
        assert!(store.turn(orphan).is_none());
        assert_eq!(store.turns(), reloaded.as_slice());
        assert_eq!(store.session_id(), Some(&SessionId::new("new")));
        assert!(!store.is_streaming());
    }

    #[test]
    fn reloading_the_same_session_also_orphans_refs() {
        let mut store = loaded("s", &[]);
        let orphan = store.start_turn("q");
        store.switch_session(SessionId::new("s"), vec![Turn::with_response("q", "full")]);

        // Index 0 exists again, but belongs to the new load.
        assert!(!store.append_to_turn(orphan, "dup"));
        assert_eq!(store.turns()[0].response, "full");
    }

    #[test]
    fn loaded_turns_are_complete() {
        let store = loaded("s", &[("a", "b")]);
        assert!(!store.is_streaming());
    }
}
