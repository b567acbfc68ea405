// Public modules
pub mod chat_request;
pub mod created_session;
pub mod session_id;
pub mod stream_event;
pub mod turn;

// Re-exports
pub use chat_request::ChatRequest;
pub use created_session::CreatedSession;
pub use session_id::SessionId;
pub use stream_event::StreamEvent;
pub use turn::Turn;
