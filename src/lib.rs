// Public modules
pub mod backend;
pub mod chat;
pub mod client;
pub mod client_logger;
pub mod error;
pub mod observability;
pub mod render;
pub mod session_index;
pub mod sse;
pub mod store;
pub mod stream;
pub mod types;
pub mod utils;

// Re-exports
pub use backend::ChatBackend;
pub use client::Client;
pub use client_logger::ClientLogger;
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use render::{PlainTextRenderer, Renderer};
pub use session_index::{DurableSlot, FileSlot, MemorySlot, SessionIndex, SessionOrder};
pub use sse::{FrameCodec, process_frames};
pub use store::{SessionMessageStore, TurnRef, TurnStatus};
pub use stream::{
    Callbacks, EventStream, StreamHandler, StreamOutcome, StreamTask, stream_with_callbacks,
};
pub use types::*;
