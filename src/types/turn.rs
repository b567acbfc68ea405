use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One prompt/response pair within a session.
///
/// The backend stores turns as `{message, content}`; both that spelling and
/// `{prompt, response}` are accepted when deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// The user's message.  Never changes once the turn exists.
    #[serde(alias = "message")]
    pub prompt: String,

    /// The assistant's response, possibly still being streamed.
    #[serde(alias = "content", default)]
    pub response: String,

    /// When the backend recorded the turn.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::utils::time::option"
    )]
    pub created_at: Option<OffsetDateTime>,
}

impl Turn {
    /// Create a turn with an empty response, ready to be streamed into.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            response: String::new(),
            created_at: None,
        }
    }

    /// Create a completed turn.
    pub fn with_response(prompt: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            response: response.into(),
            created_at: None,
        }
    }
}
