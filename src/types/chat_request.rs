use serde::{Deserialize, Serialize};

/// Request body for opening a chat stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's message.
    pub message: String,
}

impl ChatRequest {
    /// Create a new request for the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn chat_request_serialization() {
        let request = ChatRequest::new("Tell me about yourself");
        assert_eq!(
            to_value(&request).unwrap(),
            json!({"message": "Tell me about yourself"})
        );
    }
}
