use serde::{Deserialize, Deserializer, Serialize};

/// Shown when an error frame carries no usable message.
pub const UNSPECIFIED_SERVER_ERROR: &str = "server reported an error";

/// A decoded event from a chat stream.
///
/// Events are delivered in wire order: any number of `Content` events,
/// followed by at most one terminal event (`Done` or `Error`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// A fragment of the assistant's response.
    #[serde(rename = "content")]
    Content {
        /// The text fragment to append.
        #[serde(rename = "content")]
        text: String,
        /// The model that produced the fragment, when the server reports it.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
    },

    /// The response finished successfully.
    #[serde(rename = "done")]
    Done {
        /// The model that produced the response, when the server reports it.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
    },

    /// The server gave up on the response.
    #[serde(rename = "error")]
    Error {
        /// The server's description of what went wrong.
        #[serde(
            rename = "error",
            default = "unspecified_server_error",
            deserialize_with = "error_message"
        )]
        message: String,
    },
}

impl StreamEvent {
    /// Create a content event with no model attribution.
    pub fn content(text: impl Into<String>) -> Self {
        StreamEvent::Content {
            text: text.into(),
            model: None,
        }
    }

    /// Create a done event with no model attribution.
    pub fn done() -> Self {
        StreamEvent::Done { model: None }
    }

    /// Create an error event.
    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            message: message.into(),
        }
    }

    /// Returns true for `Done` and `Error`, after which nothing else is delivered.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Content { .. })
    }
}

fn unspecified_server_error() -> String {
    UNSPECIFIED_SERVER_ERROR.to_string()
}

// An error frame is terminal whatever its `error` field holds.
fn error_message<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(message)) => message,
        None | Some(serde_json::Value::Null) => unspecified_server_error(),
        Some(other) => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{from_str, json, to_value};

    #[test]
    fn content_deserialization() {
        let event: StreamEvent = from_str(r#"{"type":"content","content":"Hel"}"#).unwrap();
        assert_eq!(event, StreamEvent::content("Hel"));
        assert!(!event.is_terminal());
    }

    #[test]
    fn content_with_model_deserialization() {
        let event: StreamEvent =
            from_str(r#"{"type":"content","content":"x","model":"gpt-4o-mini"}"#).unwrap();
        assert_eq!(
            event,
            StreamEvent::Content {
                text: "x".to_string(),
                model: Some("gpt-4o-mini".to_string()),
            }
        );
    }

    #[test]
    fn done_and_error_are_terminal() {
        let done: StreamEvent = from_str(r#"{"type":"done"}"#).unwrap();
        assert_eq!(done, StreamEvent::done());
        assert!(done.is_terminal());

        let error: StreamEvent = from_str(r#"{"type":"error","error":"boom"}"#).unwrap();
        assert_eq!(error, StreamEvent::error("boom"));
        assert!(error.is_terminal());
    }

    #[test]
    fn error_without_a_message_is_still_terminal() {
        for raw in [
            r#"{"type":"error"}"#,
            r#"{"type":"error","error":null}"#,
        ] {
            let event: StreamEvent = from_str(raw).unwrap();
            assert_eq!(event, StreamEvent::error(UNSPECIFIED_SERVER_ERROR));
            assert!(event.is_terminal());
        }

        let event: StreamEvent = from_str(r#"{"type":"error","error":{"code":429}}"#).unwrap();
        assert_eq!(event, StreamEvent::error(r#"{"code":429}"#));
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(from_str::<StreamEvent>(r#"{"type":"ping"}"#).is_err());
        assert!(from_str::<StreamEvent>(r#"{"content":"no tag"}"#).is_err());
    }

    #[test]
    fn serialization_uses_wire_field_names() {
        let json = to_value(StreamEvent::content("hi")).unwrap();
        assert_eq!(json, json!({"type": "content", "content": "hi"}));
        let json = to_value(StreamEvent::error("bad")).unwrap();
        assert_eq!(json, json!({"type": "error", "error": "bad"}));
    }
}
