use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::SessionId;

/// The backend's answer to a session creation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedSession {
    /// The newly issued identifier.
    pub id: SessionId,

    /// When the backend created the session.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::utils::time::option"
    )]
    pub created_at: Option<OffsetDateTime>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn created_session_deserialization() {
        let created: CreatedSession = serde_json::from_value(json!({
            "id": "0b5e3a7c-25d4-4b8e-9d8f-3c1f0f6f1a11",
            "created_at": "2025-03-01T12:30:00.123456Z"
        }))
        .unwrap();
        assert_eq!(created.id.as_str(), "0b5e3a7c-25d4-4b8e-9d8f-3c1f0f6f1a11");
        assert!(created.created_at.is_some());
    }

    #[test]
    fn created_at_is_optional() {
        let created: CreatedSession = serde_json::from_value(json!({"id": "s1"})).unwrap();
        assert_eq!(created.id, SessionId::new("s1"));
        assert!(created.created_at.is_none());
    }
}
