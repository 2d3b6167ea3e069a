use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who authored a message in the conversation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Identifier of a message, unique within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ConversationMessage {
    pub fn new(id: MessageId, role: Role, content: impl Into<String>) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// A message is well-formed when it carries some non-whitespace text.
    pub fn is_well_formed(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

/// Hands out message ids in creation order.
#[derive(Debug, Default)]
pub(crate) struct MessageIds {
    next: u64,
}

impl MessageIds {
    pub(crate) fn next(&mut self) -> MessageId {
        let id = MessageId(self.next);
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serializes_with_wire_field_names() {
        let message = ConversationMessage::new(MessageId(7), Role::Assistant, "Hola");
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["id"], 7);
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"], "Hola");
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn test_blank_message_is_not_well_formed() {
        let message = ConversationMessage::new(MessageId(0), Role::User, "   \n");
        assert!(!message.is_well_formed());
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut ids = MessageIds::default();
        let first = ids.next();
        let second = ids.next();
        assert!(second > first);
    }
}
