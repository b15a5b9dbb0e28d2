use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
    Error,
}

impl Role {
    /// Sender label shown above a message.
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Agent => "Agent",
            Role::Error => "Error",
        }
    }
}

/// One entry of the conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    pub fn is_agent(&self) -> bool {
        self.role == Role::Agent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_labels() {
        assert_eq!(Role::User.label(), "You");
        assert_eq!(Role::Agent.label(), "Agent");
        assert_eq!(Role::Error.label(), "Error");
    }

    #[test]
    fn message_ids_are_unique() {
        let a = Message::new(Role::User, "a");
        let b = Message::new(Role::User, "a");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Agent).unwrap();
        assert_eq!(json, "\"agent\"");
    }
}
