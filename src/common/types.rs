use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

/// One chat message as delivered by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: i64,
    pub user: String,
    pub content: String,
}

/// Unsent input typed by the local operator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub user: String,
    pub content: String,
}

impl Draft {
    pub fn is_sendable(&self) -> bool {
        !self.content.is_empty() && !self.user.is_empty()
    }
}

/// Lifecycle of the subscription connection, observable from the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Reconnecting { attempt: u32, retry_in: Duration },
    Failed { attempts: u32 },
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "Connecting..."),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Reconnecting { attempt, retry_in } => write!(
                f,
                "Reconnecting (attempt {attempt}, retry in {:.1}s)",
                retry_in.as_secs_f64()
            ),
            ConnectionState::Failed { attempts } => {
                write!(f, "Disconnected after {attempts} attempts")
            }
        }
    }
}

// GraphQL `ID` values may arrive as numbers or as numeric strings.
fn deserialize_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(id) => Ok(id),
        RawId::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_accepts_numeric_and_string_ids() {
        let numeric: Message =
            serde_json::from_str(r#"{"id": 7, "user": "Ann", "content": "hi"}"#).unwrap();
        let text: Message =
            serde_json::from_str(r#"{"id": "7", "user": "Ann", "content": "hi"}"#).unwrap();
        assert_eq!(numeric, text);
        assert_eq!(numeric.id, 7);
    }

    #[test]
    fn message_rejects_non_numeric_id() {
        let result = serde_json::from_str::<Message>(r#"{"id": "abc", "user": "A", "content": "b"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn draft_needs_both_fields_to_be_sendable() {
        let cases = [("", "", false), ("Ann", "", false), ("", "hi", false), ("Ann", "hi", true)];
        for (user, content, expected) in cases {
            let draft = Draft {
                user: user.to_string(),
                content: content.to_string(),
            };
            assert_eq!(draft.is_sendable(), expected, "user={user:?} content={content:?}");
        }
    }

    #[test]
    fn connection_state_labels() {
        let reconnecting = ConnectionState::Reconnecting {
            attempt: 2,
            retry_in: Duration::from_millis(1500),
        };
        assert_eq!(reconnecting.to_string(), "Reconnecting (attempt 2, retry in 1.5s)");
        assert_eq!(ConnectionState::Connected.to_string(), "Connected");
    }
}
