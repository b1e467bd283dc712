//! Inbound chat events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of interaction produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Typed text, including commands and deep-link `/start` payloads.
    Text,
    /// An inline button press; the payload is the button data.
    Callback,
    /// A photo; the payload is its caption.
    Photo,
}

/// One event from one chat, in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub chat_id: i64,
    pub kind: EventKind,
    pub payload: String,
    pub timestamp: DateTime<Utc>,
}

/// A slash command split into name and argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command<'a> {
    /// Lowercased name without the slash or bot mention.
    pub name: String,
    /// Remaining text, trimmed. Empty when absent.
    pub arg: &'a str,
}

impl InboundEvent {
    pub fn text(chat_id: i64, payload: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            chat_id,
            kind: EventKind::Text,
            payload: payload.into(),
            timestamp,
        }
    }

    pub fn callback(chat_id: i64, data: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            chat_id,
            kind: EventKind::Callback,
            payload: data.into(),
            timestamp,
        }
    }

    pub fn photo(chat_id: i64, caption: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            chat_id,
            kind: EventKind::Photo,
            payload: caption.into(),
            timestamp,
        }
    }

    /// Parse a text event as `/name[@bot] [arg]`.
    pub fn command(&self) -> Option<Command<'_>> {
        if self.kind != EventKind::Text {
            return None;
        }
        let text = self.payload.trim();
        let rest = text.strip_prefix('/')?;
        let (head, arg) = match rest.find(char::is_whitespace) {
            Some(idx) => (&rest[..idx], rest[idx..].trim()),
            None => (rest, ""),
        };
        let name = head.split('@').next().unwrap_or(head).to_lowercase();
        if name.is_empty() {
            return None;
        }
        Some(Command { name, arg })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parsing() {
        let now = Utc::now();
        let start = InboundEvent::text(1, "/start eq6f1c2a9e-0000-4000-8000-000000000001", now);
        let cmd = start.command().unwrap();
        assert_eq!(cmd.name, "start");
        assert_eq!(cmd.arg, "eq6f1c2a9e-0000-4000-8000-000000000001");

        let mention = InboundEvent::text(1, "/Status@nr12_bot", now);
        let cmd = mention.command().unwrap();
        assert_eq!(cmd.name, "status");
        assert_eq!(cmd.arg, "");

        assert!(InboundEvent::text(1, "OK", now).command().is_none());
        assert!(InboundEvent::text(1, "/", now).command().is_none());
        assert!(InboundEvent::callback(1, "/start", now).command().is_none());
    }

    #[test]
    fn test_event_kind_serialization() {
        let json = serde_json::to_string(&EventKind::Callback).unwrap();
        assert_eq!(json, "\"callback\"");
    }
}
