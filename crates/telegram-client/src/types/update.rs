//! Update and message types received from the Bot API.

use bot_core::InboundEvent;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Envelope of every Bot API response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error_code: Option<i64>,
}

/// One incoming update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,

    #[serde(default)]
    pub message: Option<Message>,

    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

/// A chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,

    pub chat: Chat,

    /// Unix time in seconds.
    #[serde(default)]
    pub date: i64,

    #[serde(default)]
    pub from: Option<User>,

    #[serde(default)]
    pub text: Option<String>,

    #[serde(default)]
    pub caption: Option<String>,

    /// Available sizes of an attached photo, smallest first.
    #[serde(default)]
    pub photo: Option<Vec<PhotoSize>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,

    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    #[serde(default)]
    pub is_bot: bool,

    #[serde(default)]
    pub first_name: String,

    #[serde(default)]
    pub username: Option<String>,
}

/// An inline keyboard button press.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,

    pub from: User,

    /// The message carrying the keyboard, if still available.
    #[serde(default)]
    pub message: Option<Message>,

    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,

    #[serde(default)]
    pub width: u32,

    #[serde(default)]
    pub height: u32,
}

impl Message {
    /// Message time, or `fallback` when the date is missing or invalid.
    pub fn timestamp_or(&self, fallback: DateTime<Utc>) -> DateTime<Utc> {
        Utc.timestamp_opt(self.date, 0).single().filter(|_| self.date > 0).unwrap_or(fallback)
    }
}

impl Update {
    /// The chat the update belongs to.
    pub fn chat_id(&self) -> Option<i64> {
        if let Some(message) = &self.message {
            return Some(message.chat.id);
        }
        let callback = self.callback_query.as_ref()?;
        Some(
            callback
                .message
                .as_ref()
                .map(|m| m.chat.id)
                .unwrap_or(callback.from.id),
        )
    }

    /// Convert into a transport-agnostic event.
    ///
    /// Callbacks are stamped with `received_at`; messages carry their own
    /// date. Updates the engine has no use for (stickers, edits, etc.)
    /// yield `None`.
    pub fn to_inbound_event(&self, received_at: DateTime<Utc>) -> Option<InboundEvent> {
        let chat_id = self.chat_id()?;

        if let Some(callback) = &self.callback_query {
            let data = callback.data.as_deref()?;
            return Some(InboundEvent::callback(chat_id, data, received_at));
        }

        let message = self.message.as_ref()?;
        let timestamp = message.timestamp_or(received_at);

        if message.photo.as_ref().is_some_and(|sizes| !sizes.is_empty()) {
            let caption = message.caption.clone().unwrap_or_default();
            return Some(InboundEvent::photo(chat_id, caption, timestamp));
        }

        let text = message.text.as_deref()?;
        Some(InboundEvent::text(chat_id, text, timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bot_core::EventKind;
    use serde::de::DeserializeOwned;

    #[derive(Debug, Deserialize)]
    struct Sent {
        message_id: i64,
    }

    fn decode<R: DeserializeOwned>(json: &str) -> ApiResponse<R> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_envelope_decodes_result_without_default() {
        let ok: ApiResponse<Sent> = decode(r#"{"ok": true, "result": {"message_id": 7}}"#);
        assert_eq!(ok.result.map(|s| s.message_id), Some(7));

        let failed: ApiResponse<Sent> =
            decode(r#"{"ok": false, "error_code": 400, "description": "Bad Request"}"#);
        assert!(!failed.ok);
        assert!(failed.result.is_none());
        assert_eq!(failed.error_code, Some(400));
    }

    #[test]
    fn test_text_update_to_event() {
        let json = r#"{
            "update_id": 10,
            "message": {
                "message_id": 1,
                "date": 1735732800,
                "chat": {"id": 555, "type": "private"},
                "from": {"id": 555, "is_bot": false, "first_name": "Ana"},
                "text": "/start opOP0001"
            }
        }"#;
        let update: Update = serde_json::from_str(json).unwrap();
        let event = update.to_inbound_event(Utc::now()).unwrap();

        assert_eq!(event.chat_id, 555);
        assert_eq!(event.kind, EventKind::Text);
        assert_eq!(event.payload, "/start opOP0001");
        assert_eq!(event.timestamp.timestamp(), 1735732800);
    }

    #[test]
    fn test_callback_update_to_event() {
        let json = r#"{
            "update_id": 11,
            "callback_query": {
                "id": "abc",
                "from": {"id": 555, "first_name": "Ana"},
                "message": {"message_id": 2, "date": 1, "chat": {"id": 777, "type": "private"}},
                "data": "ans:3:OK"
            }
        }"#;
        let update: Update = serde_json::from_str(json).unwrap();
        let now = Utc::now();
        let event = update.to_inbound_event(now).unwrap();

        assert_eq!(event.chat_id, 777);
        assert_eq!(event.kind, EventKind::Callback);
        assert_eq!(event.payload, "ans:3:OK");
        assert_eq!(event.timestamp, now);
    }

    #[test]
    fn test_photo_caption_becomes_payload() {
        let json = r#"{
            "update_id": 12,
            "message": {
                "message_id": 3,
                "date": 1735732800,
                "chat": {"id": 9, "type": "private"},
                "photo": [{"file_id": "x", "width": 90, "height": 90}],
                "caption": "vazamento no cilindro"
            }
        }"#;
        let update: Update = serde_json::from_str(json).unwrap();
        let event = update.to_inbound_event(Utc::now()).unwrap();

        assert_eq!(event.kind, EventKind::Photo);
        assert_eq!(event.payload, "vazamento no cilindro");
    }

    #[test]
    fn test_unsupported_update_is_skipped() {
        let json = r#"{"update_id": 13, "message": {"message_id": 4, "chat": {"id": 9}}}"#;
        let update: Update = serde_json::from_str(json).unwrap();
        assert!(update.to_inbound_event(Utc::now()).is_none());
    }
}
