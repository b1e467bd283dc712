//! Outbound replies.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// An inline button: a label shown to the user and opaque callback data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub data: String,
}

impl Button {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// A reply to one chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundReply {
    Text {
        chat_id: i64,
        text: String,
        /// Keyboard rows; empty for no keyboard.
        buttons: Vec<Vec<Button>>,
    },
    Photo {
        chat_id: i64,
        path: PathBuf,
        caption: Option<String>,
    },
}

impl OutboundReply {
    pub fn text(chat_id: i64, text: impl Into<String>) -> Self {
        Self::Text {
            chat_id,
            text: text.into(),
            buttons: Vec::new(),
        }
    }

    pub fn photo(chat_id: i64, path: impl Into<PathBuf>, caption: Option<String>) -> Self {
        Self::Photo {
            chat_id,
            path: path.into(),
            caption,
        }
    }

    /// Append a keyboard row. No effect on photo replies.
    pub fn with_row(mut self, row: Vec<Button>) -> Self {
        if let Self::Text { buttons, .. } = &mut self {
            if !row.is_empty() {
                buttons.push(row);
            }
        }
        self
    }

    pub fn chat_id(&self) -> i64 {
        match self {
            Self::Text { chat_id, .. } | Self::Photo { chat_id, .. } => *chat_id,
        }
    }

    /// Text body, or the caption of a photo.
    pub fn body(&self) -> &str {
        match self {
            Self::Text { text, .. } => text,
            Self::Photo { caption, .. } => caption.as_deref().unwrap_or(""),
        }
    }

    /// All buttons, flattened in row order.
    pub fn buttons(&self) -> Vec<&Button> {
        match self {
            Self::Text { buttons, .. } => buttons.iter().flatten().collect(),
            Self::Photo { .. } => Vec::new(),
        }
    }
}
