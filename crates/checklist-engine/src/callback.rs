//! Inline-button callback data and free-text answers.

use database::ItemStatus;

/// Action carried by an inline button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// `eq:<equipment_id>`
    Equipment(i64),
    /// `create:<equipment_id>`
    Create(i64),
    /// `start:<checklist_uuid>`
    Start(String),
    /// `resume:<checklist_uuid>`
    Resume(String),
    /// `ans:<item_id>:<OK|NOK|NA>`
    Answer { item_id: i64, status: ItemStatus },
    Pause,
    /// `cancel:<checklist_uuid>`
    Cancel(String),
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        let data = data.trim();
        if data == "pause" {
            return Some(Self::Pause);
        }
        let (tag, rest) = data.split_once(':')?;
        match tag {
            "eq" => rest.parse().ok().map(Self::Equipment),
            "create" => rest.parse().ok().map(Self::Create),
            "start" if !rest.is_empty() => Some(Self::Start(rest.to_string())),
            "resume" if !rest.is_empty() => Some(Self::Resume(rest.to_string())),
            "cancel" if !rest.is_empty() => Some(Self::Cancel(rest.to_string())),
            "ans" => {
                let (id, status) = rest.split_once(':')?;
                let status = status.parse::<ItemStatus>().ok()?;
                if status == ItemStatus::Pending {
                    return None;
                }
                Some(Self::Answer {
                    item_id: id.parse().ok()?,
                    status,
                })
            }
            _ => None,
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Self::Equipment(id) => format!("eq:{}", id),
            Self::Create(id) => format!("create:{}", id),
            Self::Start(uuid) => format!("start:{}", uuid),
            Self::Resume(uuid) => format!("resume:{}", uuid),
            Self::Answer { item_id, status } => format!("ans:{}:{}", item_id, status.as_str()),
            Self::Pause => "pause".to_string(),
            Self::Cancel(uuid) => format!("cancel:{}", uuid),
        }
    }
}

/// Parse a typed answer: `OK`, `NA`, `N/A`, `NOK` or `NOK <observation>`.
///
/// Only `NOK` may carry trailing text, which becomes the observation.
pub fn parse_text_answer(text: &str) -> Option<(ItemStatus, String)> {
    let text = text.trim();
    let (head, rest) = match text.find(char::is_whitespace) {
        Some(idx) => (&text[..idx], text[idx..].trim()),
        None => (text, ""),
    };
    let status = match head.to_ascii_uppercase().trim_end_matches(['.', ',', ':']) {
        "OK" => ItemStatus::Ok,
        "NOK" => ItemStatus::Nok,
        "NA" | "N/A" => ItemStatus::Na,
        _ => return None,
    };
    if status != ItemStatus::Nok && !rest.is_empty() {
        return None;
    }
    Some((status, rest.to_string()))
}
