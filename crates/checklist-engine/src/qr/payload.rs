//! QR payload encoding and the single payload parser.

use std::fmt;
use std::path::{Path, PathBuf};

use database::validation::is_operator_code;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{EngineError, Result};

/// What a QR code addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QrKind {
    Operator,
    Equipment,
    Checklist,
}

impl QrKind {
    /// Directory name under `qr_codes/`.
    pub fn dir(&self) -> &'static str {
        match self {
            Self::Operator => "operator",
            Self::Equipment => "equipment",
            Self::Checklist => "checklist",
        }
    }

    /// File name prefix.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Operator => "op",
            Self::Equipment => "eq",
            Self::Checklist => "chk",
        }
    }
}

/// Rendered image size. The value is the box size in pixels per module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QrSize {
    Small,
    Medium,
    Large,
}

impl QrSize {
    pub const ALL: [QrSize; 3] = [QrSize::Small, QrSize::Medium, QrSize::Large];

    pub fn box_size(&self) -> u32 {
        match self {
            Self::Small => 5,
            Self::Medium => 8,
            Self::Large => 12,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

impl fmt::Display for QrSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deterministic image location: `<root>/qr_codes/<kind>/<prefix>_<id>_<size>.png`.
pub fn image_path(root: &Path, kind: QrKind, id: &str, size: QrSize) -> PathBuf {
    root.join("qr_codes")
        .join(kind.dir())
        .join(format!("{}_{}_{}.png", kind.prefix(), id, size))
}

/// Deep link that logs an operator in.
pub fn operator_payload(deep_link_base: &str, code: &str) -> String {
    format!("{}?start=op{}", deep_link_base, code.to_ascii_uppercase())
}

/// Deep link that opens the equipment view.
pub fn equipment_payload(deep_link_base: &str, uuid: &str) -> String {
    format!("{}?start=eq{}", deep_link_base, uuid)
}

/// Web URL of a checklist instance.
pub fn checklist_payload(web_base_url: &str, uuid: &str) -> String {
    format!("{}/chk/{}", web_base_url, uuid)
}

/// A parsed QR or deep-link payload, before any store lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedPayload {
    /// Upper-cased `OPnnnn` code.
    OperatorCode(String),
    /// Lower-cased hyphenated UUID, with the kind implied by the URL if any.
    Uuid { uuid: String, hint: Option<QrKind> },
    /// Numeric equipment id from legacy printed codes.
    LegacyId(i64),
}

const PATH_MARKERS: [(&str, QrKind); 3] = [
    ("/bot/op/", QrKind::Operator),
    ("/eq/", QrKind::Equipment),
    ("/chk/", QrKind::Checklist),
];

const PREFIXES: [(&str, QrKind); 6] = [
    ("op_", QrKind::Operator),
    ("op", QrKind::Operator),
    ("chk_", QrKind::Checklist),
    ("chk", QrKind::Checklist),
    ("eq_", QrKind::Equipment),
    ("eq", QrKind::Equipment),
];

/// Parse any accepted payload form.
///
/// Accepts full URLs (`…/bot/op/<CODE>`, `…/eq/<UUID>`, `…/chk/<UUID>`),
/// deep links (`…?start=op<CODE>`, `…?start=eq<UUID>`), bare codes, bare
/// UUIDs and bare digit strings.
pub fn parse_payload(raw: &str) -> Result<ParsedPayload> {
    let mut hint = None;
    let mut token = raw.trim();

    if let Some(idx) = token.find("?start=") {
        token = &token[idx + "?start=".len()..];
    } else {
        for (marker, kind) in PATH_MARKERS {
            if let Some(idx) = token.find(marker) {
                token = &token[idx + marker.len()..];
                hint = Some(kind);
                break;
            }
        }
    }

    let token = token
        .split(['?', '#', '&'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/')
        .trim();

    if token.is_empty() {
        return Err(EngineError::Input("empty QR payload".into()));
    }

    if is_operator_code(token) && matches!(hint, None | Some(QrKind::Operator)) {
        return Ok(ParsedPayload::OperatorCode(token.to_ascii_uppercase()));
    }

    let mut rest = token;
    for (prefix, kind) in PREFIXES {
        if hint.is_some() && hint != Some(kind) {
            continue;
        }
        if let Some(stripped) = strip_prefix_ci(rest, prefix) {
            rest = stripped;
            hint = Some(kind);
            break;
        }
    }

    if hint == Some(QrKind::Operator) {
        return if is_operator_code(rest) {
            Ok(ParsedPayload::OperatorCode(rest.to_ascii_uppercase()))
        } else {
            Err(EngineError::Input(format!("invalid operator code: {}", rest)))
        };
    }

    if rest.len() == 36 {
        if let Ok(uuid) = Uuid::parse_str(rest) {
            return Ok(ParsedPayload::Uuid {
                uuid: uuid.hyphenated().to_string(),
                hint,
            });
        }
    }

    if !rest.is_empty()
        && rest.chars().all(|c| c.is_ascii_digit())
        && matches!(hint, None | Some(QrKind::Equipment))
    {
        if let Ok(id) = rest.parse() {
            return Ok(ParsedPayload::LegacyId(id));
        }
    }

    Err(EngineError::Input(format!("unrecognized QR payload: {}", raw.trim())))
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        s.get(prefix.len()..)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UUID: &str = "3f2b8c1e-9d4a-4b7e-a1c2-5e6f7a8b9c0d";

    #[test]
    fn test_operator_forms() {
        let expected = ParsedPayload::OperatorCode("OP0001".into());
        assert_eq!(parse_payload(" op0001 ").unwrap(), expected);
        assert_eq!(parse_payload("https://t.me/mandacaru_bot?start=opOP0001").unwrap(), expected);
        assert_eq!(parse_payload("http://host/bot/op/OP0001/").unwrap(), expected);
        assert!(parse_payload("http://host/bot/op/XYZ").is_err());
    }

    #[test]
    fn test_equipment_and_checklist_forms() {
        assert_eq!(
            parse_payload(&format!("https://t.me/mandacaru_bot?start=eq{}", UUID)).unwrap(),
            ParsedPayload::Uuid { uuid: UUID.into(), hint: Some(QrKind::Equipment) }
        );
        assert_eq!(
            parse_payload(&format!("http://host/chk/{}", UUID.to_uppercase())).unwrap(),
            ParsedPayload::Uuid { uuid: UUID.into(), hint: Some(QrKind::Checklist) }
        );
        assert_eq!(
            parse_payload(&format!("eq_{}", UUID)).unwrap(),
            ParsedPayload::Uuid { uuid: UUID.into(), hint: Some(QrKind::Equipment) }
        );
        assert_eq!(
            parse_payload(UUID).unwrap(),
            ParsedPayload::Uuid { uuid: UUID.into(), hint: None }
        );
    }

    #[test]
    fn test_legacy_ids() {
        assert_eq!(parse_payload("42").unwrap(), ParsedPayload::LegacyId(42));
        assert_eq!(parse_payload("eq42").unwrap(), ParsedPayload::LegacyId(42));
        assert!(parse_payload("chk42").is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_payload("").is_err());
        assert!(parse_payload("hello there").is_err());
        assert!(parse_payload("3f2b8c1e9d4a4b7ea1c25e6f7a8b9c0d").is_err());
    }

    #[test]
    fn test_image_path_is_deterministic() {
        let root = Path::new("/srv/media");
        assert_eq!(
            image_path(root, QrKind::Equipment, "17", QrSize::Medium),
            PathBuf::from("/srv/media/qr_codes/equipment/eq_17_medium.png")
        );
        assert_eq!(
            image_path(root, QrKind::Operator, "OP0001", QrSize::Small),
            PathBuf::from("/srv/media/qr_codes/operator/op_OP0001_small.png")
        );
    }

    #[test]
    fn test_payload_urls() {
        assert_eq!(
            operator_payload("https://t.me/bot", "op0003"),
            "https://t.me/bot?start=opOP0003"
        );
        assert_eq!(checklist_payload("http://h", UUID), format!("http://h/chk/{}", UUID));
    }
}
