//! Database models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Severity of a standard item, copied onto alerts raised from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Criticality {
    Low,
    Medium,
    High,
    Critical,
}

impl Criticality {
    /// Whether a NOK answer at this level raises a maintenance alert.
    pub fn raises_alert(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

/// Recurrence class of a checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cadence {
    Daily,
    Weekly,
    Monthly,
}

impl Cadence {
    pub const ALL: [Cadence; 3] = [Cadence::Daily, Cadence::Weekly, Cadence::Monthly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cadence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DAILY" => Ok(Self::Daily),
            "WEEKLY" => Ok(Self::Weekly),
            "MONTHLY" => Ok(Self::Monthly),
            other => Err(format!("unknown cadence: {}", other)),
        }
    }
}

/// Operational slot of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Shift {
    Morning,
    Afternoon,
    Night,
}

impl Shift {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "MORNING",
            Self::Afternoon => "AFTERNOON",
            Self::Night => "NIGHT",
        }
    }
}

impl FromStr for Shift {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MORNING" => Ok(Self::Morning),
            "AFTERNOON" => Ok(Self::Afternoon),
            "NIGHT" => Ok(Self::Night),
            other => Err(format!("unknown shift: {}", other)),
        }
    }
}

/// Lifecycle state of a checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChecklistState {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl ChecklistState {
    /// Whether answers may still be recorded.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

/// Outcome of a single checklist item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Pending,
    Ok,
    Nok,
    Na,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Ok => "OK",
            Self::Nok => "NOK",
            Self::Na => "NA",
        }
    }
}

impl FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "OK" => Ok(Self::Ok),
            "NOK" => Ok(Self::Nok),
            "NA" | "N/A" => Ok(Self::Na),
            other => Err(format!("unknown item status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    Corrective,
    Preventive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertState {
    Active,
    Notified,
    Resolved,
}

impl AlertState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Notified => "NOTIFIED",
            Self::Resolved => "RESOLVED",
        }
    }
}

impl FromStr for AlertState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(Self::Active),
            "NOTIFIED" => Ok(Self::Notified),
            "RESOLVED" => Ok(Self::Resolved),
            other => Err(format!("unknown alert state: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatorStatus {
    Active,
    Inactive,
}

/// Operator permission bitfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct Permissions(pub i64);

impl Permissions {
    pub const CHECKLIST: i64 = 1;
    pub const FUEL: i64 = 1 << 1;
    pub const REPORT_ANOMALY: i64 = 1 << 2;
    pub const VIEW_REPORTS: i64 = 1 << 3;

    /// Everything a field operator gets by default.
    pub fn field_operator() -> Self {
        Self(Self::CHECKLIST | Self::FUEL | Self::REPORT_ANOMALY)
    }

    pub fn may_checklist(&self) -> bool {
        self.0 & Self::CHECKLIST != 0
    }

    pub fn may_fuel(&self) -> bool {
        self.0 & Self::FUEL != 0
    }

    pub fn may_report_anomaly(&self) -> bool {
        self.0 & Self::REPORT_ANOMALY != 0
    }

    pub fn may_view_reports(&self) -> bool {
        self.0 & Self::VIEW_REPORTS != 0
    }
}

/// An equipment type with its own standard checklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct EquipmentType {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created_at: String,
}

/// A reusable check item template attached to an equipment type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StandardItem {
    pub id: i64,
    pub type_id: i64,
    /// Presentation order within the type.
    pub ordinal: i64,
    pub text: String,
    pub description: String,
    pub criticality: Criticality,
    /// A NOK answer must carry an observation.
    pub requires_observation: bool,
    /// NA may be offered as an answer.
    pub allows_na: bool,
    pub active: bool,
}

/// Values for a new standard item.
#[derive(Debug, Clone)]
pub struct NewStandardItem {
    pub ordinal: i64,
    pub text: String,
    pub description: String,
    pub criticality: Criticality,
    pub requires_observation: bool,
    pub allows_na: bool,
}

impl NewStandardItem {
    pub fn new(ordinal: i64, text: impl Into<String>, criticality: Criticality) -> Self {
        Self {
            ordinal,
            text: text.into(),
            description: String::new(),
            criticality,
            requires_observation: true,
            allows_na: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn requires_observation(mut self, required: bool) -> Self {
        self.requires_observation = required;
        self
    }

    pub fn allows_na(mut self, allowed: bool) -> Self {
        self.allows_na = allowed;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Customer {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Site {
    pub id: i64,
    pub customer_id: i64,
    pub name: String,
}

/// A piece of equipment subject to NR12 inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Equipment {
    pub id: i64,
    /// Stable opaque addressing token, never reused.
    pub uuid: String,
    pub name: String,
    pub customer_id: Option<i64>,
    pub site_id: Option<i64>,
    pub type_id: Option<i64>,
    pub nr12_active: bool,
    /// Comma-separated cadence labels, e.g. `DAILY,WEEKLY`.
    pub cadences: String,
    pub hour_meter: f64,
    pub created_at: String,
}

impl Equipment {
    /// Parse the stored cadence set. Unknown labels are ignored.
    pub fn cadence_set(&self) -> Vec<Cadence> {
        let mut set: Vec<Cadence> = self
            .cadences
            .split(',')
            .filter_map(|label| label.parse().ok())
            .collect();
        set.sort();
        set.dedup();
        set
    }
}

/// Encode a cadence set for storage.
pub fn encode_cadences(cadences: &[Cadence]) -> String {
    let mut sorted = cadences.to_vec();
    sorted.sort();
    sorted.dedup();
    sorted
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// Values for new equipment.
#[derive(Debug, Clone)]
pub struct NewEquipment {
    pub name: String,
    pub customer_id: Option<i64>,
    pub site_id: Option<i64>,
    pub type_id: Option<i64>,
    pub nr12_active: bool,
    pub cadences: Vec<Cadence>,
    pub hour_meter: f64,
}

impl NewEquipment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            customer_id: None,
            site_id: None,
            type_id: None,
            nr12_active: false,
            cadences: Vec::new(),
            hour_meter: 0.0,
        }
    }

    /// Enrol the equipment in NR12 inspections.
    pub fn nr12(mut self, type_id: i64, cadences: &[Cadence]) -> Self {
        self.type_id = Some(type_id);
        self.nr12_active = true;
        self.cadences = cadences.to_vec();
        self
    }

    pub fn owned_by(mut self, customer_id: i64, site_id: Option<i64>) -> Self {
        self.customer_id = Some(customer_id);
        self.site_id = site_id;
        self
    }
}

/// A field operator who uses the bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Operator {
    pub id: i64,
    /// Short code `OPnnnn`.
    pub code: String,
    pub name: String,
    pub status: OperatorStatus,
    pub bot_active: bool,
    pub chat_id: Option<i64>,
    pub last_access: Option<DateTime<Utc>>,
    pub permissions: Permissions,
}

impl Operator {
    /// Whether the operator may authenticate with the bot at all.
    pub fn can_use_bot(&self) -> bool {
        self.status == OperatorStatus::Active && self.bot_active
    }
}

/// A checklist instance for one equipment, date and shift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Checklist {
    pub id: i64,
    /// External addressing token.
    pub uuid: String,
    pub equipment_id: i64,
    pub date: NaiveDate,
    pub shift: Shift,
    pub cadence: Cadence,
    pub responsible_operator_id: Option<i64>,
    pub state: ChecklistState,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub needs_maintenance: bool,
    pub notes: String,
    pub hour_meter_start: Option<f64>,
    pub hour_meter_end: Option<f64>,
    pub created_at: String,
}

/// An item of a checklist, snapshotted from its standard item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ChecklistItem {
    pub id: i64,
    pub checklist_id: i64,
    pub standard_item_id: i64,
    pub ordinal: i64,
    pub text: String,
    pub description: String,
    pub criticality: Criticality,
    pub requires_observation: bool,
    pub allows_na: bool,
    pub status: ItemStatus,
    pub observation: String,
    pub verified_by: Option<i64>,
    pub verified_at: Option<DateTime<Utc>>,
}

/// A maintenance alert raised from a checklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MaintenanceAlert {
    pub id: i64,
    pub equipment_id: i64,
    pub kind: AlertKind,
    pub title: String,
    pub description: String,
    pub criticality: Criticality,
    pub standard_item_id: Option<i64>,
    pub scheduled_for: NaiveDate,
    pub state: AlertState,
    /// Originating checklist; cleared if the checklist is deleted.
    pub checklist_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub notified_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl MaintenanceAlert {
    /// Days until the scheduled date (negative when overdue).
    pub fn days_remaining(&self, today: NaiveDate) -> i64 {
        (self.scheduled_for - today).num_days()
    }

    /// Due within three days.
    pub fn is_urgent(&self, today: NaiveDate) -> bool {
        self.days_remaining(today) <= 3
    }
}

/// Values for a new alert.
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub equipment_id: i64,
    pub kind: AlertKind,
    pub title: String,
    pub description: String,
    pub criticality: Criticality,
    pub standard_item_id: Option<i64>,
    pub scheduled_for: NaiveDate,
    pub checklist_id: Option<i64>,
}
