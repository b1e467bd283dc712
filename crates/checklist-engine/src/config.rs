//! Engine configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use bot_core::parse_duration;
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc, Weekday};
use database::Shift;

/// Configuration shared by the scheduler, the bot engine and the web surface.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// SQLite URL for the checklist database.
    pub sqlite_url: String,
    /// Idle window before a chat session is evicted.
    pub session_idle_timeout: Duration,
    /// Weekday WEEKLY checklists are generated on.
    pub weekly_cadence_day: Weekday,
    /// Day of month MONTHLY checklists are generated on (clamped to month length).
    pub monthly_cadence_day: u32,
    /// Shift tag of scheduler- and bot-created checklists.
    pub default_shift: Shift,
    /// Filesystem root holding `qr_codes/`.
    pub qr_root: PathBuf,
    /// Bot deep-link base, e.g. `https://t.me/mandacaru_bot`.
    pub bot_deep_link_base: String,
    /// Web base URL embedded in checklist QR payloads.
    pub web_base_url: String,
    /// Duplicate-alert suppression window.
    pub alert_dedup_window: Duration,
    /// Offset that defines the operational "today".
    pub timezone_offset: FixedOffset,
    /// Tick of the scheduler daemon.
    pub scheduler_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sqlite_url: database::sqlite_url("./data/mandacaru.db"),
            session_idle_timeout: Duration::from_secs(24 * 3600),
            weekly_cadence_day: Weekday::Mon,
            monthly_cadence_day: 1,
            default_shift: Shift::Morning,
            qr_root: PathBuf::from("./media"),
            bot_deep_link_base: "https://t.me/mandacaru_bot".to_string(),
            web_base_url: "http://localhost:8000".to_string(),
            alert_dedup_window: Duration::from_secs(24 * 3600),
            timezone_offset: brasilia_offset(),
            scheduler_interval: Duration::from_secs(3600),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `SQLITE_PATH` | `./data/mandacaru.db` |
    /// | `SESSION_IDLE_TIMEOUT` | `24h` |
    /// | `WEEKLY_CADENCE_DAY` | `monday` |
    /// | `MONTHLY_CADENCE_DAY` | `1` |
    /// | `DEFAULT_SHIFT` | `MORNING` |
    /// | `QR_ROOT` | `./media` |
    /// | `BOT_DEEP_LINK_BASE` | `https://t.me/mandacaru_bot` |
    /// | `WEB_BASE_URL` | `http://localhost:8000` |
    /// | `ALERT_DEDUP_WINDOW` | `24h` |
    /// | `TIMEZONE_OFFSET` | `-03:00` |
    /// | `SCHEDULER_INTERVAL` | `1h` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = env::var("SQLITE_PATH") {
            config.sqlite_url = database::sqlite_url(&path);
        }
        if let Some(d) = duration_var("SESSION_IDLE_TIMEOUT")? {
            config.session_idle_timeout = d;
        }
        if let Ok(value) = env::var("WEEKLY_CADENCE_DAY") {
            config.weekly_cadence_day =
                parse_weekday(&value).ok_or_else(|| invalid("WEEKLY_CADENCE_DAY", &value))?;
        }
        if let Ok(value) = env::var("MONTHLY_CADENCE_DAY") {
            config.monthly_cadence_day = value
                .trim()
                .parse()
                .ok()
                .filter(|d| (1..=31).contains(d))
                .ok_or_else(|| invalid("MONTHLY_CADENCE_DAY", &value))?;
        }
        if let Ok(value) = env::var("DEFAULT_SHIFT") {
            config.default_shift = value.parse().map_err(|_| invalid("DEFAULT_SHIFT", &value))?;
        }
        if let Ok(value) = env::var("QR_ROOT") {
            config.qr_root = PathBuf::from(value);
        }
        if let Ok(value) = env::var("BOT_DEEP_LINK_BASE") {
            config.bot_deep_link_base = value.trim_end_matches('/').to_string();
        }
        if let Ok(value) = env::var("WEB_BASE_URL") {
            config.web_base_url = value.trim_end_matches('/').to_string();
        }
        if let Some(d) = duration_var("ALERT_DEDUP_WINDOW")? {
            config.alert_dedup_window = d;
        }
        if let Ok(value) = env::var("TIMEZONE_OFFSET") {
            config.timezone_offset =
                parse_offset(&value).ok_or_else(|| invalid("TIMEZONE_OFFSET", &value))?;
        }
        if let Some(d) = duration_var("SCHEDULER_INTERVAL")? {
            config.scheduler_interval = d;
        }

        Ok(config)
    }

    /// The operational date of an instant.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.timezone_offset).date_naive()
    }

    /// The dedup window as a chrono duration.
    pub fn dedup_window(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.alert_dedup_window).unwrap_or(chrono::Duration::hours(24))
    }

    /// The session timeout as a chrono duration.
    pub fn session_timeout(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.session_idle_timeout).unwrap_or(chrono::Duration::hours(24))
    }
}

fn brasilia_offset() -> FixedOffset {
    FixedOffset::west_opt(3 * 3600).unwrap_or(Utc.fix())
}

fn duration_var(name: &'static str) -> Result<Option<Duration>, ConfigError> {
    match env::var(name) {
        Ok(value) => parse_duration(&value)
            .map(Some)
            .ok_or_else(|| invalid(name, &value)),
        Err(_) => Ok(None),
    }
}

fn invalid(var: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
    }
}

/// Parse `monday`, `mon`, or ISO `1`..`7` (1 = Monday).
pub fn parse_weekday(value: &str) -> Option<Weekday> {
    let value = value.trim();
    if let Ok(n) = value.parse::<u32>() {
        return match n {
            1 => Some(Weekday::Mon),
            2 => Some(Weekday::Tue),
            3 => Some(Weekday::Wed),
            4 => Some(Weekday::Thu),
            5 => Some(Weekday::Fri),
            6 => Some(Weekday::Sat),
            7 => Some(Weekday::Sun),
            _ => None,
        };
    }
    value.parse::<Weekday>().ok()
}

/// Parse `-03:00`, `+0530` or `Z`.
pub fn parse_offset(value: &str) -> Option<FixedOffset> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value == "0" {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match value.as_bytes().first()? {
        b'+' => (1, &value[1..]),
        b'-' => (-1, &value[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_weekday_forms() {
        assert_eq!(parse_weekday("monday"), Some(Weekday::Mon));
        assert_eq!(parse_weekday("Fri"), Some(Weekday::Fri));
        assert_eq!(parse_weekday("7"), Some(Weekday::Sun));
        assert_eq!(parse_weekday("8"), None);
        assert_eq!(parse_weekday("someday"), None);
    }

    #[test]
    fn test_parse_offset_forms() {
        assert_eq!(parse_offset("-03:00"), FixedOffset::west_opt(3 * 3600));
        assert_eq!(parse_offset("+0530"), FixedOffset::east_opt(5 * 3600 + 30 * 60));
        assert_eq!(parse_offset("Z"), FixedOffset::east_opt(0));
        assert_eq!(parse_offset("03:00"), None);
        assert_eq!(parse_offset("-3"), None);
    }

    #[test]
    fn test_today_uses_offset() {
        let config = EngineConfig::default();
        // 02:00 UTC is still the previous day at -03:00
        let now = "2025-03-10T02:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(config.today(now), NaiveDate::from_ymd_opt(2025, 3, 9).unwrap());
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.weekly_cadence_day, Weekday::Mon);
        assert_eq!(config.monthly_cadence_day, 1);
        assert_eq!(config.default_shift, Shift::Morning);
        assert_eq!(config.session_timeout(), chrono::Duration::hours(24));
    }
}
