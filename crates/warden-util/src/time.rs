//! Time types for wardend
//!
//! Block policies are expressed in local wall-clock terms: a daily
//! `[start, end]` window plus a set of active weekdays. Everything here is
//! timezone-naive on purpose; the service evaluates policies against
//! `DateTime<Local>` only.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `WARDEN_MOCK_TIME` environment variable overrides
//! the system time for all window evaluation, which makes it possible to
//! exercise time-of-day behavior without waiting for the clock.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2026-03-04 14:30:00`)

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, TimeZone, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "WARDEN_MOCK_TIME";

/// Offset between mock time and real time, captured once at first use so
/// that mock time advances at the normal rate.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

fn mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            if let Ok(mock) = std::env::var(MOCK_TIME_ENV_VAR) {
                match NaiveDateTime::parse_from_str(&mock, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .and_then(|naive| Local.from_local_datetime(&naive).single())
                {
                    Some(mock_dt) => {
                        let offset = mock_dt.signed_duration_since(chrono::Local::now());
                        tracing::info!(
                            mock_time = %mock,
                            offset_secs = offset.num_seconds(),
                            "Mock time enabled"
                        );
                        return Some(offset);
                    }
                    None => {
                        tracing::warn!(
                            mock_time = %mock,
                            expected_format = "%Y-%m-%d %H:%M:%S",
                            "Invalid mock time, using real time"
                        );
                    }
                }
            }
            None
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Get the current local time, respecting mock time in debug builds.
pub fn now() -> DateTime<Local> {
    let real_now = chrono::Local::now();

    match mock_time_offset() {
        Some(offset) => real_now + offset,
        None => real_now,
    }
}

/// A wall-clock minute of day (hours and minutes, no seconds).
///
/// Window bounds compare by minute; a window ending at `17:00` still
/// matches at 17:00:59.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallClock {
    pub hour: u8,
    pub minute: u8,
}

impl WallClock {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self { hour, minute })
        } else {
            None
        }
    }

    /// Parse `HH:MM` (24-hour, zero-padded or not).
    pub fn parse(s: &str) -> Result<Self, String> {
        let (h, m) = s
            .split_once(':')
            .ok_or_else(|| "expected HH:MM format".to_string())?;

        let hour: u8 = h.parse().map_err(|_| "invalid hour".to_string())?;
        let minute: u8 = m.parse().map_err(|_| "invalid minute".to_string())?;

        Self::new(hour, minute).ok_or_else(|| "hour must be 0-23, minute 0-59".to_string())
    }

    pub fn from_datetime(dt: &DateTime<Local>) -> Self {
        Self {
            hour: dt.time().hour() as u8,
            minute: dt.time().minute() as u8,
        }
    }

    pub fn to_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour as u32, self.minute as u32, 0).unwrap()
    }

    fn minutes_from_midnight(&self) -> u32 {
        (self.hour as u32) * 60 + self.minute as u32
    }
}

impl fmt::Display for WallClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl PartialOrd for WallClock {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WallClock {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.minutes_from_midnight()
            .cmp(&other.minutes_from_midnight())
    }
}

/// Canonical weekday tokens, Sunday first, as the authoring surfaces use them.
pub const DAY_TOKENS: [&str; 7] = ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"];

/// Days of the week as a 7-bit mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DaysOfWeek(u8);

impl DaysOfWeek {
    pub const MONDAY: u8 = 1 << 0;
    pub const TUESDAY: u8 = 1 << 1;
    pub const WEDNESDAY: u8 = 1 << 2;
    pub const THURSDAY: u8 = 1 << 3;
    pub const FRIDAY: u8 = 1 << 4;
    pub const SATURDAY: u8 = 1 << 5;
    pub const SUNDAY: u8 = 1 << 6;

    pub const WEEKDAYS: DaysOfWeek = DaysOfWeek(
        Self::MONDAY | Self::TUESDAY | Self::WEDNESDAY | Self::THURSDAY | Self::FRIDAY,
    );
    pub const WEEKENDS: DaysOfWeek = DaysOfWeek(Self::SATURDAY | Self::SUNDAY);
    pub const ALL_DAYS: DaysOfWeek = DaysOfWeek(0x7F);
    pub const NONE: DaysOfWeek = DaysOfWeek(0);

    pub fn new(mask: u8) -> Self {
        Self(mask & 0x7F)
    }

    fn bit(weekday: Weekday) -> u8 {
        match weekday {
            Weekday::Mon => Self::MONDAY,
            Weekday::Tue => Self::TUESDAY,
            Weekday::Wed => Self::WEDNESDAY,
            Weekday::Thu => Self::THURSDAY,
            Weekday::Fri => Self::FRIDAY,
            Weekday::Sat => Self::SATURDAY,
            Weekday::Sun => Self::SUNDAY,
        }
    }

    pub fn contains(&self, weekday: Weekday) -> bool {
        (self.0 & Self::bit(weekday)) != 0
    }

    pub fn with(self, weekday: Weekday) -> Self {
        Self(self.0 | Self::bit(weekday))
    }

    /// An empty set means "never active".
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for DaysOfWeek {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Parse a comma-separated list of canonical day tokens (`"Mo,Tu,We"`).
///
/// Tokens are trimmed and matched case-insensitively; duplicates collapse.
/// The empty string parses to the empty set.
pub fn parse_day_tokens(s: &str) -> Result<DaysOfWeek, String> {
    let mut days = DaysOfWeek::NONE;

    for token in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let weekday = match token.to_ascii_lowercase().as_str() {
            "su" => Weekday::Sun,
            "mo" => Weekday::Mon,
            "tu" => Weekday::Tue,
            "we" => Weekday::Wed,
            "th" => Weekday::Thu,
            "fr" => Weekday::Fri,
            "sa" => Weekday::Sat,
            other => return Err(format!("unknown day token: {}", other)),
        };
        days = days.with(weekday);
    }

    Ok(days)
}

/// Format a day set back to the canonical comma-separated token form,
/// Sunday first.
pub fn format_day_tokens(days: DaysOfWeek) -> String {
    const ORDER: [Weekday; 7] = [
        Weekday::Sun,
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
    ];

    let mut tokens = Vec::new();
    for (idx, weekday) in ORDER.iter().enumerate() {
        if days.contains(*weekday) {
            tokens.push(DAY_TOKENS[idx]);
        }
    }
    tokens.join(",")
}

/// A daily block window: active on `days`, between `start` and `end`.
///
/// Both bounds are inclusive. Windows never span midnight; the authoring
/// boundary rejects `start >= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockWindow {
    pub days: DaysOfWeek,
    pub start: WallClock,
    pub end: WallClock,
}

impl BlockWindow {
    pub fn new(days: DaysOfWeek, start: WallClock, end: WallClock) -> Self {
        Self { days, start, end }
    }

    /// Check whether the given local instant falls inside this window.
    pub fn contains(&self, dt: &DateTime<Local>) -> bool {
        if !self.days.contains(chrono::Datelike::weekday(dt)) {
            return false;
        }

        let time = WallClock::from_datetime(dt);
        self.start <= time && time <= self.end
    }
}
