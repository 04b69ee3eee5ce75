//! Authoring-boundary validation
//!
//! Everything submitted through the UI surfaces passes through here before
//! it becomes a `PolicyRecord`. The rule engine assumes records are
//! well-formed and performs no defensive checks of its own.

use thiserror::Error;
use warden_util::{parse_day_tokens, BlockWindow, WallClock};

use crate::PolicyDraft;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("URL pattern cannot be empty")]
    EmptyPattern,

    #[error("Invalid time '{value}': {message}")]
    InvalidTimeFormat { value: String, message: String },

    #[error("Invalid day specification: {0}")]
    InvalidDaySpec(String),

    #[error("At least one active day is required")]
    NoDaysSelected,

    #[error("Start time {start} must be before end time {end}")]
    StartNotBeforeEnd { start: String, end: String },
}

/// Validate a draft, producing the pattern and window for a new record.
pub fn validate_draft(draft: &PolicyDraft) -> Result<(String, BlockWindow), ValidationError> {
    let pattern = draft.pattern.trim();
    if pattern.is_empty() {
        return Err(ValidationError::EmptyPattern);
    }

    let window = validate_window(&draft.start, &draft.end, &draft.days)?;

    Ok((pattern.to_string(), window))
}

/// Validate the window fields shared by add/update/import.
pub fn validate_window(
    start: &str,
    end: &str,
    days: &str,
) -> Result<BlockWindow, ValidationError> {
    let start_clock = parse_clock(start)?;
    let end_clock = parse_clock(end)?;

    // No overnight-spanning windows
    if start_clock >= end_clock {
        return Err(ValidationError::StartNotBeforeEnd {
            start: start.to_string(),
            end: end.to_string(),
        });
    }

    let days = parse_day_tokens(days).map_err(ValidationError::InvalidDaySpec)?;
    if days.is_empty() {
        return Err(ValidationError::NoDaysSelected);
    }

    Ok(BlockWindow::new(days, start_clock, end_clock))
}

fn parse_clock(s: &str) -> Result<WallClock, ValidationError> {
    WallClock::parse(s).map_err(|message| ValidationError::InvalidTimeFormat {
        value: s.to_string(),
        message,
    })
}
