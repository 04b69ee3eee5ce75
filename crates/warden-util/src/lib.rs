//! Shared utilities for wardend
//!
//! This crate provides:
//! - ID types (PolicyId, UserId, ClientId)
//! - Time types for block windows (WallClock, DaysOfWeek, BlockWindow)
//! - The service clock (with mock-time support in debug builds)
//! - Rate limiting helpers
//! - Default paths for the socket and data directory

mod ids;
mod paths;
mod rate_limit;
mod time;

pub use ids::*;
pub use paths::*;
pub use rate_limit::*;
pub use time::*;
