//! Core rule engine for wardend
//!
//! The pipeline: read policies from the store, compile the currently-active
//! ones into redirect rules, and reconcile the browser's dynamic rule table
//! with the result. The scheduler drives that pipeline every 30 seconds and
//! on change events; the matcher additionally backs the synchronous
//! navigation fallback check.

mod compiler;
mod matcher;
mod scheduler;
mod sync;

pub use compiler::*;
pub use matcher::*;
pub use scheduler::*;
pub use sync::*;

use thiserror::Error;
use warden_browser_api::BrowserError;
use warden_store::StoreError;

/// Errors from a compile+synchronize pass
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),
}

pub type EngineResult<T> = Result<T, EngineError>;
