//! Browser enforcement interfaces for wardend
//!
//! The browser's declarative rule table is an external collaborator: the
//! service tells it which redirect rules to install and receives
//! navigation-started events back. This crate defines that boundary:
//! - Rule types (`CompiledRule`, conditions, actions)
//! - The `RuleTable` trait
//! - `MockRuleTable` for tests

mod mock;
mod rules;
mod traits;

pub use mock::*;
pub use rules::*;
pub use traits::*;
