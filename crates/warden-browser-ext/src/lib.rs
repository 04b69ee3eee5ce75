//! Browser extension bridge
//!
//! Implements the `RuleTable` collaborator over the Chrome native-messaging
//! protocol: the browser launches the service as a native host and speaks
//! length-prefixed JSON over stdin/stdout. Rule mutations flow out; rule
//! listings, acks, and navigation events flow back in.

mod bridge;
mod framing;

pub use bridge::*;
pub use framing::*;
