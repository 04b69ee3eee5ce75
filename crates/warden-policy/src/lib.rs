//! Block policy records for wardend
//!
//! A policy names a site pattern, a daily time window, and a set of active
//! weekdays. Records are created from raw authoring input (`PolicyDraft`)
//! through the validation boundary here; the engine only ever sees
//! validated records.

mod record;
mod schema;
mod validation;

pub use record::*;
pub use schema::*;
pub use validation::*;
