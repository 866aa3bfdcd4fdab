//! Persistent state for sitewatch.
//!
//! A string key/value store in SQLite holding debounce timers and
//! down-observation log entries.

mod models;
mod store;

pub use models::*;
pub use store::*;
