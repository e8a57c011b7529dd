//! Data layer module
//!
//! Everything about the cached snapshot:
//! - the four datasets and their store keys
//! - canonical models and the validator that produces them
//! - the snapshot cache over the key/value store

mod cache;
mod dataset;
mod models;
pub mod validate;

pub use cache::{CacheRecord, Lookup, SnapshotCache};
pub use dataset::{Dataset, last_refresh_key, refresh_status_key};
pub use models::*;
pub use validate::ValidationError;
