//! Read-only, aggregated views over the DKI Jakarta school-enrollment table.
//!
//! The dataset is a single flat CSV loaded and cleaned once at startup, then
//! held immutable for the process lifetime. Every endpoint is a thin
//! composition of two store operations: derive the group-by column set for
//! the requested administrative granularity, then run a grouped sum with
//! optional equality filters.
//!
//! # Architecture
//!
//! - `data` - Core data types (`Value`, `Record`, `Filter`, `Summary`)
//! - `store` - CSV load/clean and grouped-sum queries
//! - `server` - HTTP router and API handlers
//! - `error` - store failure taxonomy

pub mod data;
pub mod error;
pub mod server;
pub mod store;

pub use data::{Filter, Record, Summary, Value};
pub use error::StoreError;
pub use store::EnrollmentStore;
