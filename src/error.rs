//! Failure taxonomy for the data store.

use thiserror::Error;

/// Errors produced by [`crate::store::EnrollmentStore`].
///
/// `DataUnavailable` is fatal at startup; the process must not begin serving
/// without a dataset. The remaining variants indicate a misconfigured
/// granularity boundary or filter field, which no request input can trigger
/// against a fixed schema, so the server surfaces them as internal errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("data source unavailable: {0}")]
    DataUnavailable(String),

    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("group field not found: {0}")]
    GroupFieldNotFound(String),

    #[error("filter field not found: {0}")]
    FilterFieldNotFound(String),
}

impl From<csv::Error> for StoreError {
    fn from(err: csv::Error) -> Self {
        StoreError::DataUnavailable(err.to_string())
    }
}
