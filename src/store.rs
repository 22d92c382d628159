//! In-memory store for the enrollment dataset.
//!
//! The CSV source is read and cleaned exactly once at startup. The resulting
//! dataset is immutable for the process lifetime, so every query is a plain
//! scan over shared state and safe to run from concurrent request contexts
//! without locking.
//!
//! Cleaning mirrors the source table's quirks:
//! - a column is a *measure* when every non-empty cell parses as a number,
//!   a *dimension* otherwise;
//! - constant measure columns (the year in the source data) are dropped;
//! - blank measure cells become `0`, every measure is coerced to `i64`.

use std::path::Path;

use indexmap::IndexMap;
use tracing::info;

use crate::data::{Filter, Record, Summary, Value};
use crate::error::StoreError;

/// The loaded, cleaned dataset plus its column metadata.
#[derive(Debug)]
pub struct EnrollmentStore {
    /// Column names after cleaning, in the source's left-to-right order.
    columns: Vec<String>,
    /// Subset of `columns` holding integer measures, same order.
    measures: Vec<String>,
    /// Rows in source order. Every record carries every column.
    records: Vec<Record>,
}

impl EnrollmentStore {
    /// Read and clean the source table.
    ///
    /// Fails with [`StoreError::DataUnavailable`] when the file cannot be
    /// opened or parsed; the caller is expected to treat that as fatal.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let mut reader = csv::Reader::from_path(path.as_ref())?;
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut rows: Vec<Vec<String>> = Vec::new();
        for result in reader.records() {
            let row = result?;
            // Pad short rows so every record carries every column.
            let mut cells: Vec<String> = row.iter().map(str::to_string).collect();
            cells.resize(headers.len(), String::new());
            rows.push(cells);
        }

        let is_measure: Vec<bool> = (0..headers.len())
            .map(|col| {
                rows.iter()
                    .all(|row| row[col].trim().is_empty() || parse_count(&row[col]).is_some())
            })
            .collect();

        // Constant measure columns carry no information and are dropped.
        // Dimensions are exempt: the province column is constant too, and the
        // granularity boundaries anchor on it. A single-row dataset makes
        // every column trivially constant, so the drop needs more than one row.
        let dropped: Vec<usize> = (0..headers.len())
            .filter(|&col| {
                rows.len() > 1
                    && is_measure[col]
                    && rows.iter().all(|row| row[col] == rows[0][col])
            })
            .collect();

        let kept: Vec<usize> = (0..headers.len())
            .filter(|col| !dropped.contains(col))
            .collect();

        let columns: Vec<String> = kept.iter().map(|&c| headers[c].clone()).collect();
        let measures: Vec<String> = kept
            .iter()
            .filter(|&&c| is_measure[c])
            .map(|&c| headers[c].clone())
            .collect();

        let records: Vec<Record> = rows
            .iter()
            .map(|row| {
                kept.iter()
                    .map(|&c| {
                        let cell = &row[c];
                        let value = if is_measure[c] {
                            Value::Count(parse_count(cell).unwrap_or(0))
                        } else {
                            Value::Text(cell.clone())
                        };
                        (headers[c].clone(), value)
                    })
                    .collect()
            })
            .collect();

        info!(
            rows = records.len(),
            columns = columns.len(),
            measures = measures.len(),
            dropped = ?dropped.iter().map(|&c| headers[c].as_str()).collect::<Vec<_>>(),
            "loaded enrollment dataset"
        );

        Ok(Self {
            columns,
            measures,
            records,
        })
    }

    /// Every record in source order, no aggregation.
    pub fn all_records(&self) -> &[Record] {
        &self.records
    }

    /// Column names after cleaning, native order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The ordered, inclusive slice of column names between two boundaries.
    ///
    /// Empty when `start` lies to the right of `end`.
    pub fn columns_between(&self, start: &str, end: &str) -> Result<Vec<String>, StoreError> {
        let start_idx = self
            .position(start)
            .ok_or_else(|| StoreError::ColumnNotFound(start.to_string()))?;
        let end_idx = self
            .position(end)
            .ok_or_else(|| StoreError::ColumnNotFound(end.to_string()))?;

        if start_idx > end_idx {
            return Ok(Vec::new());
        }
        Ok(self.columns[start_idx..=end_idx].to_vec())
    }

    /// Partition records by the distinct `groups` value tuples and sum every
    /// measure column across each partition.
    ///
    /// A non-empty `filters` list first narrows the dataset to records
    /// matching at least one predicate. Groups appear in first-seen order.
    /// Exactly one resulting group collapses to [`Summary::One`]; anything
    /// else, including no matches at all, is [`Summary::Many`].
    pub fn summarize_by(
        &self,
        groups: &[String],
        filters: &[Filter],
    ) -> Result<Summary, StoreError> {
        for group in groups {
            if self.position(group).is_none() {
                return Err(StoreError::GroupFieldNotFound(group.clone()));
            }
        }
        for filter in filters {
            if self.position(&filter.field).is_none() {
                return Err(StoreError::FilterFieldNotFound(filter.field.clone()));
            }
        }

        let mut partitions: IndexMap<Vec<Value>, Record> = IndexMap::new();

        for record in self.records.iter().filter(|r| matches_any(r, filters)) {
            // Every record carries every column, and the group fields were
            // validated above, so indexing cannot miss.
            let key: Vec<Value> = groups.iter().map(|g| record[g.as_str()].clone()).collect();

            let summary = partitions.entry(key).or_insert_with(|| {
                let mut init: Record = groups
                    .iter()
                    .map(|g| (g.clone(), record[g.as_str()].clone()))
                    .collect();
                for measure in &self.measures {
                    if !groups.contains(measure) {
                        init.insert(measure.clone(), Value::Count(0));
                    }
                }
                init
            });

            for measure in &self.measures {
                if groups.contains(measure) {
                    continue;
                }
                if let Value::Count(count) = record[measure.as_str()] {
                    if let Some(Value::Count(total)) = summary.get_mut(measure.as_str()) {
                        *total += count;
                    }
                }
            }
        }

        let mut summaries: Vec<Record> = partitions.into_values().collect();
        Ok(if summaries.len() == 1 {
            Summary::One(summaries.remove(0))
        } else {
            Summary::Many(summaries)
        })
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}

/// Whether a record survives an OR-combined filter list.
fn matches_any(record: &Record, filters: &[Filter]) -> bool {
    filters.is_empty()
        || filters.iter().any(|f| {
            record
                .get(f.field.as_str())
                .map(|v| v.matches(&f.value))
                .unwrap_or(false)
        })
}

/// Parse a cell as an integer count. Decimal values are truncated, matching
/// the source pipeline's integer coercion.
fn parse_count(cell: &str) -> Option<i64> {
    let cell = cell.trim();
    if let Ok(n) = cell.parse::<i64>() {
        return Some(n);
    }
    match cell.parse::<f64>() {
        Ok(f) if f.is_finite() => Some(f as i64),
        _ => None,
    }
}
