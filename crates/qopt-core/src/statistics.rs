//! # Statistics Interface
//!
//! The statistics subsystem is an external collaborator. The optimizer asks it
//! for column- and table-level statistics through [`StatisticStorage`] and makes
//! no assumptions about freshness, caching, or retries -- those belong to the
//! collaborator.
//!
//! The one contract that matters here: when no estimate exists for a column,
//! the storage returns a [`ColumnStatistic`] whose `unknown` flag is set rather
//! than failing or guessing. Heuristics use that flag to decide whether a
//! cost-based choice can be trusted at all.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-column statistics as reported by the statistics collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStatistic {
    /// Number of distinct values.
    pub ndv: f64,
    /// Fraction of rows that are NULL, in [0.0, 1.0].
    pub null_fraction: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Average size of one value in bytes.
    pub avg_size_bytes: f64,
    unknown: bool,
}

impl ColumnStatistic {
    pub fn new(ndv: f64, null_fraction: f64) -> Self {
        Self {
            ndv,
            null_fraction,
            min: None,
            max: None,
            avg_size_bytes: 8.0,
            unknown: false,
        }
    }

    /// The "no estimate exists" sentinel.
    pub fn unknown() -> Self {
        Self {
            ndv: 1.0,
            null_fraction: 0.0,
            min: None,
            max: None,
            avg_size_bytes: 8.0,
            unknown: true,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.unknown
    }
}

/// Table-level statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableStatistics {
    pub row_count: f64,
    pub columns: HashMap<String, ColumnStatistic>,
}

impl TableStatistics {
    pub fn new(row_count: f64) -> Self {
        Self {
            row_count,
            columns: HashMap::new(),
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, stats: ColumnStatistic) -> Self {
        self.columns.insert(name.into(), stats);
        self
    }
}

/// Statistics collaborator interface.
pub trait StatisticStorage: Send + Sync {
    /// One statistic per requested column, in request order. Columns without
    /// an estimate yield [`ColumnStatistic::unknown`], never an error.
    fn get_column_statistics(&self, table: &str, columns: &[String]) -> Vec<ColumnStatistic>;

    fn get_table_statistics(&self, table: &str) -> Option<TableStatistics>;
}

/// In-memory statistics for tests and development.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStatisticStorage {
    tables: HashMap<String, TableStatistics>,
}

impl InMemoryStatisticStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, name: impl Into<String>, stats: TableStatistics) {
        self.tables.insert(name.into(), stats);
    }
}

impl StatisticStorage for InMemoryStatisticStorage {
    fn get_column_statistics(&self, table: &str, columns: &[String]) -> Vec<ColumnStatistic> {
        let table_stats = self.tables.get(table);
        columns
            .iter()
            .map(|name| {
                table_stats
                    .and_then(|t| t.columns.get(name).cloned())
                    .unwrap_or_else(ColumnStatistic::unknown)
            })
            .collect()
    }

    fn get_table_statistics(&self, table: &str) -> Option<TableStatistics> {
        self.tables.get(table).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_columns_degrade_to_unknown() {
        let mut storage = InMemoryStatisticStorage::new();
        storage.add_table(
            "t",
            TableStatistics::new(1000.0).with_column("a", ColumnStatistic::new(100.0, 0.0)),
        );

        let stats = storage.get_column_statistics("t", &["a".into(), "missing".into()]);
        assert_eq!(stats.len(), 2);
        assert!(!stats[0].is_unknown());
        assert!(stats[1].is_unknown());

        let stats = storage.get_column_statistics("unknown_table", &["a".into()]);
        assert!(stats[0].is_unknown());
    }
}
