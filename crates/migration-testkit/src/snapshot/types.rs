//! Snapshot data model.
//!
//! A [`Snapshot`] is the persisted unit of state: capture metadata plus an
//! ordered map of per-table captures. Maps are `BTreeMap`s so serialized
//! output has stable key ordering, and two files loaded independently
//! compare structurally regardless of the key order on disk.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{ColumnSchema, ForeignKeySchema, IndexSchema, RowData};

use super::checksum::table_checksum;

/// Capture metadata: when, where, and which environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Capture timestamp.
    pub snapshot_date: DateTime<Utc>,

    /// Target database name.
    pub database: String,

    /// Target database host.
    pub host: String,

    /// Environment label (e.g. "source", "target").
    pub environment: String,
}

/// Everything captured for one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCapture {
    /// Column names in ordinal order, as introspected at capture time.
    pub columns: Vec<String>,

    /// Cached cardinality; always equals `data.len()`.
    pub row_count: i64,

    /// Row records, ordered by the table's first column at fetch time.
    pub data: Vec<RowData>,
}

impl TableCapture {
    /// Build a capture from fetched rows, keeping `row_count` consistent.
    pub fn new(columns: Vec<String>, data: Vec<RowData>) -> Self {
        Self {
            columns,
            row_count: data.len() as i64,
            data,
        }
    }

    /// Order-independent content checksum over the row data.
    pub fn checksum(&self) -> String {
        table_checksum(&self.data)
    }
}

/// A complete database capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Capture metadata.
    pub metadata: SnapshotMetadata,

    /// Per-table captures, keyed by table name.
    pub tables: BTreeMap<String, TableCapture>,

    /// Stored content checksums per table. Recomputed from `data` during
    /// verification; kept in the file for human inspection.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub checksums: BTreeMap<String, String>,

    /// Column-level schema metadata per table.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub schema_info: BTreeMap<String, Vec<ColumnSchema>>,

    /// Foreign key constraints per table.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub foreign_keys: BTreeMap<String, Vec<ForeignKeySchema>>,

    /// Index definitions per table.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub indexes: BTreeMap<String, Vec<IndexSchema>>,
}

impl Snapshot {
    /// Create an empty snapshot with the given metadata.
    pub fn new(metadata: SnapshotMetadata) -> Self {
        Self {
            metadata,
            tables: BTreeMap::new(),
            checksums: BTreeMap::new(),
            schema_info: BTreeMap::new(),
            foreign_keys: BTreeMap::new(),
            indexes: BTreeMap::new(),
        }
    }

    /// Table names present in this snapshot.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Total captured rows across all tables.
    pub fn total_rows(&self) -> i64 {
        self.tables.values().map(|t| t.row_count).sum()
    }

    /// Content equality, ignoring the capture-time-dependent metadata
    /// timestamp. Used by the round-trip tests and nowhere else in the
    /// verification path (which compares check by check).
    pub fn content_eq(&self, other: &Snapshot) -> bool {
        self.tables == other.tables
            && self.checksums == other.checksums
            && self.schema_info == other.schema_info
            && self.foreign_keys == other.foreign_keys
            && self.indexes == other.indexes
            && self.metadata.database == other.metadata.database
            && self.metadata.host == other.metadata.host
            && self.metadata.environment == other.metadata.environment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, serde_json::Value)]) -> RowData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn sample_snapshot() -> Snapshot {
        let mut snapshot = Snapshot::new(SnapshotMetadata {
            snapshot_date: Utc::now(),
            database: "petclinic".to_string(),
            host: "db.example.com".to_string(),
            environment: "target".to_string(),
        });

        let capture = TableCapture::new(
            vec!["id".to_string(), "name".to_string()],
            vec![
                row(&[("id", json!(1)), ("name", json!("cat"))]),
                row(&[("id", json!(2)), ("name", json!("dog"))]),
            ],
        );
        snapshot
            .checksums
            .insert("types".to_string(), capture.checksum());
        snapshot.tables.insert("types".to_string(), capture);
        snapshot
    }

    #[test]
    fn test_row_count_tracks_data_len() {
        let capture = TableCapture::new(
            vec!["id".to_string()],
            vec![row(&[("id", json!(1))]), row(&[("id", json!(2))])],
        );
        assert_eq!(capture.row_count, 2);
        assert_eq!(capture.row_count as usize, capture.data.len());
    }

    #[test]
    fn test_serde_round_trip_preserves_content() {
        let snapshot = sample_snapshot();
        let json = serde_json::to_string_pretty(&snapshot).unwrap();
        let reloaded: Snapshot = serde_json::from_str(&json).unwrap();
        assert!(snapshot.content_eq(&reloaded));
        assert_eq!(snapshot, reloaded);
    }

    #[test]
    fn test_optional_sections_omitted_when_empty() {
        let mut snapshot = sample_snapshot();
        snapshot.checksums.clear();
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(!json.contains("\"checksums\""));
        assert!(!json.contains("\"foreign_keys\""));
    }

    #[test]
    fn test_minimal_file_format_still_loads() {
        // A snapshot file holding only metadata + tables (the §6 wire shape)
        let json = r#"{
            "metadata": {
                "snapshot_date": "2026-01-10T22:17:52Z",
                "database": "petclinic",
                "host": "db.example.com",
                "environment": "target"
            },
            "tables": {
                "owners": {
                    "columns": ["id", "first_name"],
                    "row_count": 1,
                    "data": [{"id": 1, "first_name": "George"}]
                }
            }
        }"#;
        let snapshot: Snapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.tables["owners"].row_count, 1);
        assert!(snapshot.foreign_keys.is_empty());
    }

    #[test]
    fn test_total_rows() {
        let snapshot = sample_snapshot();
        assert_eq!(snapshot.total_rows(), 2);
    }
}
