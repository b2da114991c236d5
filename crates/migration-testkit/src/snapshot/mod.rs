//! Database snapshot capture and persistence.
//!
//! The [`Snapshotter`] produces a complete, deterministic, self-describing
//! capture of a database's user-table contents and structure. Capture is
//! sequential and single-connection: one table is fully processed before the
//! next begins, which is what makes checksums and row ordering reproducible.

mod checksum;
mod types;

pub use checksum::table_checksum;
pub use types::{Snapshot, SnapshotMetadata, TableCapture};

use std::path::Path;

use chrono::Utc;
use tracing::{info, warn};

use crate::catalog::{CatalogIntrospector, ColumnSchema, ForeignKeySchema, IndexSchema};
use crate::config::EnvConfig;
use crate::error::{Result, TestkitError};

impl Snapshot {
    /// Serialize to pretty JSON at `path`, overwriting any existing file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        info!("Snapshot saved to {}", path.as_ref().display());
        Ok(())
    }

    /// Load a snapshot from `path`.
    ///
    /// Returns [`TestkitError::BaselineMissing`] when the file does not
    /// exist and [`TestkitError::BaselineFormat`] when it exists but is not
    /// valid snapshot JSON, so callers can branch on the cause.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Snapshot> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TestkitError::BaselineMissing(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|source| TestkitError::BaselineFormat {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// One table's capture plus the metadata gathered alongside it.
struct CapturedTable {
    capture: TableCapture,
    checksum: String,
    schema: Vec<ColumnSchema>,
    foreign_keys: Vec<ForeignKeySchema>,
    indexes: Vec<IndexSchema>,
}

/// Captures snapshots from a live database.
pub struct Snapshotter<'a> {
    db: &'a dyn CatalogIntrospector,
    environment: String,
    database: String,
    host: String,
}

impl<'a> Snapshotter<'a> {
    /// Build a snapshotter for one environment.
    pub fn new(db: &'a dyn CatalogIntrospector, env_name: &str, env: &EnvConfig) -> Self {
        Self {
            db,
            environment: env_name.to_string(),
            database: env.database.clone(),
            host: env.host.clone(),
        }
    }

    /// Capture the given tables, or every user table when `table_list` is
    /// `None`.
    ///
    /// A table that cannot be read is skipped with a warning; the remaining
    /// tables are still captured, so a partial snapshot is a valid result.
    pub async fn capture(&self, table_list: Option<&[String]>) -> Result<Snapshot> {
        let tables = match table_list {
            Some(list) => list.to_vec(),
            None => self.db.list_tables().await?,
        };

        info!(
            "Capturing {} tables from {} ({})",
            tables.len(),
            self.database,
            self.environment
        );

        let mut snapshot = Snapshot::new(SnapshotMetadata {
            snapshot_date: Utc::now(),
            database: self.database.clone(),
            host: self.host.clone(),
            environment: self.environment.clone(),
        });

        for table in &tables {
            match self.capture_table(table).await {
                Ok(captured) => {
                    snapshot
                        .checksums
                        .insert(table.clone(), captured.checksum);
                    snapshot
                        .schema_info
                        .insert(table.clone(), captured.schema);
                    if !captured.foreign_keys.is_empty() {
                        snapshot
                            .foreign_keys
                            .insert(table.clone(), captured.foreign_keys);
                    }
                    if !captured.indexes.is_empty() {
                        snapshot.indexes.insert(table.clone(), captured.indexes);
                    }
                    snapshot.tables.insert(table.clone(), captured.capture);
                }
                Err(e) => {
                    warn!("Skipping table {}: {}", table, e);
                }
            }
        }

        info!(
            "Captured {} tables, {} rows total",
            snapshot.tables.len(),
            snapshot.total_rows()
        );

        Ok(snapshot)
    }

    async fn capture_table(&self, table: &str) -> Result<CapturedTable> {
        let schema = self.db.column_schema(table).await?;
        if schema.is_empty() {
            return Err(TestkitError::capture(
                table,
                "table not found or has no columns",
            ));
        }

        let rows = self.db.fetch_rows(table, &schema).await?;
        let foreign_keys = self.db.foreign_keys(table).await?;
        let indexes = self.db.indexes(table).await?;

        let columns: Vec<String> = schema.iter().map(|c| c.name.clone()).collect();
        let capture = TableCapture::new(columns, rows);
        let checksum = capture.checksum();

        info!(
            "  Captured {}: {} rows, checksum {}...",
            table,
            capture.row_count,
            &checksum[..16]
        );

        Ok(CapturedTable {
            capture,
            checksum,
            schema,
            foreign_keys,
            indexes,
        })
    }
}
