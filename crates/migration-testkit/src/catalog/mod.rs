//! Catalog introspection and row extraction, one implementation per engine.
//!
//! The snapshot and verification logic is engine-blind: everything it needs
//! from a database goes through the [`CatalogIntrospector`] trait. The
//! PostgreSQL implementation reads `information_schema` and `pg_indexes`;
//! the SQL Server implementation reads the `sys.*` views. Both coerce cell
//! values to JSON-safe scalars with a stable string form for non-primitive
//! types, so re-capturing unchanged data yields identical values.

mod mssql;
mod postgres;

pub use mssql::MssqlCatalog;
pub use postgres::PostgresCatalog;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{EnvConfig, Engine};
use crate::error::Result;

/// A row as captured from the database: column name to JSON-safe scalar.
///
/// `BTreeMap` keeps keys sorted, which makes serialized rows canonical
/// without an extra normalization pass.
pub type RowData = BTreeMap<String, serde_json::Value>;

/// Column-level schema metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Column name.
    pub name: String,

    /// Declared data type (e.g. "int", "varchar", "timestamp").
    pub data_type: String,

    /// Maximum length for string/binary types.
    pub max_length: Option<i32>,

    /// Whether the column allows NULL.
    pub is_nullable: bool,

    /// Default expression, if any.
    pub default: Option<String>,
}

/// Foreign key constraint metadata, one entry per column pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeySchema {
    /// Constraint name.
    pub name: String,

    /// Local column.
    pub column: String,

    /// Referenced table name.
    pub ref_table: String,

    /// Referenced column name.
    pub ref_column: String,
}

/// Index metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSchema {
    /// Index name.
    pub name: String,

    /// Whether the index is unique.
    pub is_unique: bool,

    /// Whether the index backs the primary key.
    pub is_primary: bool,

    /// Covered columns, when the engine exposes them directly.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,

    /// Full index definition, when the engine exposes one (PostgreSQL).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
}

/// One referential-integrity check: count rows in `table` whose
/// `column` value matches no `ref_table.ref_column` value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FkCheck {
    pub table: String,
    pub column: String,
    pub ref_table: String,
    pub ref_column: String,
}

impl FkCheck {
    pub fn new(
        table: impl Into<String>,
        column: impl Into<String>,
        ref_table: impl Into<String>,
        ref_column: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            ref_table: ref_table.into(),
            ref_column: ref_column.into(),
        }
    }
}

impl std::fmt::Display for FkCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.table, self.column, self.ref_table, self.ref_column
        )
    }
}

/// Engine-agnostic catalog and data access.
///
/// Implementations are expected to scope every operation to the schema they
/// were constructed with, and to fetch rows ordered by the first requested
/// column so captures are deterministic.
#[async_trait]
pub trait CatalogIntrospector: Send + Sync {
    /// The engine behind this introspector.
    fn engine(&self) -> Engine;

    /// The schema all operations are scoped to.
    fn schema(&self) -> &str;

    /// Fetch the server version string (connectivity probe).
    async fn server_version(&self) -> Result<String>;

    /// List user tables in the schema, sorted by name.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Column-level schema metadata in ordinal order.
    async fn column_schema(&self, table: &str) -> Result<Vec<ColumnSchema>>;

    /// Foreign key constraints on a table.
    async fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeySchema>>;

    /// Index definitions on a table.
    async fn indexes(&self, table: &str) -> Result<Vec<IndexSchema>>;

    /// Exact row count.
    async fn row_count(&self, table: &str) -> Result<i64>;

    /// Fetch all rows, ordered by the first column, coerced to JSON-safe
    /// scalars.
    async fn fetch_rows(&self, table: &str, columns: &[ColumnSchema]) -> Result<Vec<RowData>>;

    /// Count orphaned rows for one referential-integrity check.
    async fn count_orphans(&self, check: &FkCheck) -> Result<i64>;

    /// Execute a statement, returning the number of affected rows.
    async fn execute(&self, sql: &str) -> Result<u64>;

    /// Execute a query, drain the result set, and return the number of rows
    /// fetched. Used by the load test's read operations.
    async fn query_count(&self, sql: &str) -> Result<u64>;
}

/// A connected database, dispatching to the engine-specific implementation.
pub enum Database {
    Postgres(PostgresCatalog),
    Mssql(MssqlCatalog),
}

impl Database {
    /// Connect to the environment with a small default pool.
    pub async fn connect(env: &EnvConfig) -> Result<Self> {
        Self::connect_with_pool_size(env, 4).await
    }

    /// Connect to the environment with an explicit pool size.
    pub async fn connect_with_pool_size(env: &EnvConfig, max_conns: usize) -> Result<Self> {
        match env.engine {
            Engine::Postgres => Ok(Database::Postgres(
                PostgresCatalog::new(env, max_conns).await?,
            )),
            Engine::Mssql => Ok(Database::Mssql(
                MssqlCatalog::new(env, max_conns as u32).await?,
            )),
        }
    }

    fn inner(&self) -> &dyn CatalogIntrospector {
        match self {
            Database::Postgres(c) => c,
            Database::Mssql(c) => c,
        }
    }
}

#[async_trait]
impl CatalogIntrospector for Database {
    fn engine(&self) -> Engine {
        self.inner().engine()
    }

    fn schema(&self) -> &str {
        self.inner().schema()
    }

    async fn server_version(&self) -> Result<String> {
        self.inner().server_version().await
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        self.inner().list_tables().await
    }

    async fn column_schema(&self, table: &str) -> Result<Vec<ColumnSchema>> {
        self.inner().column_schema(table).await
    }

    async fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeySchema>> {
        self.inner().foreign_keys(table).await
    }

    async fn indexes(&self, table: &str) -> Result<Vec<IndexSchema>> {
        self.inner().indexes(table).await
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        self.inner().row_count(table).await
    }

    async fn fetch_rows(&self, table: &str, columns: &[ColumnSchema]) -> Result<Vec<RowData>> {
        self.inner().fetch_rows(table, columns).await
    }

    async fn count_orphans(&self, check: &FkCheck) -> Result<i64> {
        self.inner().count_orphans(check).await
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        self.inner().execute(sql).await
    }

    async fn query_count(&self, sql: &str) -> Result<u64> {
        self.inner().query_count(sql).await
    }
}

/// Quote an identifier for the given engine.
///
/// - PostgreSQL: `"identifier"`
/// - SQL Server: `[identifier]`
pub fn quote_ident(engine: Engine, name: &str) -> String {
    match engine {
        Engine::Postgres => format!("\"{}\"", name.replace('"', "\"\"")),
        Engine::Mssql => format!("[{}]", name.replace(']', "]]")),
    }
}

/// Schema-qualified, quoted table reference for the given engine.
pub fn qualified(engine: Engine, schema: &str, table: &str) -> String {
    format!(
        "{}.{}",
        quote_ident(engine, schema),
        quote_ident(engine, table)
    )
}

/// Escape a string for use as a SQL literal (single quotes doubled).
///
/// Only used for synthetic values generated by this crate; user-supplied
/// data goes through parameterized queries.
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}
