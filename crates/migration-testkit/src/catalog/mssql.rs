//! SQL Server catalog introspection and row extraction.
//!
//! Uses Tiberius with bb8 connection pooling. Catalog queries go through the
//! `sys.*` views plus `INFORMATION_SCHEMA`; cell values are coerced to
//! JSON-safe scalars based on the declared column type.

use std::time::Duration;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use chrono::{DateTime, NaiveDateTime, Utc};
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, Query, Row};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{EnvConfig, Engine};
use crate::error::{Result, TestkitError};

use super::{
    qualified, quote_ident, CatalogIntrospector, ColumnSchema, FkCheck, ForeignKeySchema,
    IndexSchema, RowData,
};

/// Connection acquisition timeout from the pool.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection manager for bb8 pool with Tiberius.
#[derive(Clone)]
struct TiberiusConnectionManager {
    env: EnvConfig,
}

impl TiberiusConnectionManager {
    fn build_config(&self) -> Config {
        let mut config = Config::new();
        config.host(&self.env.host);
        config.port(self.env.port());
        config.database(&self.env.database);
        config.authentication(AuthMethod::sql_server(&self.env.user, &self.env.password));

        if self.env.encrypt {
            if self.env.trust_server_cert {
                config.trust_cert();
            }
            config.encryption(EncryptionLevel::Required);
        } else {
            config.encryption(EncryptionLevel::NotSupported);
        }

        config
    }
}

#[async_trait]
impl bb8::ManageConnection for TiberiusConnectionManager {
    type Connection = Client<Compat<TcpStream>>;
    type Error = tiberius::error::Error;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        let config = self.build_config();
        let tcp = TcpStream::connect(config.get_addr()).await.map_err(|e| {
            tiberius::error::Error::Io {
                kind: e.kind(),
                message: e.to_string(),
            }
        })?;
        tcp.set_nodelay(true).ok();

        Client::connect(config, tcp.compat_write()).await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// SQL Server catalog implementation.
pub struct MssqlCatalog {
    pool: Pool<TiberiusConnectionManager>,
    schema: String,
}

impl MssqlCatalog {
    /// Connect and build a pool from environment configuration.
    pub async fn new(env: &EnvConfig, max_conns: u32) -> Result<Self> {
        let manager = TiberiusConnectionManager { env: env.clone() };

        let pool = Pool::builder()
            .max_size(max_conns)
            .connection_timeout(POOL_CONNECTION_TIMEOUT)
            .build(manager)
            .await
            .map_err(|e| TestkitError::pool(e, "creating SQL Server pool"))?;

        // Probe the connection before handing the pool out
        {
            let mut client = pool
                .get()
                .await
                .map_err(|e| TestkitError::pool(e, format!("connecting to {}", env.redacted())))?;
            client.simple_query("SELECT 1").await?.into_row().await?;
        }

        info!("Connected to SQL Server: {}", env.redacted());

        Ok(Self {
            pool,
            schema: env.schema().to_string(),
        })
    }

    async fn client(
        &self,
        context: &str,
    ) -> Result<PooledConnection<'_, TiberiusConnectionManager>> {
        self.pool
            .get()
            .await
            .map_err(|e| TestkitError::pool(e, context.to_string()))
    }
}

#[async_trait]
impl CatalogIntrospector for MssqlCatalog {
    fn engine(&self) -> Engine {
        Engine::Mssql
    }

    fn schema(&self) -> &str {
        &self.schema
    }

    async fn server_version(&self) -> Result<String> {
        let mut client = self.client("fetching server version").await?;
        let row = client
            .simple_query("SELECT @@VERSION")
            .await?
            .into_row()
            .await?;
        Ok(row
            .and_then(|r| r.get::<&str, _>(0).map(str::to_string))
            .unwrap_or_default())
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let mut client = self.client("listing tables").await?;

        let query = r#"
            SELECT t.TABLE_NAME
            FROM INFORMATION_SCHEMA.TABLES t
            WHERE t.TABLE_TYPE = 'BASE TABLE'
              AND t.TABLE_SCHEMA = @P1
            ORDER BY t.TABLE_NAME
        "#;

        let mut q = Query::new(query);
        q.bind(self.schema.as_str());

        let rows = q.query(&mut client).await?.into_first_result().await?;

        Ok(rows
            .iter()
            .filter_map(|r| r.get::<&str, _>(0).map(str::to_string))
            .collect())
    }

    async fn column_schema(&self, table: &str) -> Result<Vec<ColumnSchema>> {
        let mut client = self.client("loading column schema").await?;

        let query = r#"
            SELECT
                c.COLUMN_NAME,
                c.DATA_TYPE,
                c.CHARACTER_MAXIMUM_LENGTH,
                CASE WHEN c.IS_NULLABLE = 'YES' THEN 1 ELSE 0 END,
                c.COLUMN_DEFAULT
            FROM INFORMATION_SCHEMA.COLUMNS c
            WHERE c.TABLE_SCHEMA = @P1 AND c.TABLE_NAME = @P2
            ORDER BY c.ORDINAL_POSITION
        "#;

        let mut q = Query::new(query);
        q.bind(self.schema.as_str());
        q.bind(table);

        let rows = q.query(&mut client).await?.into_first_result().await?;

        let columns = rows
            .iter()
            .map(|row| ColumnSchema {
                name: row.get::<&str, _>(0).unwrap_or_default().to_string(),
                data_type: row.get::<&str, _>(1).unwrap_or_default().to_string(),
                max_length: row.get::<i32, _>(2),
                is_nullable: row.get::<i32, _>(3).unwrap_or(0) != 0,
                default: row.get::<&str, _>(4).map(str::to_string),
            })
            .collect::<Vec<_>>();

        debug!("Loaded {} columns for {}", columns.len(), table);
        Ok(columns)
    }

    async fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeySchema>> {
        let mut client = self.client("loading foreign keys").await?;

        let query = r#"
            SELECT
                fk.name AS constraint_name,
                pc.name AS parent_column,
                rt.name AS referenced_table,
                rc.name AS referenced_column
            FROM sys.foreign_keys fk
            JOIN sys.foreign_key_columns fkc
                ON fkc.constraint_object_id = fk.object_id
            JOIN sys.tables pt ON pt.object_id = fk.parent_object_id
            JOIN sys.schemas ps ON ps.schema_id = pt.schema_id
            JOIN sys.columns pc
                ON pc.object_id = fkc.parent_object_id
                AND pc.column_id = fkc.parent_column_id
            JOIN sys.tables rt ON rt.object_id = fk.referenced_object_id
            JOIN sys.columns rc
                ON rc.object_id = fkc.referenced_object_id
                AND rc.column_id = fkc.referenced_column_id
            WHERE ps.name = @P1 AND pt.name = @P2
            ORDER BY fk.name, fkc.constraint_column_id
        "#;

        let mut q = Query::new(query);
        q.bind(self.schema.as_str());
        q.bind(table);

        let rows = q.query(&mut client).await?.into_first_result().await?;

        Ok(rows
            .iter()
            .map(|row| ForeignKeySchema {
                name: row.get::<&str, _>(0).unwrap_or_default().to_string(),
                column: row.get::<&str, _>(1).unwrap_or_default().to_string(),
                ref_table: row.get::<&str, _>(2).unwrap_or_default().to_string(),
                ref_column: row.get::<&str, _>(3).unwrap_or_default().to_string(),
            })
            .collect())
    }

    async fn indexes(&self, table: &str) -> Result<Vec<IndexSchema>> {
        let mut client = self.client("loading indexes").await?;

        let query = r#"
            SELECT
                i.name AS index_name,
                i.is_unique,
                i.is_primary_key,
                STUFF((
                    SELECT ',' + c2.name
                    FROM sys.index_columns ic2
                    JOIN sys.columns c2
                        ON ic2.object_id = c2.object_id
                        AND ic2.column_id = c2.column_id
                    WHERE ic2.object_id = i.object_id
                      AND ic2.index_id = i.index_id
                      AND ic2.is_included_column = 0
                    ORDER BY ic2.key_ordinal
                    FOR XML PATH('')
                ), 1, 1, '') AS columns
            FROM sys.indexes i
            JOIN sys.tables t ON t.object_id = i.object_id
            JOIN sys.schemas s ON s.schema_id = t.schema_id
            WHERE s.name = @P1 AND t.name = @P2
              AND i.type > 0
              AND i.name IS NOT NULL
            ORDER BY i.name
        "#;

        let mut q = Query::new(query);
        q.bind(self.schema.as_str());
        q.bind(table);

        let rows = q.query(&mut client).await?.into_first_result().await?;

        Ok(rows
            .iter()
            .map(|row| IndexSchema {
                name: row.get::<&str, _>(0).unwrap_or_default().to_string(),
                is_unique: row.get::<bool, _>(1).unwrap_or(false),
                is_primary: row.get::<bool, _>(2).unwrap_or(false),
                columns: row
                    .get::<&str, _>(3)
                    .map(|s| s.split(',').map(str::to_string).collect())
                    .unwrap_or_default(),
                definition: None,
            })
            .collect())
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        let mut client = self.client("counting rows").await?;
        let sql = format!(
            "SELECT COUNT_BIG(*) FROM {}",
            qualified(Engine::Mssql, &self.schema, table)
        );
        let row = client.simple_query(&sql).await?.into_row().await?;
        Ok(row.and_then(|r| scalar_i64(&r)).unwrap_or(0))
    }

    async fn fetch_rows(&self, table: &str, columns: &[ColumnSchema]) -> Result<Vec<RowData>> {
        if columns.is_empty() {
            return Ok(Vec::new());
        }

        let mut client = self.client("fetching rows").await?;

        let col_list = columns
            .iter()
            .map(|c| quote_ident(Engine::Mssql, &c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {} FROM {} ORDER BY {}",
            col_list,
            qualified(Engine::Mssql, &self.schema, table),
            quote_ident(Engine::Mssql, &columns[0].name)
        );

        let rows = client.simple_query(&sql).await?.into_first_result().await?;

        let mut result = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut record = RowData::new();
            for (idx, col) in columns.iter().enumerate() {
                record.insert(col.name.clone(), mssql_cell_to_json(row, idx, &col.data_type));
            }
            result.push(record);
        }

        debug!("Fetched {} rows from {}", result.len(), table);
        Ok(result)
    }

    async fn count_orphans(&self, check: &FkCheck) -> Result<i64> {
        let mut client = self.client("counting orphans").await?;

        let sql = format!(
            "SELECT COUNT_BIG(*) FROM {} t LEFT JOIN {} r ON t.{} = r.{} WHERE r.{} IS NULL",
            qualified(Engine::Mssql, &self.schema, &check.table),
            qualified(Engine::Mssql, &self.schema, &check.ref_table),
            quote_ident(Engine::Mssql, &check.column),
            quote_ident(Engine::Mssql, &check.ref_column),
            quote_ident(Engine::Mssql, &check.ref_column),
        );

        let row = client.simple_query(&sql).await?.into_row().await?;
        Ok(row.and_then(|r| scalar_i64(&r)).unwrap_or(0))
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        let mut client = self.client("executing statement").await?;
        let result = client.execute(sql, &[]).await?;
        Ok(result.rows_affected().iter().sum())
    }

    async fn query_count(&self, sql: &str) -> Result<u64> {
        let mut client = self.client("executing query").await?;
        let rows = client.simple_query(sql).await?.into_first_result().await?;
        Ok(rows.len() as u64)
    }
}

/// Read an integer scalar from the first column, whatever its width.
fn scalar_i64(row: &Row) -> Option<i64> {
    row.get::<i64, _>(0)
        .or_else(|| row.get::<i32, _>(0).map(|v| v as i64))
}

/// Coerce one cell to a JSON-safe scalar based on the declared type.
fn mssql_cell_to_json(row: &Row, idx: usize, data_type: &str) -> serde_json::Value {
    use serde_json::Value;

    match data_type.to_lowercase().as_str() {
        "bit" => row
            .get::<bool, _>(idx)
            .map(Value::Bool)
            .unwrap_or(Value::Null),
        "tinyint" => row
            .get::<u8, _>(idx)
            .map(|v| Value::from(v as i64))
            .unwrap_or(Value::Null),
        "smallint" => row
            .get::<i16, _>(idx)
            .map(|v| Value::from(v as i64))
            .unwrap_or(Value::Null),
        "int" => row
            .get::<i32, _>(idx)
            .map(|v| Value::from(v as i64))
            .unwrap_or(Value::Null),
        "bigint" => row
            .get::<i64, _>(idx)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "real" => row
            .get::<f32, _>(idx)
            .map(|v| json_float(v as f64))
            .unwrap_or(Value::Null),
        "float" => row
            .get::<f64, _>(idx)
            .map(json_float)
            .unwrap_or(Value::Null),
        "uniqueidentifier" => row
            .get::<Uuid, _>(idx)
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),
        "datetime" | "datetime2" | "smalldatetime" => row
            .get::<NaiveDateTime, _>(idx)
            .map(|v| Value::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
            .unwrap_or(Value::Null),
        "date" => row
            .get::<NaiveDateTime, _>(idx)
            .map(|v| Value::String(v.date().format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null),
        "time" => row
            .get::<NaiveDateTime, _>(idx)
            .map(|v| Value::String(v.time().format("%H:%M:%S%.f").to_string()))
            .unwrap_or(Value::Null),
        "datetimeoffset" => row
            .get::<DateTime<Utc>, _>(idx)
            .map(|v| Value::String(v.to_rfc3339()))
            .unwrap_or(Value::Null),
        "decimal" | "numeric" | "money" | "smallmoney" => row
            .get::<rust_decimal::Decimal, _>(idx)
            .map(|v| Value::String(v.to_string()))
            .or_else(|| row.get::<f64, _>(idx).map(json_float))
            .unwrap_or(Value::Null),
        "binary" | "varbinary" | "image" => row
            .get::<&[u8], _>(idx)
            .map(|v| Value::String(to_hex(v)))
            .unwrap_or(Value::Null),
        _ => row
            .get::<&str, _>(idx)
            .map(|s| Value::String(s.to_string()))
            .unwrap_or(Value::Null),
    }
}

fn json_float(v: f64) -> serde_json::Value {
    serde_json::Number::from_f64(v)
        .map(serde_json::Value::Number)
        .unwrap_or_else(|| serde_json::Value::String(v.to_string()))
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
