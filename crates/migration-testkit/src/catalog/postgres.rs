//! PostgreSQL catalog introspection and row extraction.
//!
//! Uses deadpool-postgres for connection pooling. Catalog queries go through
//! `information_schema` plus `pg_indexes`; cell values are coerced to
//! JSON-safe scalars based on the runtime column type reported by
//! tokio-postgres.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use rustls::ClientConfig;
use tokio_postgres::types::Type;
use tokio_postgres::Config as PgConfig;
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{EnvConfig, Engine};
use crate::error::{Result, TestkitError};

use super::{
    qualified, quote_ident, CatalogIntrospector, ColumnSchema, FkCheck, ForeignKeySchema,
    IndexSchema, RowData,
};

/// PostgreSQL catalog implementation.
pub struct PostgresCatalog {
    pool: Pool,
    schema: String,
}

impl PostgresCatalog {
    /// Connect and build a pool from environment configuration.
    pub async fn new(env: &EnvConfig, max_conns: usize) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&env.host);
        pg_config.port(env.port());
        pg_config.dbname(&env.database);
        pg_config.user(&env.user);
        pg_config.password(&env.password);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let pool = match env.ssl_mode.to_lowercase().as_str() {
            "disable" => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                let mgr = Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config);
                Pool::builder(mgr)
                    .max_size(max_conns)
                    .build()
                    .map_err(|e| TestkitError::pool(e, "creating PostgreSQL pool"))?
            }
            _ => {
                let tls_config = build_tls_config(&env.ssl_mode)?;
                let tls_connector = MakeRustlsConnect::new(tls_config);
                let mgr = Manager::from_config(pg_config, tls_connector, mgr_config);
                Pool::builder(mgr)
                    .max_size(max_conns)
                    .build()
                    .map_err(|e| TestkitError::pool(e, "creating PostgreSQL pool"))?
            }
        };

        // Probe the connection before handing the pool out
        let client = pool
            .get()
            .await
            .map_err(|e| TestkitError::pool(e, format!("connecting to {}", env.redacted())))?;
        client.simple_query("SELECT 1").await?;

        info!("Connected to PostgreSQL: {}", env.redacted());

        Ok(Self {
            pool,
            schema: env.schema().to_string(),
        })
    }

    async fn client(&self, context: &str) -> Result<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| TestkitError::pool(e, context.to_string()))
    }
}

/// Build TLS configuration for the requested ssl_mode.
fn build_tls_config(ssl_mode: &str) -> Result<ClientConfig> {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = match ssl_mode {
        "require" => {
            warn!("ssl_mode=require: TLS enabled but server certificate is not verified.");
            ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoVerifier))
                .with_no_client_auth()
        }
        "verify-ca" | "verify-full" => {
            info!("ssl_mode={}: certificate verification enabled", ssl_mode);
            ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth()
        }
        other => {
            return Err(TestkitError::Config(format!(
                "Invalid ssl_mode '{}'. Valid options: disable, require, verify-ca, verify-full",
                other
            )));
        }
    };

    Ok(config)
}

#[async_trait]
impl CatalogIntrospector for PostgresCatalog {
    fn engine(&self) -> Engine {
        Engine::Postgres
    }

    fn schema(&self) -> &str {
        &self.schema
    }

    async fn server_version(&self) -> Result<String> {
        let client = self.client("fetching server version").await?;
        let row = client.query_one("SELECT version()", &[]).await?;
        Ok(row.get::<_, String>(0))
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let client = self.client("listing tables").await?;

        let query = r#"
            SELECT table_name
            FROM information_schema.tables
            WHERE table_type = 'BASE TABLE'
              AND table_schema = $1
              AND table_schema NOT IN ('pg_catalog', 'information_schema')
            ORDER BY table_name
        "#;

        let rows = client.query(query, &[&self.schema]).await?;
        Ok(rows.iter().map(|r| r.get::<_, String>(0)).collect())
    }

    async fn column_schema(&self, table: &str) -> Result<Vec<ColumnSchema>> {
        let client = self.client("loading column schema").await?;

        let query = r#"
            SELECT
                column_name,
                data_type,
                character_maximum_length,
                CASE WHEN is_nullable = 'YES' THEN true ELSE false END,
                column_default
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
        "#;

        let rows = client.query(query, &[&self.schema, &table]).await?;

        let columns = rows
            .iter()
            .map(|row| ColumnSchema {
                name: row.get(0),
                data_type: row.get(1),
                max_length: row.get(2),
                is_nullable: row.get(3),
                default: row.get(4),
            })
            .collect::<Vec<_>>();

        debug!("Loaded {} columns for {}", columns.len(), table);
        Ok(columns)
    }

    async fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeySchema>> {
        let client = self.client("loading foreign keys").await?;

        let query = r#"
            SELECT
                tc.constraint_name,
                kcu.column_name AS parent_column,
                ccu.table_name AS referenced_table,
                ccu.column_name AS referenced_column
            FROM information_schema.table_constraints AS tc
            JOIN information_schema.key_column_usage AS kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            JOIN information_schema.constraint_column_usage AS ccu
                ON ccu.constraint_name = tc.constraint_name
                AND ccu.table_schema = tc.table_schema
            WHERE tc.constraint_type = 'FOREIGN KEY'
                AND tc.table_schema = $1
                AND tc.table_name = $2
            ORDER BY tc.constraint_name
        "#;

        let rows = client.query(query, &[&self.schema, &table]).await?;

        Ok(rows
            .iter()
            .map(|row| ForeignKeySchema {
                name: row.get(0),
                column: row.get(1),
                ref_table: row.get(2),
                ref_column: row.get(3),
            })
            .collect())
    }

    async fn indexes(&self, table: &str) -> Result<Vec<IndexSchema>> {
        let client = self.client("loading indexes").await?;

        let query = r#"
            SELECT indexname, indexdef
            FROM pg_indexes
            WHERE schemaname = $1 AND tablename = $2
            ORDER BY indexname
        "#;

        let rows = client.query(query, &[&self.schema, &table]).await?;

        Ok(rows
            .iter()
            .map(|row| {
                let name: String = row.get(0);
                let def: String = row.get(1);
                let upper = def.to_uppercase();
                IndexSchema {
                    is_unique: upper.contains("UNIQUE"),
                    is_primary: name.ends_with("_pkey") || upper.contains("PRIMARY KEY"),
                    columns: parse_index_columns(&def),
                    definition: Some(def),
                    name,
                }
            })
            .collect())
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        let client = self.client("counting rows").await?;
        let sql = format!(
            "SELECT COUNT(*) FROM {}",
            qualified(Engine::Postgres, &self.schema, table)
        );
        let row = client.query_one(sql.as_str(), &[]).await?;
        Ok(row.get::<_, i64>(0))
    }

    async fn fetch_rows(&self, table: &str, columns: &[ColumnSchema]) -> Result<Vec<RowData>> {
        if columns.is_empty() {
            return Ok(Vec::new());
        }

        let client = self.client("fetching rows").await?;

        let col_list = columns
            .iter()
            .map(|c| quote_ident(Engine::Postgres, &c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {} FROM {} ORDER BY {}",
            col_list,
            qualified(Engine::Postgres, &self.schema, table),
            quote_ident(Engine::Postgres, &columns[0].name)
        );

        let rows = client.query(sql.as_str(), &[]).await?;

        let mut result = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut record = RowData::new();
            for (idx, col) in columns.iter().enumerate() {
                record.insert(col.name.clone(), pg_cell_to_json(row, idx));
            }
            result.push(record);
        }

        debug!("Fetched {} rows from {}", result.len(), table);
        Ok(result)
    }

    async fn count_orphans(&self, check: &FkCheck) -> Result<i64> {
        let client = self.client("counting orphans").await?;

        let sql = format!(
            "SELECT COUNT(*) FROM {} t LEFT JOIN {} r ON t.{} = r.{} WHERE r.{} IS NULL",
            qualified(Engine::Postgres, &self.schema, &check.table),
            qualified(Engine::Postgres, &self.schema, &check.ref_table),
            quote_ident(Engine::Postgres, &check.column),
            quote_ident(Engine::Postgres, &check.ref_column),
            quote_ident(Engine::Postgres, &check.ref_column),
        );

        let row = client.query_one(sql.as_str(), &[]).await?;
        Ok(row.get::<_, i64>(0))
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        let client = self.client("executing statement").await?;
        Ok(client.execute(sql, &[]).await?)
    }

    async fn query_count(&self, sql: &str) -> Result<u64> {
        let client = self.client("executing query").await?;
        let rows = client.query(sql, &[]).await?;
        Ok(rows.len() as u64)
    }
}

/// Coerce one cell to a JSON-safe scalar.
///
/// Null stays null; booleans, integers and floats pass through; dates,
/// UUIDs, decimals and binary become their canonical string form.
fn pg_cell_to_json(row: &tokio_postgres::Row, idx: usize) -> serde_json::Value {
    use serde_json::Value;

    let col_type = row.columns()[idx].type_();

    match *col_type {
        Type::BOOL => row
            .get::<_, Option<bool>>(idx)
            .map(Value::Bool)
            .unwrap_or(Value::Null),
        Type::INT2 => row
            .get::<_, Option<i16>>(idx)
            .map(|v| Value::from(v as i64))
            .unwrap_or(Value::Null),
        Type::INT4 => row
            .get::<_, Option<i32>>(idx)
            .map(|v| Value::from(v as i64))
            .unwrap_or(Value::Null),
        Type::INT8 => row
            .get::<_, Option<i64>>(idx)
            .map(Value::from)
            .unwrap_or(Value::Null),
        Type::FLOAT4 => row
            .get::<_, Option<f32>>(idx)
            .map(|v| json_float(v as f64))
            .unwrap_or(Value::Null),
        Type::FLOAT8 => row
            .get::<_, Option<f64>>(idx)
            .map(json_float)
            .unwrap_or(Value::Null),
        Type::NUMERIC => row
            .get::<_, Option<rust_decimal::Decimal>>(idx)
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => row
            .get::<_, Option<String>>(idx)
            .map(Value::String)
            .unwrap_or(Value::Null),
        Type::DATE => row
            .get::<_, Option<NaiveDate>>(idx)
            .map(|v| Value::String(v.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null),
        Type::TIME => row
            .get::<_, Option<NaiveTime>>(idx)
            .map(|v| Value::String(v.format("%H:%M:%S%.f").to_string()))
            .unwrap_or(Value::Null),
        Type::TIMESTAMP => row
            .get::<_, Option<NaiveDateTime>>(idx)
            .map(|v| Value::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
            .unwrap_or(Value::Null),
        Type::TIMESTAMPTZ => row
            .get::<_, Option<DateTime<Utc>>>(idx)
            .map(|v| Value::String(v.to_rfc3339()))
            .unwrap_or(Value::Null),
        Type::UUID => row
            .get::<_, Option<Uuid>>(idx)
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),
        Type::JSON | Type::JSONB => row
            .get::<_, Option<serde_json::Value>>(idx)
            .unwrap_or(Value::Null),
        Type::BYTEA => row
            .get::<_, Option<Vec<u8>>>(idx)
            .map(|v| Value::String(to_hex(&v)))
            .unwrap_or(Value::Null),
        _ => {
            // Unknown type: try text, otherwise record null
            match row.try_get::<_, Option<String>>(idx) {
                Ok(Some(s)) => Value::String(s),
                Ok(None) => Value::Null,
                Err(_) => {
                    warn!(
                        "Cannot coerce column '{}' of type {} to JSON; storing null",
                        row.columns()[idx].name(),
                        col_type
                    );
                    Value::Null
                }
            }
        }
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

/// Extract covered column names from a `CREATE INDEX` definition.
fn parse_index_columns(definition: &str) -> Vec<String> {
    let Some(start) = definition.find('(') else {
        return Vec::new();
    };
    let Some(end) = definition.rfind(')') else {
        return Vec::new();
    };
    if end <= start {
        return Vec::new();
    }

    definition[start + 1..end]
        .split(',')
        .map(|c| c.trim().trim_matches('"').to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

struct NoVerifier;

impl rustls::client::danger::ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ECDSA_NISTP521_SHA512,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
            rustls::SignatureScheme::ED25519,
        ]
    }
}

impl std::fmt::Debug for NoVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("NoVerifier")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_index_columns_simple() {
        let def = "CREATE INDEX idx_owners_last_name ON petclinic.owners USING btree (last_name)";
        assert_eq!(parse_index_columns(def), vec!["last_name"]);
    }

    #[test]
    fn test_parse_index_columns_composite() {
        let def = "CREATE UNIQUE INDEX vet_specialties_pkey ON petclinic.vet_specialties \
                   USING btree (vet_id, specialty_id)";
        assert_eq!(parse_index_columns(def), vec!["vet_id", "specialty_id"]);
    }

    #[test]
    fn test_parse_index_columns_quoted() {
        let def = "CREATE INDEX i ON s.t USING btree (\"Mixed Case\")";
        assert_eq!(parse_index_columns(def), vec!["Mixed Case"]);
    }

    #[test]
    fn test_parse_index_columns_malformed() {
        assert!(parse_index_columns("no parens here").is_empty());
    }

    #[test]
    fn test_to_hex() {
        assert_eq!(to_hex(&[0x00, 0xff, 0x10]), "00ff10");
        assert_eq!(to_hex(&[]), "");
    }

    #[test]
    fn test_json_float_regular_and_nan() {
        assert_eq!(json_float(1.5), serde_json::json!(1.5));
        // NaN is not representable as a JSON number; falls back to string
        assert!(json_float(f64::NAN).is_string());
    }
}
