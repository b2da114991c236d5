//! # migration-testkit
//!
//! Operational tooling for migration testing of two sample applications (a
//! pet-clinic service and a book-rental service) across PostgreSQL and SQL
//! Server backends:
//!
//! - **Snapshots**: capture a database (rows, schema, foreign keys, indexes,
//!   content checksums) into a single JSON document
//! - **Verification**: compare a baseline snapshot against live state across
//!   five independent checks with a pass/warn/fail report
//! - **Population**: seed or clear the sample-app tables with synthetic data
//! - **Load testing**: fire concurrent SQL operations from a worker pool and
//!   report latency/throughput statistics
//! - **Smoke testing**: probe a running web app's URL patterns over HTTP
//!
//! ## Example
//!
//! ```rust,no_run
//! use migration_testkit::{Config, Database, Snapshot, Snapshotter, Verifier};
//!
//! #[tokio::main]
//! async fn main() -> migration_testkit::Result<()> {
//!     let config = Config::load("testkit.yaml")?;
//!     let env = config.environment("target")?;
//!     let db = Database::connect(env).await?;
//!
//!     // Before the migration: capture a baseline
//!     let snapshotter = Snapshotter::new(&db, "target", env);
//!     let baseline = snapshotter.capture(None).await?;
//!     baseline.save("baseline_target.json")?;
//!
//!     // After the migration: verify against it
//!     let baseline = Snapshot::load("baseline_target.json")?;
//!     let verifier = Verifier::new(&db, "target", env);
//!     let report = verifier.verify(&baseline, None).await?;
//!     for verdict in &report.verdicts {
//!         println!("{}", verdict.render());
//!     }
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod loadtest;
pub mod populate;
pub mod smoke;
pub mod snapshot;
pub mod verify;

// Re-exports for convenient access
pub use catalog::{CatalogIntrospector, Database, FkCheck, MssqlCatalog, PostgresCatalog};
pub use config::{Config, EnvConfig, Engine};
pub use error::{Result, TestkitError};
pub use loadtest::{LoadTestOptions, LoadTestReport, TestMode};
pub use populate::{Populator, Profile};
pub use smoke::SmokeReport;
pub use snapshot::{Snapshot, SnapshotMetadata, Snapshotter, TableCapture};
pub use verify::{CheckStatus, ComparisonReport, Outcome, Verdict, Verifier};
