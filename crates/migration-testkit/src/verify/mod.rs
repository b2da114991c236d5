//! Migration verification: baseline vs live database.
//!
//! The [`Verifier`] loads a previously captured baseline, re-captures the
//! current state with the same extraction logic, and compares the two across
//! five independent checks. Only two conditions are fatal by design: a table
//! losing rows and an orphaned foreign key. Everything else that drifts is
//! surfaced as a warning and left to a human.

mod checks;
mod types;

pub use checks::{
    check_checksums, check_row_counts, check_schemas, check_table_existence,
    classify_orphan_count, fk_checks_from_snapshot,
};
pub use types::{CheckStatus, ComparisonReport, Outcome, Totals, Verdict};

use std::collections::BTreeSet;

use tracing::info;

use crate::catalog::{CatalogIntrospector, FkCheck};
use crate::config::EnvConfig;
use crate::error::Result;
use crate::snapshot::{Snapshot, Snapshotter};

/// Compare two snapshots across the four snapshot-only checks.
///
/// Referential integrity runs against the live database and is appended
/// separately; see [`Verifier::verify`].
pub fn compare(baseline: &Snapshot, current: &Snapshot) -> ComparisonReport {
    let mut report = ComparisonReport::new();
    report.extend(check_table_existence(baseline, current));
    report.extend(check_row_counts(baseline, current));
    report.extend(check_checksums(baseline, current));
    report.extend(check_schemas(baseline, current));
    report
}

/// Runs the full verification workflow against one live database.
pub struct Verifier<'a> {
    db: &'a dyn CatalogIntrospector,
    snapshotter: Snapshotter<'a>,
}

impl<'a> Verifier<'a> {
    /// Build a verifier for one environment.
    pub fn new(db: &'a dyn CatalogIntrospector, env_name: &str, env: &EnvConfig) -> Self {
        Self {
            db,
            snapshotter: Snapshotter::new(db, env_name, env),
        }
    }

    /// Re-capture current state, restricted to the union of tables named in
    /// the baseline and tables currently present, so newly-added tables are
    /// detected rather than silently ignored.
    pub async fn capture_current(&self, baseline: &Snapshot) -> Result<Snapshot> {
        let mut tables: BTreeSet<String> =
            baseline.table_names().map(str::to_string).collect();
        tables.extend(self.db.list_tables().await?);

        let table_list: Vec<String> = tables.into_iter().collect();
        self.snapshotter.capture(Some(&table_list)).await
    }

    /// Run the referential-integrity checks against the live database.
    ///
    /// A check whose query errors produces a failed verdict rather than
    /// aborting the batch.
    pub async fn check_referential_integrity(&self, checks: &[FkCheck]) -> Vec<Verdict> {
        let mut verdicts = Vec::with_capacity(checks.len());
        for check in checks {
            let outcome = self
                .db
                .count_orphans(check)
                .await
                .map_err(|e| e.to_string());
            verdicts.push(classify_orphan_count(check, outcome));
        }
        verdicts
    }

    /// Full verification: capture current state, run all five checks.
    ///
    /// When `fk_checks` is `None`, the referential checks are derived from
    /// the baseline's captured foreign-key metadata.
    pub async fn verify(
        &self,
        baseline: &Snapshot,
        fk_checks: Option<&[FkCheck]>,
    ) -> Result<ComparisonReport> {
        info!(
            "Verifying against baseline captured {} from {}",
            baseline.metadata.snapshot_date, baseline.metadata.database
        );

        let current = self.capture_current(baseline).await?;

        let mut report = compare(baseline, &current);

        let derived;
        let checks = match fk_checks {
            Some(checks) => checks,
            None => {
                derived = fk_checks_from_snapshot(baseline);
                &derived[..]
            }
        };

        if checks.is_empty() {
            info!("No referential-integrity checks to run (baseline carries no FK metadata)");
        } else {
            report.extend(self.check_referential_integrity(checks).await);
        }

        let totals = report.totals();
        info!(
            "Verification finished: {} passed, {} warnings, {} failed",
            totals.passed, totals.warnings, totals.failed
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RowData;
    use crate::snapshot::{SnapshotMetadata, TableCapture};
    use chrono::Utc;
    use serde_json::json;

    fn row(pairs: &[(&str, serde_json::Value)]) -> RowData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    /// Three-table pet-clinic style snapshot: 2 types, 5 owners, 5 pets
    /// with valid owner references.
    fn three_table_snapshot() -> Snapshot {
        let mut snapshot = Snapshot::new(SnapshotMetadata {
            snapshot_date: Utc::now(),
            database: "petclinic".to_string(),
            host: "localhost".to_string(),
            environment: "test".to_string(),
        });

        let types = vec![
            row(&[("id", json!(1)), ("name", json!("cat"))]),
            row(&[("id", json!(2)), ("name", json!("dog"))]),
        ];
        snapshot.tables.insert(
            "types".to_string(),
            TableCapture::new(vec!["id".to_string(), "name".to_string()], types),
        );

        let owners = (1..=5)
            .map(|i| {
                row(&[
                    ("id", json!(i)),
                    ("last_name", json!(format!("Owner{}", i))),
                ])
            })
            .collect();
        snapshot.tables.insert(
            "owners".to_string(),
            TableCapture::new(vec!["id".to_string(), "last_name".to_string()], owners),
        );

        let pets = (1..=5)
            .map(|i| {
                row(&[
                    ("id", json!(i)),
                    ("name", json!(format!("Pet{}", i))),
                    ("owner_id", json!(i)),
                    ("type_id", json!(1 + i % 2)),
                ])
            })
            .collect();
        snapshot.tables.insert(
            "pets".to_string(),
            TableCapture::new(
                vec![
                    "id".to_string(),
                    "name".to_string(),
                    "owner_id".to_string(),
                    "type_id".to_string(),
                ],
                pets,
            ),
        );

        snapshot.foreign_keys.insert(
            "pets".to_string(),
            vec![
                crate::catalog::ForeignKeySchema {
                    name: "fk_pets_owners".to_string(),
                    column: "owner_id".to_string(),
                    ref_table: "owners".to_string(),
                    ref_column: "id".to_string(),
                },
                crate::catalog::ForeignKeySchema {
                    name: "fk_pets_types".to_string(),
                    column: "type_id".to_string(),
                    ref_table: "types".to_string(),
                    ref_column: "id".to_string(),
                },
            ],
        );

        snapshot
    }

    #[test]
    fn test_end_to_end_identical_capture_all_pass() {
        let baseline = three_table_snapshot();
        let current = three_table_snapshot();

        let mut report = compare(&baseline, &current);

        // The referential checks run against the live database; with no
        // orphans every derived check classifies as passed
        let fk_checks = fk_checks_from_snapshot(&baseline);
        assert_eq!(fk_checks.len(), 2);
        report.extend(
            fk_checks
                .iter()
                .map(|check| classify_orphan_count(check, Ok(0))),
        );

        let totals = report.totals();

        // 1 existence + 3 row counts + 3 checksums + 3 schemas + 2 FK checks
        assert_eq!(totals.passed, 12);
        assert_eq!(totals.warnings, 0);
        assert_eq!(totals.failed, 0);
        assert_eq!(report.outcome(), Outcome::Verified);
    }

    #[test]
    fn test_end_to_end_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("baseline.json");

        let baseline = three_table_snapshot();
        baseline.save(&path).unwrap();
        let reloaded = Snapshot::load(&path).unwrap();

        let report = compare(&reloaded, &three_table_snapshot());
        assert_eq!(report.outcome(), Outcome::Verified);
    }

    #[test]
    fn test_table_removal_fails_overall_despite_other_passes() {
        let mut baseline = three_table_snapshot();
        baseline.tables.insert(
            "visits".to_string(),
            TableCapture::new(vec!["id".to_string()], vec![]),
        );
        let current = three_table_snapshot();

        let report = compare(&baseline, &current);

        let removal_failures: Vec<_> = report
            .verdicts
            .iter()
            .filter(|v| v.status == CheckStatus::Failed)
            .collect();
        assert_eq!(removal_failures.len(), 1);
        assert_eq!(removal_failures[0].check, "Table Existence - visits");
        assert_eq!(report.outcome(), Outcome::Failed);
    }

    #[test]
    fn test_drifted_content_verifies_with_warnings() {
        let baseline = three_table_snapshot();
        let mut current = three_table_snapshot();
        if let Some(capture) = current.tables.get_mut("owners") {
            capture.data[0].insert("last_name".to_string(), json!("Changed"));
        }

        let report = compare(&baseline, &current);
        assert_eq!(report.outcome(), Outcome::VerifiedWithWarnings);
        assert_eq!(report.totals().failed, 0);
    }
}
