//! The individual comparison checks.
//!
//! Each check is independent: no check's outcome affects another. The first
//! four operate purely on two snapshots; the referential-integrity check
//! runs against the live database and is classified here from its counted
//! result so the policy stays testable without a connection.
//!
//! Severity policy (deliberate, preserved from the operational procedure):
//! row-count decrease and orphaned foreign keys are fatal; checksum drift
//! and schema drift are warnings only.

use std::collections::BTreeSet;

use crate::catalog::FkCheck;
use crate::snapshot::{table_checksum, Snapshot};

use super::types::Verdict;

/// Check 1: table existence.
///
/// A table present in the baseline but absent now is fatal; a new table is
/// surfaced as a warning; equal sets collapse to one aggregate pass.
pub fn check_table_existence(baseline: &Snapshot, current: &Snapshot) -> Vec<Verdict> {
    let baseline_tables: BTreeSet<&str> = baseline.table_names().collect();
    let current_tables: BTreeSet<&str> = current.table_names().collect();

    let mut verdicts = Vec::new();

    for table in baseline_tables.difference(&current_tables) {
        verdicts.push(Verdict::failed(
            format!("Table Existence - {}", table),
            "TABLE REMOVED!",
        ));
    }

    for table in current_tables.difference(&baseline_tables) {
        verdicts.push(Verdict::warning(
            format!("Table Existence - {}", table),
            "New table added",
        ));
    }

    if verdicts.is_empty() {
        verdicts.push(Verdict::passed("Table Existence", "All tables preserved"));
    }

    verdicts
}

/// Check 2: row counts.
///
/// Row disappearance after a migration is never expected, so a negative
/// delta is the one fatal row-count outcome; growth is flagged for review.
pub fn check_row_counts(baseline: &Snapshot, current: &Snapshot) -> Vec<Verdict> {
    common_tables(baseline, current)
        .map(|table| {
            let before = baseline.tables[table].row_count;
            let after = current.tables[table].row_count;
            let diff = after - before;
            let check = format!("Row Count - {}", table);

            if diff == 0 {
                Verdict::passed(check, format!("{} rows (unchanged)", before))
            } else if diff < 0 {
                Verdict::failed(
                    check,
                    format!("{} → {} ({} rows - DATA LOSS!)", before, after, diff),
                )
            } else {
                Verdict::warning(check, format!("{} → {} (+{} rows)", before, after, diff))
            }
        })
        .collect()
}

/// Check 3: data checksums.
///
/// Checksums are recomputed from row data on both sides, so a baseline file
/// that predates checksum storage still verifies. Content drift alone is
/// never fatal; the message distinguishes whether the row count moved too.
pub fn check_checksums(baseline: &Snapshot, current: &Snapshot) -> Vec<Verdict> {
    common_tables(baseline, current)
        .map(|table| {
            let before = table_checksum(&baseline.tables[table].data);
            let after = table_checksum(&current.tables[table].data);
            let check = format!("Checksum - {}", table);

            if before == after {
                Verdict::passed(check, "Data unchanged")
            } else if baseline.tables[table].row_count != current.tables[table].row_count {
                Verdict::warning(check, "Data modified (row count changed)")
            } else {
                Verdict::warning(check, "Data modified (same count, different values)")
            }
        })
        .collect()
}

/// Check 4: schema shape.
///
/// Compares column-name sets, not full type metadata.
pub fn check_schemas(baseline: &Snapshot, current: &Snapshot) -> Vec<Verdict> {
    common_tables(baseline, current)
        .map(|table| {
            let before = &baseline.tables[table].columns;
            let after = &current.tables[table].columns;
            let check = format!("Schema - {}", table);

            if before.len() != after.len() {
                Verdict::warning(
                    check,
                    format!("Column count: {} → {}", before.len(), after.len()),
                )
            } else {
                let before_set: BTreeSet<&String> = before.iter().collect();
                let after_set: BTreeSet<&String> = after.iter().collect();
                if before_set != after_set {
                    Verdict::warning(check, "Column names differ")
                } else {
                    Verdict::passed(check, "Schema unchanged")
                }
            }
        })
        .collect()
}

/// Check 5 classification: turn one orphan count (or the query's own error)
/// into a verdict. Broken referential links indicate a corrupted migration
/// regardless of checksum state, so any orphan is fatal.
pub fn classify_orphan_count(
    check: &FkCheck,
    outcome: std::result::Result<i64, String>,
) -> Verdict {
    let name = format!("Referential Integrity - {}.{}", check.table, check.column);

    match outcome {
        Ok(0) => Verdict::passed(name, "No orphaned records"),
        Ok(orphans) => Verdict::failed(
            name,
            format!(
                "{} orphaned records found - {}.{} must reference a valid {}.{}",
                orphans, check.table, check.column, check.ref_table, check.ref_column
            ),
        ),
        Err(message) => Verdict::failed(name, format!("Check query failed: {}", message)),
    }
}

/// Derive referential-integrity checks from a snapshot's captured
/// foreign-key metadata.
pub fn fk_checks_from_snapshot(snapshot: &Snapshot) -> Vec<FkCheck> {
    let mut checks: Vec<FkCheck> = snapshot
        .foreign_keys
        .iter()
        .flat_map(|(table, fks)| {
            fks.iter().map(move |fk| {
                FkCheck::new(
                    table.clone(),
                    fk.column.clone(),
                    fk.ref_table.clone(),
                    fk.ref_column.clone(),
                )
            })
        })
        .collect();
    checks.sort();
    checks.dedup();
    checks
}

fn common_tables<'a>(
    baseline: &'a Snapshot,
    current: &'a Snapshot,
) -> impl Iterator<Item = &'a str> {
    // BTreeMap keys iterate sorted, so verdicts come out in table order
    baseline
        .table_names()
        .filter(move |t| current.tables.contains_key(*t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ForeignKeySchema, RowData};
    use crate::snapshot::{SnapshotMetadata, TableCapture};
    use crate::verify::types::CheckStatus;
    use chrono::Utc;
    use serde_json::json;

    fn row(pairs: &[(&str, serde_json::Value)]) -> RowData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn make_snapshot(tables: Vec<(&str, Vec<&str>, Vec<RowData>)>) -> Snapshot {
        let mut snapshot = Snapshot::new(SnapshotMetadata {
            snapshot_date: Utc::now(),
            database: "petclinic".to_string(),
            host: "localhost".to_string(),
            environment: "test".to_string(),
        });
        for (name, columns, rows) in tables {
            let capture =
                TableCapture::new(columns.iter().map(|c| c.to_string()).collect(), rows);
            snapshot.tables.insert(name.to_string(), capture);
        }
        snapshot
    }

    fn owners_rows(count: i64) -> Vec<RowData> {
        (1..=count)
            .map(|i| {
                row(&[
                    ("id", json!(i)),
                    ("first_name", json!(format!("Owner{}", i))),
                ])
            })
            .collect()
    }

    // ---- table existence ----

    #[test]
    fn test_existence_equal_sets_single_pass() {
        let baseline = make_snapshot(vec![("owners", vec!["id"], owners_rows(2))]);
        let current = make_snapshot(vec![("owners", vec!["id"], owners_rows(2))]);

        let verdicts = check_table_existence(&baseline, &current);
        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts[0].status, CheckStatus::Passed);
        assert_eq!(verdicts[0].check, "Table Existence");
    }

    #[test]
    fn test_existence_removed_table_is_fatal() {
        let baseline = make_snapshot(vec![
            ("owners", vec!["id"], owners_rows(2)),
            ("visits", vec!["id"], vec![]),
        ]);
        let current = make_snapshot(vec![("owners", vec!["id"], owners_rows(2))]);

        let verdicts = check_table_existence(&baseline, &current);
        let failed: Vec<_> = verdicts
            .iter()
            .filter(|v| v.status == CheckStatus::Failed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].check, "Table Existence - visits");
        assert!(failed[0].message.contains("TABLE REMOVED"));
    }

    #[test]
    fn test_existence_new_table_is_warning() {
        let baseline = make_snapshot(vec![("owners", vec!["id"], owners_rows(2))]);
        let current = make_snapshot(vec![
            ("owners", vec!["id"], owners_rows(2)),
            ("audit_log", vec!["id"], vec![]),
        ]);

        let verdicts = check_table_existence(&baseline, &current);
        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts[0].status, CheckStatus::Warning);
        assert!(verdicts[0].message.contains("New table"));
    }

    // ---- row counts ----

    #[test]
    fn test_row_count_unchanged_passes() {
        let baseline = make_snapshot(vec![("owners", vec!["id"], owners_rows(10))]);
        let current = make_snapshot(vec![("owners", vec!["id"], owners_rows(10))]);

        let verdicts = check_row_counts(&baseline, &current);
        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts[0].status, CheckStatus::Passed);
    }

    #[test]
    fn test_row_count_decrease_is_data_loss() {
        let baseline = make_snapshot(vec![("owners", vec!["id"], owners_rows(10))]);
        let current = make_snapshot(vec![("owners", vec!["id"], owners_rows(7))]);

        let verdicts = check_row_counts(&baseline, &current);
        assert_eq!(verdicts[0].status, CheckStatus::Failed);
        assert!(verdicts[0].message.contains("DATA LOSS"));
        assert!(verdicts[0].message.contains("10 → 7"));
    }

    #[test]
    fn test_row_count_increase_is_warning_with_delta() {
        let baseline = make_snapshot(vec![("owners", vec!["id"], owners_rows(10))]);
        let current = make_snapshot(vec![("owners", vec!["id"], owners_rows(15))]);

        let verdicts = check_row_counts(&baseline, &current);
        assert_eq!(verdicts[0].status, CheckStatus::Warning);
        assert!(verdicts[0].message.contains("+5"));
    }

    // ---- checksums ----

    #[test]
    fn test_checksum_identical_data_passes() {
        let baseline = make_snapshot(vec![("owners", vec!["id"], owners_rows(3))]);
        let current = make_snapshot(vec![("owners", vec!["id"], owners_rows(3))]);

        let verdicts = check_checksums(&baseline, &current);
        assert_eq!(verdicts[0].status, CheckStatus::Passed);
    }

    #[test]
    fn test_checksum_same_count_different_values_is_warning() {
        let baseline = make_snapshot(vec![("owners", vec!["id"], owners_rows(3))]);
        let mut modified = owners_rows(3);
        modified[1].insert("first_name".to_string(), json!("Renamed"));
        let current = make_snapshot(vec![("owners", vec!["id"], modified)]);

        let verdicts = check_checksums(&baseline, &current);
        assert_eq!(verdicts[0].status, CheckStatus::Warning);
        assert!(verdicts[0]
            .message
            .contains("same count, different values"));
    }

    #[test]
    fn test_checksum_count_changed_is_warning_never_failed() {
        let baseline = make_snapshot(vec![("owners", vec!["id"], owners_rows(3))]);
        let current = make_snapshot(vec![("owners", vec!["id"], owners_rows(5))]);

        let verdicts = check_checksums(&baseline, &current);
        assert_eq!(verdicts[0].status, CheckStatus::Warning);
        assert!(verdicts[0].message.contains("row count changed"));
    }

    #[test]
    fn test_checksum_ignores_row_order() {
        let baseline = make_snapshot(vec![("owners", vec!["id"], owners_rows(3))]);
        let mut shuffled = owners_rows(3);
        shuffled.reverse();
        let current = make_snapshot(vec![("owners", vec!["id"], shuffled)]);

        let verdicts = check_checksums(&baseline, &current);
        assert_eq!(verdicts[0].status, CheckStatus::Passed);
    }

    // ---- schema ----

    #[test]
    fn test_schema_unchanged_passes() {
        let baseline = make_snapshot(vec![("owners", vec!["id", "first_name"], vec![])]);
        let current = make_snapshot(vec![("owners", vec!["id", "first_name"], vec![])]);

        let verdicts = check_schemas(&baseline, &current);
        assert_eq!(verdicts[0].status, CheckStatus::Passed);
    }

    #[test]
    fn test_schema_column_count_change_shows_counts() {
        let baseline = make_snapshot(vec![("owners", vec!["id", "first_name"], vec![])]);
        let current = make_snapshot(vec![(
            "owners",
            vec!["id", "first_name", "email"],
            vec![],
        )]);

        let verdicts = check_schemas(&baseline, &current);
        assert_eq!(verdicts[0].status, CheckStatus::Warning);
        assert!(verdicts[0].message.contains("2 → 3"));
    }

    #[test]
    fn test_schema_renamed_column_same_count_is_warning() {
        let baseline = make_snapshot(vec![("owners", vec!["id", "first_name"], vec![])]);
        let current = make_snapshot(vec![("owners", vec!["id", "given_name"], vec![])]);

        let verdicts = check_schemas(&baseline, &current);
        assert_eq!(verdicts[0].status, CheckStatus::Warning);
        assert!(verdicts[0].message.contains("Column names differ"));
    }

    #[test]
    fn test_schema_reordered_columns_pass() {
        let baseline = make_snapshot(vec![("owners", vec!["id", "first_name"], vec![])]);
        let current = make_snapshot(vec![("owners", vec!["first_name", "id"], vec![])]);

        let verdicts = check_schemas(&baseline, &current);
        assert_eq!(verdicts[0].status, CheckStatus::Passed);
    }

    // ---- referential integrity ----

    #[test]
    fn test_orphans_zero_passes() {
        let check = FkCheck::new("visits", "pet_id", "pets", "id");
        let verdict = classify_orphan_count(&check, Ok(0));
        assert_eq!(verdict.status, CheckStatus::Passed);
        assert_eq!(verdict.check, "Referential Integrity - visits.pet_id");
    }

    #[test]
    fn test_single_orphan_is_fatal() {
        let check = FkCheck::new("visits", "pet_id", "pets", "id");
        let verdict = classify_orphan_count(&check, Ok(1));
        assert_eq!(verdict.status, CheckStatus::Failed);
        assert!(verdict.message.contains("1 orphaned records found"));
    }

    #[test]
    fn test_orphan_query_error_is_recorded_failure() {
        let check = FkCheck::new("visits", "pet_id", "pets", "id");
        let verdict =
            classify_orphan_count(&check, Err("relation \"visits\" does not exist".to_string()));
        assert_eq!(verdict.status, CheckStatus::Failed);
        assert!(verdict.message.contains("Check query failed"));
        assert!(verdict.message.contains("does not exist"));
    }

    // ---- FK derivation ----

    #[test]
    fn test_fk_checks_derived_from_snapshot_metadata() {
        let mut snapshot = make_snapshot(vec![("pets", vec!["id"], vec![])]);
        snapshot.foreign_keys.insert(
            "pets".to_string(),
            vec![
                ForeignKeySchema {
                    name: "fk_pets_owners".to_string(),
                    column: "owner_id".to_string(),
                    ref_table: "owners".to_string(),
                    ref_column: "id".to_string(),
                },
                ForeignKeySchema {
                    name: "fk_pets_types".to_string(),
                    column: "type_id".to_string(),
                    ref_table: "types".to_string(),
                    ref_column: "id".to_string(),
                },
            ],
        );

        let checks = fk_checks_from_snapshot(&snapshot);
        assert_eq!(checks.len(), 2);
        assert!(checks.contains(&FkCheck::new("pets", "owner_id", "owners", "id")));
        assert!(checks.contains(&FkCheck::new("pets", "type_id", "types", "id")));
    }

    #[test]
    fn test_fk_checks_empty_without_metadata() {
        let snapshot = make_snapshot(vec![("pets", vec!["id"], vec![])]);
        assert!(fk_checks_from_snapshot(&snapshot).is_empty());
    }
}
