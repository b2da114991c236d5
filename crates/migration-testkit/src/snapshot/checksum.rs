//! Order-independent content checksums over table rows.
//!
//! Each row is serialized to its canonical JSON form (map keys sorted, which
//! `RowData`'s `BTreeMap` guarantees), the row strings are sorted
//! lexicographically, and the concatenation is hashed with SHA-256. The sort
//! step makes the digest independent of row fetch order.

use sha2::{Digest, Sha256};

use crate::catalog::RowData;

/// Compute the content checksum for a table's rows.
pub fn table_checksum(rows: &[RowData]) -> String {
    let mut row_strings: Vec<String> = rows.iter().map(canonical_row).collect();
    row_strings.sort();

    let mut hasher = Sha256::new();
    for row in &row_strings {
        hasher.update(row.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Canonical string form of one row.
///
/// Serializing a map of already-JSON values cannot fail; the fallback keeps
/// the function infallible without panicking in library code.
fn canonical_row(row: &RowData) -> String {
    serde_json::to_string(row).unwrap_or_default()
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

    fn pet_rows() -> Vec<RowData> {
        vec![
            row(&[
                ("id", json!(1)),
                ("name", json!("Leo")),
                ("owner_id", json!(1)),
            ]),
            row(&[
                ("id", json!(2)),
                ("name", json!("Basil")),
                ("owner_id", json!(2)),
            ]),
            row(&[
                ("id", json!(3)),
                ("name", json!("Rosy")),
                ("owner_id", json!(3)),
            ]),
        ]
    }

    #[test]
    fn test_checksum_is_order_independent() {
        let rows = pet_rows();
        let baseline = table_checksum(&rows);

        let mut reversed = rows.clone();
        reversed.reverse();
        assert_eq!(table_checksum(&reversed), baseline);

        let rotated = vec![rows[2].clone(), rows[0].clone(), rows[1].clone()];
        assert_eq!(table_checksum(&rotated), baseline);
    }

    #[test]
    fn test_checksum_stable_across_calls() {
        let rows = pet_rows();
        assert_eq!(table_checksum(&rows), table_checksum(&rows));
    }

    #[test]
    fn test_checksum_sensitive_to_numeric_change() {
        let mut rows = pet_rows();
        let baseline = table_checksum(&rows);
        rows[1].insert("owner_id".to_string(), json!(7));
        assert_ne!(table_checksum(&rows), baseline);
    }

    #[test]
    fn test_checksum_sensitive_to_string_change() {
        let mut rows = pet_rows();
        let baseline = table_checksum(&rows);
        rows[0].insert("name".to_string(), json!("Leopold"));
        assert_ne!(table_checksum(&rows), baseline);
    }

    #[test]
    fn test_checksum_distinguishes_null_from_empty_string() {
        let with_null = vec![row(&[("id", json!(1)), ("note", json!(null))])];
        let with_empty = vec![row(&[("id", json!(1)), ("note", json!(""))])];
        assert_ne!(table_checksum(&with_null), table_checksum(&with_empty));
    }

    #[test]
    fn test_checksum_of_empty_table() {
        let empty = table_checksum(&[]);
        // SHA-256 of the empty string
        assert_eq!(
            empty,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_checksum_sensitive_to_row_removal() {
        let rows = pet_rows();
        let baseline = table_checksum(&rows);
        assert_ne!(table_checksum(&rows[..2]), baseline);
    }
}
