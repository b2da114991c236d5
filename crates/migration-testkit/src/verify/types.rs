//! Comparison report types.

use serde::{Deserialize, Serialize};

/// Outcome of one named check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Warning,
    Failed,
}

impl CheckStatus {
    /// Console symbol used in report lines.
    pub fn symbol(&self) -> &'static str {
        match self {
            CheckStatus::Passed => "✓",
            CheckStatus::Warning => "⚠",
            CheckStatus::Failed => "✗",
        }
    }
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CheckStatus::Passed => "PASSED",
            CheckStatus::Warning => "WARNING",
            CheckStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// One named check result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Check name, e.g. "Row Count - owners".
    pub check: String,

    /// Pass/warn/fail status.
    pub status: CheckStatus,

    /// Human-readable detail.
    pub message: String,
}

impl Verdict {
    pub fn passed(check: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            status: CheckStatus::Passed,
            message: message.into(),
        }
    }

    pub fn warning(check: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            status: CheckStatus::Warning,
            message: message.into(),
        }
    }

    pub fn failed(check: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            status: CheckStatus::Failed,
            message: message.into(),
        }
    }

    /// Render the report line for this verdict.
    pub fn render(&self) -> String {
        format!(
            "{} {}: {} - {}",
            self.status.symbol(),
            self.check,
            self.status,
            self.message
        )
    }
}

/// Tallies across all verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Totals {
    pub passed: usize,
    pub warnings: usize,
    pub failed: usize,
}

/// Overall migration verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Every check passed.
    Verified,
    /// No failures, but at least one warning.
    VerifiedWithWarnings,
    /// At least one failed check.
    Failed,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Outcome::Verified => "MIGRATION VERIFICATION PASSED",
            Outcome::VerifiedWithWarnings => "MIGRATION VERIFIED WITH WARNINGS",
            Outcome::Failed => "MIGRATION VERIFICATION FAILED",
        };
        f.write_str(s)
    }
}

/// A full comparison report: every verdict from every check, in the order
/// the checks ran. Built fresh on every verification run, never persisted
/// back into a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub verdicts: Vec<Verdict>,
}

impl ComparisonReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, verdict: Verdict) {
        self.verdicts.push(verdict);
    }

    pub fn extend(&mut self, verdicts: impl IntoIterator<Item = Verdict>) {
        self.verdicts.extend(verdicts);
    }

    /// Count verdicts by status.
    pub fn totals(&self) -> Totals {
        let mut totals = Totals::default();
        for v in &self.verdicts {
            match v.status {
                CheckStatus::Passed => totals.passed += 1,
                CheckStatus::Warning => totals.warnings += 1,
                CheckStatus::Failed => totals.failed += 1,
            }
        }
        totals
    }

    /// The overall verdict: any failure fails the whole report; warnings
    /// alone downgrade but do not block.
    pub fn outcome(&self) -> Outcome {
        let totals = self.totals();
        if totals.failed > 0 {
            Outcome::Failed
        } else if totals.warnings > 0 {
            Outcome::VerifiedWithWarnings
        } else {
            Outcome::Verified
        }
    }

    /// Whether the report maps to process exit code 0.
    pub fn is_success(&self) -> bool {
        self.outcome() != Outcome::Failed
    }

    /// Verdicts with failed status, for the error recap section.
    pub fn failures(&self) -> impl Iterator<Item = &Verdict> {
        self.verdicts
            .iter()
            .filter(|v| v.status == CheckStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_line_format() {
        let v = Verdict::passed("Row Count - owners", "10 rows (unchanged)");
        assert_eq!(v.render(), "✓ Row Count - owners: PASSED - 10 rows (unchanged)");

        let v = Verdict::failed("Table Existence - visits", "TABLE REMOVED!");
        assert_eq!(
            v.render(),
            "✗ Table Existence - visits: FAILED - TABLE REMOVED!"
        );

        let v = Verdict::warning("Checksum - pets", "Data modified (row count changed)");
        assert!(v.render().starts_with("⚠ Checksum - pets: WARNING"));
    }

    #[test]
    fn test_totals_count_by_status() {
        let mut report = ComparisonReport::new();
        report.push(Verdict::passed("a", ""));
        report.push(Verdict::passed("b", ""));
        report.push(Verdict::warning("c", ""));
        report.push(Verdict::failed("d", ""));

        let totals = report.totals();
        assert_eq!(totals.passed, 2);
        assert_eq!(totals.warnings, 1);
        assert_eq!(totals.failed, 1);
    }

    #[test]
    fn test_outcome_failure_dominates() {
        let mut report = ComparisonReport::new();
        report.push(Verdict::passed("a", ""));
        report.push(Verdict::warning("b", ""));
        report.push(Verdict::failed("c", ""));
        assert_eq!(report.outcome(), Outcome::Failed);
        assert!(!report.is_success());
    }

    #[test]
    fn test_outcome_warnings_do_not_block() {
        let mut report = ComparisonReport::new();
        report.push(Verdict::passed("a", ""));
        report.push(Verdict::warning("b", ""));
        assert_eq!(report.outcome(), Outcome::VerifiedWithWarnings);
        assert!(report.is_success());
    }

    #[test]
    fn test_outcome_all_passed() {
        let mut report = ComparisonReport::new();
        report.push(Verdict::passed("a", ""));
        assert_eq!(report.outcome(), Outcome::Verified);
    }

    #[test]
    fn test_empty_report_is_verified() {
        assert_eq!(ComparisonReport::new().outcome(), Outcome::Verified);
    }
}
