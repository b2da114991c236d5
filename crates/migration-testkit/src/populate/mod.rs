//! Synthetic test data population for the two sample application schemas.
//!
//! Seeding is plan-based: [`seed_plan`] generates the full ordered list of
//! INSERT statements for a profile/engine pair from a seeded RNG, and the
//! [`Populator`] executes it table by table. Generation being pure makes the
//! plans testable without a database, and the RNG seed makes repeat runs
//! reproducible.
//!
//! Clearing deletes child tables before parents so foreign keys never block
//! the sweep. Individual statement failures are warnings, not aborts, to
//! match how the capture side treats per-table trouble.

mod bookstore;
mod petclinic;

use std::collections::BTreeMap;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::catalog::{qualified, CatalogIntrospector};
use crate::config::Engine;
use crate::error::{Result, TestkitError};

/// Which sample application's schema to populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Pet-clinic service: types, specialties, owners, vets, pets, visits.
    PetClinic,
    /// Book-rental service: genres, authors, customers, books, stocks.
    BookStore,
}

impl Profile {
    /// Tables in insert order (parents before children).
    pub fn seed_order(&self) -> &'static [&'static str] {
        match self {
            Profile::PetClinic => &[
                "types",
                "specialties",
                "owners",
                "vets",
                "vet_specialties",
                "pets",
                "visits",
            ],
            Profile::BookStore => &["Genres", "Authors", "Customers", "Books", "Stocks"],
        }
    }

    /// Tables in delete order (children before parents).
    pub fn clear_order(&self) -> &'static [&'static str] {
        match self {
            Profile::PetClinic => &[
                "visits",
                "pets",
                "vet_specialties",
                "vets",
                "owners",
                "specialties",
                "types",
            ],
            Profile::BookStore => &["Rentals", "Stocks", "Books", "Customers", "Authors", "Genres"],
        }
    }
}

impl FromStr for Profile {
    type Err = TestkitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "petclinic" | "pet-clinic" | "pet_clinic" => Ok(Profile::PetClinic),
            "bookstore" | "book-store" | "book_store" => Ok(Profile::BookStore),
            other => Err(TestkitError::Config(format!(
                "Unknown profile '{}'. Supported profiles: petclinic, bookstore",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Profile::PetClinic => f.write_str("petclinic"),
            Profile::BookStore => f.write_str("bookstore"),
        }
    }
}

/// Everything needed to seed one table.
#[derive(Debug, Clone)]
pub struct TableSeed {
    /// Table name.
    pub table: String,

    /// Row count the table should end up with; tables already at or above
    /// this are skipped.
    pub expected: usize,

    /// INSERT statements, one row each.
    pub statements: Vec<String>,
}

/// Generate the full seed plan for a profile against one engine.
///
/// The same `(profile, engine, schema, count, seed)` tuple always produces
/// the same plan.
pub fn seed_plan(
    profile: Profile,
    engine: Engine,
    schema: &str,
    count: usize,
    seed: u64,
) -> Vec<TableSeed> {
    let mut rng = StdRng::seed_from_u64(seed);
    match profile {
        Profile::PetClinic => petclinic::seed_plan(engine, schema, count, &mut rng),
        Profile::BookStore => bookstore::seed_plan(engine, schema, count, &mut rng),
    }
}

/// Result of a populate run.
#[derive(Debug, Clone, Default)]
pub struct PopulateSummary {
    /// Rows inserted per table.
    pub inserted: BTreeMap<String, usize>,

    /// Rows deleted per table (clear runs).
    pub deleted: BTreeMap<String, u64>,

    /// Tables skipped because they already held enough rows.
    pub skipped: Vec<String>,

    /// Individual statement failures that were tolerated.
    pub warnings: usize,
}

impl PopulateSummary {
    pub fn total_inserted(&self) -> usize {
        self.inserted.values().sum()
    }

    pub fn total_deleted(&self) -> u64 {
        self.deleted.values().sum()
    }
}

/// Seeds and clears sample-application tables.
pub struct Populator<'a> {
    db: &'a dyn CatalogIntrospector,
    profile: Profile,
}

impl<'a> Populator<'a> {
    pub fn new(db: &'a dyn CatalogIntrospector, profile: Profile) -> Self {
        Self { db, profile }
    }

    /// Delete all rows from the profile's tables, children first.
    ///
    /// On SQL Server, identity seeds are reset afterwards when permissions
    /// allow; failures there are reduced to warnings like the rest.
    pub async fn clear(&self) -> Result<PopulateSummary> {
        let mut summary = PopulateSummary::default();

        for table in self.profile.clear_order() {
            let target = qualified(self.db.engine(), self.db.schema(), table);
            match self.db.execute(&format!("DELETE FROM {}", target)).await {
                Ok(deleted) => {
                    info!("  Deleted {} rows from {}", deleted, table);
                    summary.deleted.insert(table.to_string(), deleted);
                }
                Err(e) => {
                    warn!("  Could not delete from {}: {}", table, e);
                    summary.warnings += 1;
                }
            }
        }

        if self.db.engine() == Engine::Mssql {
            for table in self.profile.clear_order() {
                let target = qualified(Engine::Mssql, self.db.schema(), table);
                let sql = format!("DBCC CHECKIDENT ('{}', RESEED, 0)", target);
                if let Err(e) = self.db.execute(&sql).await {
                    warn!(
                        "  Could not reset identity seed on {} (requires elevated permissions): {}",
                        table, e
                    );
                    summary.warnings += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Seed the profile's tables with `count` synthetic records per table
    /// (smaller fixed pools for lookup tables).
    pub async fn seed(&self, count: usize, seed: u64) -> Result<PopulateSummary> {
        let plan = seed_plan(
            self.profile,
            self.db.engine(),
            self.db.schema(),
            count,
            seed,
        );

        let mut summary = PopulateSummary::default();

        for table_seed in plan {
            let existing = self.db.row_count(&table_seed.table).await.unwrap_or(0);
            if existing as usize >= table_seed.expected {
                info!(
                    "  {} already has {} records, skipping",
                    table_seed.table, existing
                );
                summary.skipped.push(table_seed.table.clone());
                continue;
            }

            let mut inserted = 0usize;
            for sql in &table_seed.statements {
                match self.db.execute(sql).await {
                    Ok(_) => inserted += 1,
                    Err(e) => {
                        warn!("  Could not insert into {}: {}", table_seed.table, e);
                        summary.warnings += 1;
                    }
                }
            }

            info!("  Seeded {} rows into {}", inserted, table_seed.table);
            summary.inserted.insert(table_seed.table.clone(), inserted);
        }

        info!(
            "Populate finished: {} rows inserted, {} tables skipped, {} warnings",
            summary.total_inserted(),
            summary.skipped.len(),
            summary.warnings
        );

        Ok(summary)
    }
}

/// Engine-correct boolean literal.
pub(crate) fn bool_literal(engine: Engine, value: bool) -> &'static str {
    match engine {
        Engine::Postgres => {
            if value {
                "TRUE"
            } else {
                "FALSE"
            }
        }
        Engine::Mssql => {
            if value {
                "1"
            } else {
                "0"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::from_str("petclinic").unwrap(), Profile::PetClinic);
        assert_eq!(Profile::from_str("book-store").unwrap(), Profile::BookStore);
        assert!(Profile::from_str("webshop").is_err());
    }

    #[test]
    fn test_clear_order_is_child_first() {
        let order = Profile::PetClinic.clear_order();
        let pos = |t: &str| order.iter().position(|x| *x == t).unwrap();
        assert!(pos("visits") < pos("pets"));
        assert!(pos("pets") < pos("owners"));
        assert!(pos("pets") < pos("types"));

        let order = Profile::BookStore.clear_order();
        let pos = |t: &str| order.iter().position(|x| *x == t).unwrap();
        assert!(pos("Stocks") < pos("Books"));
        assert!(pos("Books") < pos("Authors"));
    }

    #[test]
    fn test_seed_order_is_parent_first() {
        let order = Profile::PetClinic.seed_order();
        let pos = |t: &str| order.iter().position(|x| *x == t).unwrap();
        assert!(pos("owners") < pos("pets"));
        assert!(pos("types") < pos("pets"));
        assert!(pos("pets") < pos("visits"));
    }

    #[test]
    fn test_seed_plan_is_deterministic() {
        let a = seed_plan(Profile::PetClinic, Engine::Postgres, "petclinic", 10, 42);
        let b = seed_plan(Profile::PetClinic, Engine::Postgres, "petclinic", 10, 42);
        let flatten = |plan: &[TableSeed]| {
            plan.iter()
                .flat_map(|t| t.statements.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(flatten(&a), flatten(&b));
    }

    #[test]
    fn test_seed_plan_varies_with_seed() {
        let a = seed_plan(Profile::PetClinic, Engine::Postgres, "petclinic", 10, 1);
        let b = seed_plan(Profile::PetClinic, Engine::Postgres, "petclinic", 10, 2);
        let flatten = |plan: &[TableSeed]| {
            plan.iter()
                .flat_map(|t| t.statements.clone())
                .collect::<Vec<_>>()
        };
        assert_ne!(flatten(&a), flatten(&b));
    }

    #[test]
    fn test_bool_literal_per_engine() {
        assert_eq!(bool_literal(Engine::Postgres, true), "TRUE");
        assert_eq!(bool_literal(Engine::Mssql, true), "1");
        assert_eq!(bool_literal(Engine::Mssql, false), "0");
    }
}
