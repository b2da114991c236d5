//! Randomly-selected SQL operations for the load test.
//!
//! Operation SQL is generated per (profile, engine) pair so the same test
//! mix runs against either backend. Write operations tag their rows with a
//! "Perf Test" marker so delete operations only ever remove load-test data.

use std::str::FromStr;

use rand::rngs::StdRng;
use rand::Rng;

use crate::catalog::{qualified, quote_ident};
use crate::config::Engine;
use crate::error::TestkitError;
use crate::populate::Profile;

/// What mix of operations the load test fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestMode {
    /// SELECTs only.
    Read,
    /// INSERTs only.
    Write,
    /// UPDATEs only.
    Update,
    /// DELETEs only (restricted to load-test rows).
    Delete,
    /// Weighted mix: 60% read, 20% insert, 10% update, 10% delete.
    Mixed,
}

impl FromStr for TestMode {
    type Err = TestkitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "read" | "select" => Ok(TestMode::Read),
            "write" | "insert" => Ok(TestMode::Write),
            "update" => Ok(TestMode::Update),
            "delete" => Ok(TestMode::Delete),
            "mixed" => Ok(TestMode::Mixed),
            other => Err(TestkitError::Config(format!(
                "Unknown test type '{}'. Supported: read, write, update, delete, mixed",
                other
            ))),
        }
    }
}

impl std::fmt::Display for TestMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TestMode::Read => "read",
            TestMode::Write => "write",
            TestMode::Update => "update",
            TestMode::Delete => "delete",
            TestMode::Mixed => "mixed",
        };
        f.write_str(s)
    }
}

/// One generated operation: a label for the report and the SQL to run.
#[derive(Debug, Clone)]
pub struct SqlOp {
    /// Report label, e.g. "SELECT_WITH_JOIN".
    pub label: String,

    /// The statement text.
    pub sql: String,

    /// True when the statement returns rows that must be drained.
    pub is_query: bool,
}

/// Pick the next operation for a worker.
pub fn next_operation(
    profile: Profile,
    engine: Engine,
    schema: &str,
    mode: TestMode,
    rng: &mut StdRng,
) -> SqlOp {
    let kind = match mode {
        TestMode::Read => OpKind::Select,
        TestMode::Write => OpKind::Insert,
        TestMode::Update => OpKind::Update,
        TestMode::Delete => OpKind::Delete,
        TestMode::Mixed => {
            let roll = rng.gen_range(0..100);
            if roll < 60 {
                OpKind::Select
            } else if roll < 80 {
                OpKind::Insert
            } else if roll < 90 {
                OpKind::Update
            } else {
                OpKind::Delete
            }
        }
    };

    match profile {
        Profile::PetClinic => petclinic_op(engine, schema, kind, rng),
        Profile::BookStore => bookstore_op(engine, schema, kind, rng),
    }
}

#[derive(Debug, Clone, Copy)]
enum OpKind {
    Select,
    Insert,
    Update,
    Delete,
}

/// `SELECT <cols> FROM <table> ORDER BY <order> ` limited to `n` rows, in
/// the engine's syntax.
fn select_top(engine: Engine, table: &str, order: &str, n: usize) -> String {
    match engine {
        Engine::Postgres => format!("SELECT * FROM {} ORDER BY {} LIMIT {}", table, order, n),
        Engine::Mssql => format!("SELECT TOP {} * FROM {} ORDER BY {}", n, table, order),
    }
}

/// Delete a single row matching `predicate`, in the engine's syntax.
fn delete_one(engine: Engine, table: &str, key: &str, predicate: &str) -> String {
    match engine {
        Engine::Postgres => format!(
            "DELETE FROM {} WHERE {} IN (SELECT {} FROM {} WHERE {} LIMIT 1)",
            table, key, key, table, predicate
        ),
        Engine::Mssql => format!("DELETE TOP (1) FROM {} WHERE {}", table, predicate),
    }
}

fn petclinic_op(engine: Engine, schema: &str, kind: OpKind, rng: &mut StdRng) -> SqlOp {
    let owners = qualified(engine, schema, "owners");
    let pets = qualified(engine, schema, "pets");
    let visits = qualified(engine, schema, "visits");
    let id = quote_ident(engine, "id");

    match kind {
        OpKind::Select => match rng.gen_range(0..4) {
            0 => SqlOp {
                label: "SELECT_TOP100".to_string(),
                sql: select_top(engine, &owners, &id, 100),
                is_query: true,
            },
            1 => SqlOp {
                label: "SELECT_BY_ID".to_string(),
                sql: format!(
                    "SELECT * FROM {} WHERE {} = {}",
                    owners,
                    id,
                    rng.gen_range(1..=1000)
                ),
                is_query: true,
            },
            2 => SqlOp {
                label: "SELECT_WITH_JOIN".to_string(),
                sql: select_top(
                    engine,
                    &format!(
                        "{} p INNER JOIN {} o ON p.{} = o.{}",
                        pets,
                        owners,
                        quote_ident(engine, "owner_id"),
                        id
                    ),
                    &format!("p.{}", id),
                    50,
                ),
                is_query: true,
            },
            _ => SqlOp {
                label: "SELECT_COUNT".to_string(),
                sql: format!("SELECT COUNT(*) FROM {}", visits),
                is_query: true,
            },
        },
        OpKind::Insert => SqlOp {
            label: "INSERT_OWNER".to_string(),
            sql: format!(
                "INSERT INTO {} (first_name, last_name, address, city, telephone) \
                 VALUES ('Perf', 'Test{}', '1 Load Lane', 'Madison', '608555{:04}')",
                owners,
                rng.gen_range(1..1_000_000),
                rng.gen_range(0..10_000)
            ),
            is_query: false,
        },
        OpKind::Update => SqlOp {
            label: "UPDATE_OWNER".to_string(),
            sql: format!(
                "UPDATE {} SET telephone = '608555{:04}' WHERE {} = {}",
                owners,
                rng.gen_range(0..10_000),
                id,
                rng.gen_range(1..=1000)
            ),
            is_query: false,
        },
        OpKind::Delete => SqlOp {
            label: "DELETE_OWNER".to_string(),
            sql: delete_one(engine, &owners, &id, "last_name LIKE 'Test%' AND first_name = 'Perf'"),
            is_query: false,
        },
    }
}

fn bookstore_op(engine: Engine, schema: &str, kind: OpKind, rng: &mut StdRng) -> SqlOp {
    let books = qualified(engine, schema, "Books");
    let authors = qualified(engine, schema, "Authors");
    let id = quote_ident(engine, "Id");

    match kind {
        OpKind::Select => match rng.gen_range(0..4) {
            0 => SqlOp {
                label: "SELECT_TOP100".to_string(),
                sql: select_top(engine, &books, &id, 100),
                is_query: true,
            },
            1 => SqlOp {
                label: "SELECT_BY_ID".to_string(),
                sql: format!(
                    "SELECT * FROM {} WHERE {} = {}",
                    books,
                    id,
                    rng.gen_range(1..=1000)
                ),
                is_query: true,
            },
            2 => SqlOp {
                label: "SELECT_WITH_JOIN".to_string(),
                sql: select_top(
                    engine,
                    &format!(
                        "{} b INNER JOIN {} a ON b.{} = a.{}",
                        books,
                        authors,
                        quote_ident(engine, "AuthorId"),
                        id
                    ),
                    &format!("b.{}", id),
                    50,
                ),
                is_query: true,
            },
            _ => SqlOp {
                label: "SELECT_COUNT".to_string(),
                sql: format!("SELECT COUNT(*) FROM {}", books),
                is_query: true,
            },
        },
        OpKind::Insert => SqlOp {
            label: "INSERT_BOOK".to_string(),
            sql: format!(
                "INSERT INTO {} (Title, AuthorId, Year, Price, Description, GenreId, IssueDate, \
                 Rating) VALUES ('Performance Test Book {}', {}, {}, {:.2}, \
                 'Performance test book description', 1, '2024-06-15', {})",
                books,
                rng.gen_range(1..1_000_000),
                rng.gen_range(1..=20),
                rng.gen_range(1900..=2025),
                rng.gen_range(1000..=10_000) as f64 / 100.0,
                rng.gen_range(1..=5)
            ),
            is_query: false,
        },
        OpKind::Update => SqlOp {
            label: "UPDATE_BOOK".to_string(),
            sql: format!(
                "UPDATE {} SET Price = {:.2} WHERE {} = {}",
                books,
                rng.gen_range(1000..=10_000) as f64 / 100.0,
                id,
                rng.gen_range(1..=1000)
            ),
            is_query: false,
        },
        OpKind::Delete => SqlOp {
            label: "DELETE_BOOK".to_string(),
            sql: delete_one(
                engine,
                &books,
                &id,
                "Title LIKE 'Performance Test Book%'",
            ),
            is_query: false,
        },
    }
}
