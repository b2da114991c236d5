//! Seed plan generation for the book-rental schema.
//!
//! Mirrors the pet-clinic generator but for the bookstore's tables: genres,
//! authors, customers, books, stocks. Rentals are created by the load test's
//! write operations, not by seeding.

use rand::rngs::StdRng;
use rand::Rng;
use uuid::Uuid;

use crate::catalog::{escape_literal, qualified};
use crate::config::Engine;

use super::{bool_literal, TableSeed};

const AUTHORS: &[(&str, &str)] = &[
    ("William", "Shakespeare"),
    ("Jane", "Austen"),
    ("Charles", "Dickens"),
    ("Mark", "Twain"),
    ("Ernest", "Hemingway"),
    ("F. Scott", "Fitzgerald"),
    ("George", "Orwell"),
    ("J.K.", "Rowling"),
    ("Stephen", "King"),
    ("Agatha", "Christie"),
    ("Leo", "Tolstoy"),
    ("Fyodor", "Dostoevsky"),
    ("Virginia", "Woolf"),
    ("James", "Joyce"),
    ("Franz", "Kafka"),
    ("Gabriel Garcia", "Marquez"),
    ("Haruki", "Murakami"),
    ("Margaret", "Atwood"),
    ("Toni", "Morrison"),
    ("Chinua", "Achebe"),
];

const TITLE_TEMPLATES: &[&str] = &[
    "The Art of {}",
    "Understanding {}",
    "A History of {}",
    "Essays on {}",
    "The Complete Guide to {}",
];

const TOPICS: &[&str] = &[
    "Databases",
    "Migration",
    "Gardens",
    "Rivers",
    "Mountains",
    "Chess",
    "Astronomy",
    "Sailing",
];

/// Copies of each book placed in stock.
const COPIES_PER_BOOK: usize = 3;

/// Books that receive stock entries.
const STOCKED_BOOKS: usize = 10;

/// Build the full bookstore seed plan.
pub fn seed_plan(engine: Engine, schema: &str, count: usize, rng: &mut StdRng) -> Vec<TableSeed> {
    let customer_count = count.max(1);
    let book_count = count.max(1);
    let stocked = STOCKED_BOOKS.min(book_count);

    let mut plan = Vec::new();

    plan.push(TableSeed {
        table: "Genres".to_string(),
        expected: 1,
        statements: vec![format!(
            "INSERT INTO {} (Name) VALUES ('General')",
            qualified(engine, schema, "Genres")
        )],
    });

    let authors = AUTHORS
        .iter()
        .map(|(first, last)| {
            let guid = random_uuid(rng);
            format!(
                "INSERT INTO {} (AuthorId, FirstName, LastName, BirthDate, Nationality, Bio, \
                 Email, Affiliation) VALUES ('{}', '{}', '{}', '1971-06-15', 'Unknown', \
                 'Test Author Bio', '{}.{}@test.com', 'Test Affiliation')",
                qualified(engine, schema, "Authors"),
                guid,
                escape_literal(first),
                escape_literal(last),
                first.to_lowercase().replace([' ', '.'], ""),
                last.to_lowercase().replace([' ', '.'], "")
            )
        })
        .collect();
    plan.push(TableSeed {
        table: "Authors".to_string(),
        expected: AUTHORS.len(),
        statements: authors,
    });

    let customers = (1..=customer_count)
        .map(|i| {
            let unique_key = random_uuid(rng);
            let year = rng.gen_range(1955..=2005);
            format!(
                "INSERT INTO {} (FirstName, LastName, Email, IdentityCard, UniqueKey, \
                 DateOfBirth, Mobile, RegistrationDate) VALUES ('Customer{}', 'Test{}', \
                 'customer{}@test.com', 'ID{}', '{}', '{}-03-01', '555000{:04}', '2025-01-01')",
                qualified(engine, schema, "Customers"),
                i,
                i,
                i,
                1000 + i,
                unique_key,
                year,
                i % 10_000
            )
        })
        .collect();
    plan.push(TableSeed {
        table: "Customers".to_string(),
        expected: customer_count,
        statements: customers,
    });

    let books = (0..book_count)
        .map(|_| {
            let template = TITLE_TEMPLATES[rng.gen_range(0..TITLE_TEMPLATES.len())];
            let topic = TOPICS[rng.gen_range(0..TOPICS.len())];
            let title = template.replace("{}", topic);
            let year = rng.gen_range(2000..=2026);
            let price = rng.gen_range(999..=9999) as f64 / 100.0;
            let rating = rng.gen_range(1..=5);
            let month = rng.gen_range(1..=12);
            format!(
                "INSERT INTO {} (Title, AuthorId, Year, Price, Description, GenreId, IssueDate, \
                 Rating) VALUES ('{}', {}, {}, {:.2}, 'Seeded test book', 1, '2024-{:02}-15', {})",
                qualified(engine, schema, "Books"),
                escape_literal(&title),
                rng.gen_range(1..=AUTHORS.len()),
                year,
                price,
                month,
                rating
            )
        })
        .collect();
    plan.push(TableSeed {
        table: "Books".to_string(),
        expected: book_count,
        statements: books,
    });

    let stocks = (1..=stocked)
        .flat_map(|book_id| {
            let mut copies = Vec::with_capacity(COPIES_PER_BOOK);
            for _ in 0..COPIES_PER_BOOK {
                let unique_key = random_uuid(rng);
                copies.push(format!(
                    "INSERT INTO {} (BookId, UniqueKey, IsAvailable) VALUES ({}, '{}', {})",
                    qualified(engine, schema, "Stocks"),
                    book_id,
                    unique_key,
                    bool_literal(engine, true)
                ));
            }
            copies
        })
        .collect::<Vec<_>>();
    plan.push(TableSeed {
        table: "Stocks".to_string(),
        expected: stocked * COPIES_PER_BOOK,
        statements: stocks,
    });

    plan
}

/// RNG-driven UUID so seeded plans stay reproducible.
fn random_uuid(rng: &mut StdRng) -> Uuid {
    Uuid::from_u128(rng.gen())
}
