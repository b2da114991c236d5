//! Seed plan generation for the pet-clinic schema.
//!
//! Children reference parents by positional id (1..=parent count), which
//! assumes the tables were cleared and identity seeds restart from 1 — the
//! same contract the clearing pass establishes.

use rand::rngs::StdRng;
use rand::Rng;

use crate::catalog::{escape_literal, qualified};
use crate::config::Engine;

use super::TableSeed;

const PET_TYPES: &[&str] = &["cat", "dog", "lizard", "snake", "bird", "hamster"];

const SPECIALTIES: &[&str] = &["radiology", "surgery", "dentistry"];

const FIRST_NAMES: &[&str] = &[
    "George", "Betty", "Eduardo", "Harold", "Peter", "Jean", "Jeff", "Maria", "David", "Carlos",
    "Helen", "Linda", "Rafael", "Henry", "Sharon",
];

const LAST_NAMES: &[&str] = &[
    "Franklin", "Davis", "Rodriquez", "Coleman", "McTavish", "Black", "Escobito", "Schroeder",
    "Estaban", "Wilson",
];

const CITIES: &[&str] = &["Madison", "Sun Prairie", "McFarland", "Windsor", "Monona", "Waunakee"];

const PET_NAMES: &[&str] = &[
    "Leo", "Basil", "Rosy", "Jewel", "Iggy", "George", "Samantha", "Max", "Lucky", "Mulligan",
    "Freddy", "Sly",
];

const VISIT_DESCRIPTIONS: &[&str] = &[
    "rabies shot",
    "neutered",
    "spayed",
    "annual checkup",
    "dental cleaning",
    "wing clipped",
];

/// Build the full pet-clinic seed plan.
///
/// Lookup tables (`types`, `specialties`) get their fixed pools; `owners`,
/// `pets` and `visits` scale with `count`; `vets` is capped at ten.
pub fn seed_plan(engine: Engine, schema: &str, count: usize, rng: &mut StdRng) -> Vec<TableSeed> {
    let owner_count = count.max(1);
    let pet_count = count.max(1);
    let visit_count = count.max(1);
    let vet_count = count.clamp(1, 10);

    let mut plan = Vec::new();

    plan.push(TableSeed {
        table: "types".to_string(),
        expected: PET_TYPES.len(),
        statements: PET_TYPES
            .iter()
            .map(|name| {
                format!(
                    "INSERT INTO {} (name) VALUES ('{}')",
                    qualified(engine, schema, "types"),
                    escape_literal(name)
                )
            })
            .collect(),
    });

    plan.push(TableSeed {
        table: "specialties".to_string(),
        expected: SPECIALTIES.len(),
        statements: SPECIALTIES
            .iter()
            .map(|name| {
                format!(
                    "INSERT INTO {} (name) VALUES ('{}')",
                    qualified(engine, schema, "specialties"),
                    escape_literal(name)
                )
            })
            .collect(),
    });

    let owners = (0..owner_count)
        .map(|i| {
            let first = FIRST_NAMES[rng.gen_range(0..FIRST_NAMES.len())];
            let last = LAST_NAMES[rng.gen_range(0..LAST_NAMES.len())];
            let city = CITIES[rng.gen_range(0..CITIES.len())];
            format!(
                "INSERT INTO {} (first_name, last_name, address, city, telephone) \
                 VALUES ('{}', '{}', '{} Test Street', '{}', '608555{:04}')",
                qualified(engine, schema, "owners"),
                escape_literal(first),
                escape_literal(last),
                100 + i,
                escape_literal(city),
                rng.gen_range(0..10_000)
            )
        })
        .collect();
    plan.push(TableSeed {
        table: "owners".to_string(),
        expected: owner_count,
        statements: owners,
    });

    let vets = (0..vet_count)
        .map(|_| {
            let first = FIRST_NAMES[rng.gen_range(0..FIRST_NAMES.len())];
            let last = LAST_NAMES[rng.gen_range(0..LAST_NAMES.len())];
            format!(
                "INSERT INTO {} (first_name, last_name) VALUES ('{}', '{}')",
                qualified(engine, schema, "vets"),
                escape_literal(first),
                escape_literal(last)
            )
        })
        .collect();
    plan.push(TableSeed {
        table: "vets".to_string(),
        expected: vet_count,
        statements: vets,
    });

    // Each vet gets one specialty; the (vet_id, specialty_id) pair is the PK
    let vet_specialties = (1..=vet_count)
        .map(|vet_id| {
            format!(
                "INSERT INTO {} (vet_id, specialty_id) VALUES ({}, {})",
                qualified(engine, schema, "vet_specialties"),
                vet_id,
                rng.gen_range(1..=SPECIALTIES.len())
            )
        })
        .collect();
    plan.push(TableSeed {
        table: "vet_specialties".to_string(),
        expected: vet_count,
        statements: vet_specialties,
    });

    let pets = (0..pet_count)
        .map(|_| {
            let name = PET_NAMES[rng.gen_range(0..PET_NAMES.len())];
            let year = rng.gen_range(2010..=2024);
            let month = rng.gen_range(1..=12);
            let day = rng.gen_range(1..=28);
            format!(
                "INSERT INTO {} (name, birth_date, type_id, owner_id) \
                 VALUES ('{}', '{:04}-{:02}-{:02}', {}, {})",
                qualified(engine, schema, "pets"),
                escape_literal(name),
                year,
                month,
                day,
                rng.gen_range(1..=PET_TYPES.len()),
                rng.gen_range(1..=owner_count)
            )
        })
        .collect();
    plan.push(TableSeed {
        table: "pets".to_string(),
        expected: pet_count,
        statements: pets,
    });

    let visits = (0..visit_count)
        .map(|_| {
            let description = VISIT_DESCRIPTIONS[rng.gen_range(0..VISIT_DESCRIPTIONS.len())];
            let month = rng.gen_range(1..=12);
            let day = rng.gen_range(1..=28);
            format!(
                "INSERT INTO {} (pet_id, visit_date, description) \
                 VALUES ({}, '2025-{:02}-{:02}', '{}')",
                qualified(engine, schema, "visits"),
                rng.gen_range(1..=pet_count),
                month,
                day,
                escape_literal(description)
            )
        })
        .collect();
    plan.push(TableSeed {
        table: "visits".to_string(),
        expected: visit_count,
        statements: visits,
    });

    plan
}
