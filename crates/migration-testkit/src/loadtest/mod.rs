//! Concurrent database load testing.
//!
//! A fixed-size pool of workers, each with its own independent connection,
//! runs a closed loop of randomly-selected operations. Workers share no
//! mutable state: each returns its private result vector when its loop
//! finishes, and the collector assembles the report afterwards. A failing
//! operation is recorded and the loop continues; a worker that cannot
//! connect reports once and contributes no results.

mod ops;
mod report;

pub use ops::{next_operation, SqlOp, TestMode};
pub use report::{LatencyStats, LoadTestReport, OpResult};

use std::time::Instant;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::catalog::{CatalogIntrospector, Database};
use crate::config::EnvConfig;
use crate::error::Result;
use crate::populate::Profile;

/// Load test parameters.
#[derive(Debug, Clone)]
pub struct LoadTestOptions {
    /// Number of concurrent workers, each with its own connection.
    pub connections: usize,

    /// Operations per worker.
    pub operations: usize,

    /// Operation mix.
    pub mode: TestMode,

    /// Application schema the operations target.
    pub profile: Profile,

    /// RNG seed; a fixed seed reproduces the exact operation sequence.
    pub seed: Option<u64>,
}

/// Run the load test against one environment.
pub async fn run(env: &EnvConfig, options: &LoadTestOptions) -> Result<LoadTestReport> {
    info!(
        "Load test: {} connections x {} operations ({} mode, {} profile) against {}",
        options.connections,
        options.operations,
        options.mode,
        options.profile,
        env.redacted()
    );

    let started = Instant::now();
    let mut workers = JoinSet::new();

    for worker_id in 1..=options.connections {
        let env = env.clone();
        let options = options.clone();
        workers.spawn(async move { worker_loop(worker_id, env, options).await });
    }

    let mut results = Vec::with_capacity(options.connections * options.operations);
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(worker_results) => results.extend(worker_results),
            Err(e) => error!("Load test worker panicked: {}", e),
        }
    }

    // Stable output ordering regardless of completion order
    results.sort_by_key(|r: &OpResult| (r.worker, r.seq));

    let report = LoadTestReport {
        database: env.redacted(),
        connections: options.connections,
        operations_per_connection: options.operations,
        mode: options.mode.to_string(),
        duration_secs: started.elapsed().as_secs_f64(),
        results,
    };

    info!(
        "Load test finished: {} ok, {} failed, {:.2} ops/sec",
        report.successes(),
        report.failures(),
        report.throughput()
    );

    Ok(report)
}

/// One worker: open a private connection, run the operation loop, return
/// all results at the end.
async fn worker_loop(worker_id: usize, env: EnvConfig, options: LoadTestOptions) -> Vec<OpResult> {
    let db = match Database::connect_with_pool_size(&env, 1).await {
        Ok(db) => db,
        Err(e) => {
            error!("Worker {} could not connect: {}", worker_id, e);
            return Vec::new();
        }
    };

    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(worker_id as u64)),
        None => StdRng::from_entropy(),
    };

    let schema = db.schema().to_string();
    let mut results = Vec::with_capacity(options.operations);

    for seq in 1..=options.operations {
        let op = next_operation(
            options.profile,
            db.engine(),
            &schema,
            options.mode,
            &mut rng,
        );

        let started = Instant::now();
        let outcome = if op.is_query {
            db.query_count(&op.sql).await.map(|_| ())
        } else {
            db.execute(&op.sql).await.map(|_| ())
        };
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        results.push(match outcome {
            Ok(()) => OpResult {
                worker: worker_id,
                seq,
                operation: op.label,
                duration_ms,
                success: true,
                error: None,
                timestamp: Utc::now(),
            },
            Err(e) => OpResult {
                worker: worker_id,
                seq,
                operation: op.label,
                duration_ms,
                success: false,
                error: Some(e.to_string()),
                timestamp: Utc::now(),
            },
        });
    }

    results
}
