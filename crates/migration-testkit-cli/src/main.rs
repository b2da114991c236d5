//! migration-testkit CLI - snapshot, verify, populate, load-test and
//! smoke-test databases around a migration event.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};
use migration_testkit::{
    loadtest, smoke, CatalogIntrospector, Config, Database, FkCheck, LoadTestOptions, Outcome,
    Populator, Profile, Snapshot, Snapshotter, TestkitError, TestMode, Verifier,
};
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "migration-testkit")]
#[command(about = "Migration testing toolkit for PostgreSQL and SQL Server")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "testkit.yaml")]
    config: PathBuf,

    /// Environment name from the configuration file
    #[arg(long, default_value = "target")]
    env: String,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a database snapshot to a JSON file
    Snapshot {
        /// Output file [default: snapshot_<env>_<timestamp>.json]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Comma-separated table list in capture order (default: discover)
        #[arg(long, value_delimiter = ',')]
        tables: Option<Vec<String>>,
    },

    /// Verify the live database against a baseline snapshot
    Verify {
        /// Baseline snapshot file
        #[arg(short, long)]
        baseline: PathBuf,

        /// Extra referential-integrity check as table.column=ref_table.ref_column
        /// (default: derived from the baseline's foreign-key metadata)
        #[arg(long = "fk-check")]
        fk_checks: Vec<String>,
    },

    /// Seed the sample application tables with synthetic data
    Populate {
        /// Application profile: petclinic or bookstore
        #[arg(long, default_value = "petclinic")]
        profile: String,

        /// Records per scaling table
        #[arg(short, long, default_value = "100")]
        records: usize,

        /// Skip the clear pass before seeding
        #[arg(long)]
        no_clear: bool,

        /// Only clear, do not seed
        #[arg(long)]
        clear_only: bool,

        /// RNG seed for reproducible data
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Run concurrent SQL operations and report throughput
    LoadTest {
        /// Application profile: petclinic or bookstore
        #[arg(long, default_value = "petclinic")]
        profile: String,

        /// Number of concurrent connections
        #[arg(short, long, default_value = "20")]
        connections: usize,

        /// Operations per connection
        #[arg(short, long, default_value = "100")]
        operations: usize,

        /// Test type: read, write, update, delete, mixed
        #[arg(short, long, default_value = "mixed")]
        test_type: String,

        /// Directory for CSV results and the summary file
        #[arg(long, default_value = "database_test_results")]
        results_dir: PathBuf,

        /// RNG seed for a reproducible operation sequence
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Probe the web application's URL patterns over HTTP
    SmokeTest {
        /// Base URL override (default: smoke.base_url from the config file)
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Test database connectivity
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(1)
        }
    }
}

async fn run() -> Result<bool, TestkitError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Snapshot { output, tables } => {
            let env = config.environment(&cli.env)?;
            let db = Database::connect(env).await?;

            let snapshotter = Snapshotter::new(&db, &cli.env, env);
            let snapshot = snapshotter.capture(tables.as_deref()).await?;

            let path = output.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "snapshot_{}_{}.json",
                    cli.env,
                    chrono::Utc::now().format("%Y%m%d_%H%M%S")
                ))
            });
            snapshot.save(&path)?;

            println!("\nSnapshot saved successfully!");
            println!("  File: {}", path.display());
            println!("  Tables: {}", snapshot.tables.len());
            println!("  Rows: {}", snapshot.total_rows());
            Ok(true)
        }

        Commands::Verify {
            baseline,
            fk_checks,
        } => {
            // Baseline problems must fail before touching the live database
            let baseline = Snapshot::load(&baseline)?;
            info!(
                "Loaded baseline from {} ({})",
                baseline.metadata.database, baseline.metadata.snapshot_date
            );

            // Parse check specs before opening any connection
            let explicit_checks = parse_fk_checks(&fk_checks)?;

            let env = config.environment(&cli.env)?;
            let db = Database::connect(env).await?;
            let verifier = Verifier::new(&db, &cli.env, env);
            let report = verifier
                .verify(
                    &baseline,
                    if explicit_checks.is_empty() {
                        None
                    } else {
                        Some(explicit_checks.as_slice())
                    },
                )
                .await?;

            println!();
            for verdict in &report.verdicts {
                println!("{}", verdict.render());
            }

            let totals = report.totals();
            println!("\n{}", "=".repeat(70));
            println!("✓ Tests Passed:  {}", totals.passed);
            println!("⚠ Warnings:      {}", totals.warnings);
            println!("✗ Tests Failed:  {}", totals.failed);
            println!("{}", "=".repeat(70));

            if report.outcome() == Outcome::Failed {
                println!("\nFAILED TESTS:");
                for failure in report.failures() {
                    println!("  • {}: {}", failure.check, failure.message);
                }
            }
            println!("\n{}", report.outcome());

            if cli.output_json {
                println!("\n{}", serde_json::to_string_pretty(&report)?);
            }

            Ok(report.is_success())
        }

        Commands::Populate {
            profile,
            records,
            no_clear,
            clear_only,
            seed,
        } => {
            let profile: Profile = profile.parse()?;
            let env = config.environment(&cli.env)?;
            let db = Database::connect(env).await?;
            let populator = Populator::new(&db, profile);

            if !no_clear {
                println!("Clearing {} tables...", profile);
                let cleared = populator.clear().await?;
                println!("  Deleted {} rows", cleared.total_deleted());
            }

            if !clear_only {
                println!("Seeding {} tables with {} records...", profile, records);
                let summary = populator.seed(records, seed).await?;
                println!(
                    "  Inserted {} rows ({} tables skipped, {} warnings)",
                    summary.total_inserted(),
                    summary.skipped.len(),
                    summary.warnings
                );
            }

            Ok(true)
        }

        Commands::LoadTest {
            profile,
            connections,
            operations,
            test_type,
            results_dir,
            seed,
        } => {
            let options = LoadTestOptions {
                connections,
                operations,
                mode: test_type.parse::<TestMode>()?,
                profile: profile.parse()?,
                seed,
            };

            let env = config.environment(&cli.env)?;
            let report = loadtest::run(env, &options).await?;

            std::fs::create_dir_all(&results_dir)?;
            let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
            let csv_path = results_dir.join(format!("load_test_{}.csv", timestamp));
            let summary_path = results_dir.join(format!("summary_{}.txt", timestamp));

            report.write_csv(&csv_path)?;
            let summary = report.render_summary();
            std::fs::write(&summary_path, &summary)?;

            println!("\n{}", summary);
            println!("Results saved to:");
            println!("  {}", csv_path.display());
            println!("  {}", summary_path.display());

            if cli.output_json {
                println!("\n{}", serde_json::to_string_pretty(&report)?);
            }

            // Zero successful operations (including workers that never
            // connected) is a fatal outcome
            let expected_ops = options.connections * options.operations;
            if expected_ops > 0 && report.successes() == 0 {
                eprintln!("ERROR: All operations failed!");
                return Ok(false);
            }
            Ok(true)
        }

        Commands::SmokeTest { base_url } => {
            let base_url = match base_url {
                Some(url) => url,
                None => config
                    .smoke
                    .as_ref()
                    .map(|s| s.base_url.clone())
                    .ok_or_else(|| {
                        TestkitError::Config(
                            "No base URL: pass --base-url or set smoke.base_url in the config"
                                .to_string(),
                        )
                    })?,
            };

            let report = smoke::run(&base_url, &smoke::petclinic_checks()).await?;

            println!();
            for result in &report.results {
                println!("{}", result.render());
            }
            println!(
                "\nEndpoints: {} passed, {} failed",
                report.passed(),
                report.failed()
            );

            Ok(report.is_success())
        }

        Commands::HealthCheck => {
            let env = config.environment(&cli.env)?;

            let started = Instant::now();
            let db = Database::connect(env).await?;
            let version = db.server_version().await?;
            let latency = started.elapsed();

            println!("Health Check Results:");
            println!("  Environment: {} ({})", cli.env, env.redacted());
            println!("  Connected: OK ({}ms)", latency.as_millis());
            println!(
                "  Server: {}",
                version.lines().next().unwrap_or(&version).trim()
            );
            Ok(true)
        }
    }
}

/// Parse `table.column=ref_table.ref_column` check specs.
fn parse_fk_checks(specs: &[String]) -> Result<Vec<FkCheck>, TestkitError> {
    specs
        .iter()
        .map(|spec| {
            let invalid = || {
                TestkitError::Config(format!(
                    "Invalid --fk-check '{}'. Expected table.column=ref_table.ref_column",
                    spec
                ))
            };
            let (left, right) = spec.split_once('=').ok_or_else(invalid)?;
            let (table, column) = left.split_once('.').ok_or_else(invalid)?;
            let (ref_table, ref_column) = right.split_once('.').ok_or_else(invalid)?;
            if [table, column, ref_table, ref_column]
                .iter()
                .any(|s| s.is_empty())
            {
                return Err(invalid());
            }
            Ok(FkCheck::new(table, column, ref_table, ref_column))
        })
        .collect()
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fk_checks() {
        let checks =
            parse_fk_checks(&["visits.pet_id=pets.id".to_string()]).unwrap();
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0], FkCheck::new("visits", "pet_id", "pets", "id"));
    }

    #[test]
    fn test_parse_fk_checks_rejects_malformed() {
        assert!(parse_fk_checks(&["visits=pets.id".to_string()]).is_err());
        assert!(parse_fk_checks(&["visits.pet_id".to_string()]).is_err());
        assert!(parse_fk_checks(&["a.=b.c".to_string()]).is_err());
    }
}
