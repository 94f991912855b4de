use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};

use punctuality_etl::config::{Config, WarehouseKind};
use punctuality_etl::logging;
use punctuality_etl::pipeline::ingestion::load_reference;
use punctuality_etl::pipeline::processing::AirportMatcher;
use punctuality_etl::pipeline::storage::{InMemoryWarehouse, SqliteWarehouse};
use punctuality_etl::pipeline::{build_star_schema, load_star_schema, RunReport, Warehouse};

#[derive(Parser)]
#[command(name = "punctuality_etl")]
#[command(about = "UK airport punctuality star-schema builder")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

/// Flags that win over the config file and `ETL_*` variables.
#[derive(Args)]
struct Overrides {
    /// TOML config file (defaults to etl.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory holding the monthly extracts
    #[arg(long, global = true)]
    source_dir: Option<PathBuf>,
    /// Glob for extract file names
    #[arg(long, global = true)]
    pattern: Option<String>,
    /// IATA reference CSV with name and iata_code columns
    #[arg(long, global = true)]
    reference: Option<PathBuf>,
    /// Directory for cleaned CSVs and the run report
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,
    /// Minimum fuzzy score (exclusive) for assigning an airport code
    #[arg(long, global = true)]
    threshold: Option<u8>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the star schema and write the cleaned CSV artifacts
    Build,
    /// Build the star schema, then load it into the warehouse
    Run {
        /// SQLite database file
        #[arg(long)]
        warehouse_path: Option<PathBuf>,
        /// Load into an in-memory warehouse instead of SQLite
        #[arg(long)]
        dry_run: bool,
    },
    /// Score one airport name against the reference list
    MatchAirports {
        #[arg(long)]
        name: String,
    },
}

impl Overrides {
    fn apply(&self, config: &mut Config) -> anyhow::Result<()> {
        if let Some(dir) = &self.source_dir {
            config.source.dir = dir.clone();
        }
        if let Some(pattern) = &self.pattern {
            config.source.pattern = pattern.clone();
        }
        if let Some(reference) = &self.reference {
            config.reference.path = Some(reference.clone());
        }
        if let Some(dir) = &self.output_dir {
            config.output.dir = dir.clone();
        }
        if let Some(threshold) = self.threshold {
            config.matching.threshold = threshold;
        }
        config.validate()?;
        Ok(())
    }
}

fn print_report(report: &RunReport) {
    println!("\n📊 Run {}:", report.run_id);
    println!("   Files projected: {}/{}", report.projected_files(), report.files.len());
    println!("   Fact rows: {}", report.facts);
    println!(
        "   Dimensions: {} dates, {} airports, {} airlines, {} routes, {} flight types",
        report.dimensions.dates,
        report.dimensions.airports,
        report.dimensions.airlines,
        report.dimensions.routes,
        report.dimensions.flight_types
    );
    println!(
        "   Airport codes: {} matched, {} unmatched",
        report.airports.matched, report.airports.unmatched
    );

    let failures: Vec<_> = report.failures().collect();
    if !failures.is_empty() {
        warn!("{} source files failed", failures.len());
        println!("\n⚠️  Failed files:");
        for failure in failures {
            println!(
                "   - {}: {}",
                failure.path.display(),
                failure.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::load(cli.overrides.config.as_deref())?;
    cli.overrides.apply(&mut config)?;

    let _guard = logging::init_logging(&config.logging.dir);

    match cli.command {
        Commands::Build => {
            println!("🔨 Building star schema...");
            let output = build_star_schema(&config)?;
            print_report(&output.report);
        }
        Commands::Run {
            warehouse_path,
            dry_run,
        } => {
            if let Some(path) = warehouse_path {
                config.warehouse.path = path;
            }
            if dry_run {
                config.warehouse.kind = WarehouseKind::Memory;
            }

            println!("🚀 Running full pipeline (build + load)...");
            println!("\n🔨 Step 1: Building star schema...");
            let output = build_star_schema(&config)?;
            print_report(&output.report);

            println!("\n📥 Step 2: Loading warehouse...");
            let warehouse: Arc<dyn Warehouse> = match config.warehouse.kind {
                WarehouseKind::Sqlite => Arc::new(
                    SqliteWarehouse::open(&config.warehouse.path).with_context(|| {
                        format!("opening warehouse {}", config.warehouse.path.display())
                    })?,
                ),
                WarehouseKind::Memory => Arc::new(InMemoryWarehouse::new()),
            };

            match load_star_schema(warehouse.as_ref(), &output.schema).await {
                Ok(summary) => {
                    info!("Warehouse load complete");
                    println!("✅ Loaded {} facts", summary.facts);
                }
                Err(e) => {
                    error!("Warehouse load failed: {}", e);
                    println!("❌ Warehouse load failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::MatchAirports { name } => {
            let Some(path) = config.reference.path.as_ref() else {
                bail!("match-airports needs a reference list (--reference or ETL_REFERENCE_PATH)");
            };
            let matcher = AirportMatcher::new(load_reference(path)?, config.matching.threshold);

            match matcher.best_match(&name) {
                Some(candidate) => {
                    let verdict = if candidate.score > matcher.threshold() {
                        "accepted"
                    } else {
                        "rejected"
                    };
                    println!(
                        "{} -> {} ({}) score {} [{} at threshold {}]",
                        name,
                        candidate.reference_name,
                        candidate.iata_code,
                        candidate.score,
                        verdict,
                        matcher.threshold()
                    );
                }
                None => println!("Reference list is empty"),
            }
        }
    }
    Ok(())
}
