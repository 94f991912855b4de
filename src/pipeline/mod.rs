// Star-schema pipeline: ingestion, processing, orchestration, artifacts and warehouse loading

pub mod ingestion;
pub mod orchestrator;
pub mod output;
pub mod processing;
pub mod schema;
pub mod storage;

use tracing::{info, instrument};

use crate::config::Config;
use crate::error::Result;

pub use orchestrator::{FileState, PipelineOrchestrator, RunOutput, RunReport};
pub use output::ArtifactWriter;
pub use schema::{FactFile, StarSchema};
pub use storage::{load_star_schema, LoadSummary, Warehouse};

use ingestion::{discover_sources, load_reference};
use processing::AirportMatcher;

/// The configured airport matcher, if a reference list is set.
pub fn airport_matcher(config: &Config) -> Result<Option<AirportMatcher>> {
    match &config.reference.path {
        Some(path) => {
            let reference = load_reference(path)?;
            Ok(Some(AirportMatcher::new(reference, config.matching.threshold)))
        }
        None => Ok(None),
    }
}

/// Discover sources, build the star schema and write the artifacts.
///
/// Artifacts are written only once every file has been processed and airport
/// codes assigned.
#[instrument(skip_all, fields(source_dir = %config.source.dir.display()))]
pub fn build_star_schema(config: &Config) -> Result<RunOutput> {
    let sources = discover_sources(&config.source.dir, &config.source.pattern)?;
    let matcher = airport_matcher(config)?;

    let output = PipelineOrchestrator::new(config.source.pattern.clone(), matcher).run(&sources);

    let writer = ArtifactWriter::new(&config.output.dir)?;
    writer.write_schema(&output.schema)?;
    let report_path = writer.write_report(&output.report)?;
    info!("📝 Run report written to {}", report_path.display());
    Ok(output)
}
