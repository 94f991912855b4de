use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use metrics::{counter, histogram};
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::FactRow;
use crate::error::Result;
use crate::pipeline::ingestion::{source_tag, ExtractNormalizer};
use crate::pipeline::processing::projection::project_facts;
use crate::pipeline::processing::{
    AirportMatcher, DimensionCounts, DimensionResolver, MasterTables, MatchSummary,
};
use crate::pipeline::schema::{FactFile, StarSchema};

/// Where a source file got to in the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    Pending,
    Normalized,
    Resolved,
    Projected,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub tag: String,
    pub state: FileState,
    pub encoding: Option<&'static str>,
    pub rows_read: usize,
    pub rows_dropped: usize,
    pub facts: usize,
    pub new_ids: usize,
    pub latest_run_date: Option<NaiveDate>,
    /// Set for `Failed` files only.
    pub error: Option<String>,
}

impl FileOutcome {
    fn pending(path: &Path, tag: String) -> Self {
        Self {
            path: path.to_path_buf(),
            tag,
            state: FileState::Pending,
            encoding: None,
            rows_read: 0,
            rows_dropped: 0,
            facts: 0,
            new_ids: 0,
            latest_run_date: None,
            error: None,
        }
    }
}

/// Summary of one run, serialized next to the artifacts.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub files: Vec<FileOutcome>,
    /// Final size of each master table.
    pub dimensions: DimensionCounts,
    pub airports: MatchSummary,
    pub facts: usize,
}

impl RunReport {
    pub fn projected_files(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.state == FileState::Projected)
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files.iter().filter(|f| f.state == FileState::Failed)
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub masters: MasterTables,
    pub schema: StarSchema,
    pub report: RunReport,
}

/// Drives every source file through normalize, resolve and project against
/// one set of master tables, then assigns airport codes once at the end.
///
/// Files run one at a time in the order given. A file that fails at any step
/// is recorded and skipped; it leaves no ids behind.
pub struct PipelineOrchestrator {
    masters: MasterTables,
    matcher: Option<AirportMatcher>,
    source_pattern: String,
}

impl PipelineOrchestrator {
    pub fn new(source_pattern: impl Into<String>, matcher: Option<AirportMatcher>) -> Self {
        Self {
            masters: MasterTables::new(),
            matcher,
            source_pattern: source_pattern.into(),
        }
    }

    /// Continue from masters built by an earlier run.
    pub fn with_masters(mut self, masters: MasterTables) -> Self {
        self.masters = masters;
        self
    }

    #[instrument(skip_all, fields(files = sources.len()))]
    pub fn run(mut self, sources: &[PathBuf]) -> RunOutput {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let timer = Instant::now();
        info!("🚀 Starting run {} over {} source files", run_id, sources.len());
        if sources.is_empty() {
            warn!("No source files to process");
        }

        let mut outcomes = Vec::with_capacity(sources.len());
        let mut fact_files = Vec::new();

        for path in sources {
            let tag = source_tag(path, &self.source_pattern);
            let mut outcome = FileOutcome::pending(path, tag);

            match self.process_file(path, &mut outcome) {
                Ok(rows) => {
                    outcome.state = FileState::Projected;
                    outcome.facts = rows.len();
                    counter!("etl_files_total", "status" => "projected").increment(1);
                    info!(
                        "✅ {}: {} facts, {} new ids, {} rows dropped",
                        outcome.tag, outcome.facts, outcome.new_ids, outcome.rows_dropped
                    );
                    fact_files.push(FactFile {
                        source: path.clone(),
                        tag: outcome.tag.clone(),
                        rows,
                    });
                }
                Err(e) => {
                    error!(
                        file = %path.display(),
                        reached = ?outcome.state,
                        "❌ Failed to process source file: {}",
                        e
                    );
                    counter!("etl_files_total", "status" => "failed").increment(1);
                    outcome.state = FileState::Failed;
                    outcome.error = Some(e.to_string());
                }
            }
            outcomes.push(outcome);
        }

        let airports = match &self.matcher {
            Some(matcher) => matcher.resolve_iata(&mut self.masters),
            None => {
                warn!("No reference list configured, airport codes stay empty");
                MatchSummary {
                    unmatched: self.masters.airports.len(),
                    ..MatchSummary::default()
                }
            }
        };

        let schema = StarSchema::from_masters(&self.masters, fact_files);
        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            files: outcomes,
            dimensions: self.masters.counts(),
            airports,
            facts: schema.fact_count(),
        };

        let elapsed = timer.elapsed().as_secs_f64();
        histogram!("etl_run_duration_seconds").record(elapsed);
        info!(
            "🏁 Run {} finished in {:.2}s: {} of {} files projected, {} facts",
            run_id,
            elapsed,
            report.projected_files(),
            report.files.len(),
            report.facts
        );

        RunOutput {
            masters: self.masters,
            schema,
            report,
        }
    }

    fn process_file(&mut self, path: &Path, outcome: &mut FileOutcome) -> Result<Vec<FactRow>> {
        let batch = ExtractNormalizer::normalize_file(path)?;
        outcome.state = FileState::Normalized;
        outcome.encoding = Some(batch.encoding);
        outcome.rows_read = batch.rows_read;
        outcome.rows_dropped = batch.rows_dropped;
        outcome.latest_run_date = batch.latest_run_date;
        if batch.rows_dropped > 0 {
            counter!("etl_rows_dropped_total").increment(batch.rows_dropped as u64);
        }

        let resolved = DimensionResolver::resolve(&batch.records, &mut self.masters)?;
        outcome.state = FileState::Resolved;
        outcome.new_ids = resolved.allocated.total();

        project_facts(&batch.records, &resolved)
    }
}
