use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::constants::*;
use crate::domain::FactRow;
use crate::error::Result;
use crate::pipeline::orchestrator::RunReport;
use crate::pipeline::schema::StarSchema;

/// Writes the cleaned CSV artifacts and the run report into one directory.
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// One fact file per projected source plus the five dimension files.
    #[instrument(skip_all, fields(dir = %self.dir.display()))]
    pub fn write_schema(&self, schema: &StarSchema) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();

        for file in &schema.fact_files {
            let path = self
                .dir
                .join(format!("{}_{}.csv", FACT_FILE_PREFIX, file.tag));
            write_facts(&path, &file.rows)?;
            written.push(path);
        }

        written.push(self.write_rows("dim_date.csv", &schema.dates)?);
        written.push(self.write_rows("dim_airport.csv", &schema.airports)?);
        written.push(self.write_rows("dim_airline.csv", &schema.airlines)?);
        written.push(self.write_rows("dim_route.csv", &schema.routes)?);
        written.push(self.write_rows("dim_flight_type.csv", &schema.flight_types)?);

        info!("💾 Wrote {} artifacts to {}", written.len(), self.dir.display());
        Ok(written)
    }

    pub fn write_report(&self, report: &RunReport) -> Result<PathBuf> {
        let path = self.dir.join(RUN_REPORT_FILE);
        fs::write(&path, serde_json::to_string_pretty(report)?)?;
        debug!("Wrote run report to {}", path.display());
        Ok(path)
    }

    fn write_rows<T: Serialize>(&self, name: &str, rows: &[T]) -> Result<PathBuf> {
        let path = self.dir.join(name);
        let mut writer = csv::Writer::from_path(&path)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        debug!("Wrote {} rows to {}", rows.len(), path.display());
        Ok(path)
    }
}

fn write_facts(path: &Path, rows: &[FactRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(fact_header())?;
    for row in rows {
        writer.write_record(row.to_fields())?;
    }
    writer.flush()?;
    debug!("Wrote {} facts to {}", rows.len(), path.display());
    Ok(())
}
