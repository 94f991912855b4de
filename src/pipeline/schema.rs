use std::path::PathBuf;

use serde::Serialize;

use crate::domain::*;
use crate::pipeline::processing::MasterTables;

/// Fact rows projected from one source file.
#[derive(Debug, Clone, Serialize)]
pub struct FactFile {
    pub source: PathBuf,
    pub tag: String,
    pub rows: Vec<FactRow>,
}

/// Final dimension tables and fact rows of a completed run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StarSchema {
    pub dates: Vec<DateRow>,
    pub airports: Vec<AirportRow>,
    pub airlines: Vec<AirlineRow>,
    pub routes: Vec<RouteRow>,
    pub flight_types: Vec<FlightTypeRow>,
    /// In file-processing order.
    pub fact_files: Vec<FactFile>,
}

impl StarSchema {
    pub fn from_masters(masters: &MasterTables, fact_files: Vec<FactFile>) -> Self {
        Self {
            dates: masters.date_rows(),
            airports: masters.airport_rows(),
            airlines: masters.airline_rows(),
            routes: masters.route_rows(),
            flight_types: masters.flight_type_rows(),
            fact_files,
        }
    }

    /// All fact rows, concatenated in file-processing order.
    pub fn facts(&self) -> impl Iterator<Item = &FactRow> {
        self.fact_files.iter().flat_map(|f| f.rows.iter())
    }

    pub fn fact_count(&self) -> usize {
        self.fact_files.iter().map(|f| f.rows.len()).sum()
    }
}
