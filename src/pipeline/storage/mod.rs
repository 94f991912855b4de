// Warehouse loading: the target-table trait and its SQLite and in-memory backends

pub mod in_memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, instrument};

use crate::domain::*;
use crate::error::Result;
use crate::pipeline::schema::StarSchema;

pub use in_memory::InMemoryWarehouse;
pub use sqlite::SqliteWarehouse;

/// Target tables of the punctuality warehouse.
///
/// Each call is one bulk insert. Dimension inserts other than airports fail
/// on an id that is already present; airports upsert and only ever touch
/// `iata_code` on conflict. `load` writes a whole star schema atomically:
/// either every table takes its rows or none does.
#[async_trait]
pub trait Warehouse: Send + Sync {
    async fn upsert_airports(&self, rows: &[AirportRow]) -> Result<usize>;
    async fn insert_airlines(&self, rows: &[AirlineRow]) -> Result<usize>;
    async fn insert_routes(&self, rows: &[RouteRow]) -> Result<usize>;
    async fn insert_flight_types(&self, rows: &[FlightTypeRow]) -> Result<usize>;
    async fn insert_dates(&self, rows: &[DateRow]) -> Result<usize>;
    async fn insert_facts(&self, rows: &[FactRow]) -> Result<usize>;
    async fn load(&self, schema: &StarSchema) -> Result<LoadSummary>;
}

/// Rows written per table by one load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub airports: usize,
    pub airlines: usize,
    pub routes: usize,
    pub flight_types: usize,
    pub dates: usize,
    pub facts: usize,
}

/// Load a finished star schema, dimensions first, as one unit.
#[instrument(skip_all, fields(facts = schema.fact_count()))]
pub async fn load_star_schema(warehouse: &dyn Warehouse, schema: &StarSchema) -> Result<LoadSummary> {
    let summary = warehouse.load(schema).await?;

    info!(
        "✅ Loaded warehouse: {} airports, {} airlines, {} routes, {} flight types, {} dates, {} facts",
        summary.airports,
        summary.airlines,
        summary.routes,
        summary.flight_types,
        summary.dates,
        summary.facts
    );
    Ok(summary)
}
