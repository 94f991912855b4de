use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use super::{LoadSummary, Warehouse};
use crate::domain::*;
use crate::error::{EtlError, Result};
use crate::pipeline::schema::StarSchema;

/// In-memory warehouse for dry runs and tests.
///
/// Mirrors the SQLite table semantics: primary-key conflicts are errors
/// except for the airport upsert, and a rejected `load` changes nothing.
pub struct InMemoryWarehouse {
    airports: Arc<Mutex<BTreeMap<SurrogateId, AirportRow>>>,
    airlines: Arc<Mutex<BTreeMap<SurrogateId, AirlineRow>>>,
    routes: Arc<Mutex<BTreeMap<SurrogateId, RouteRow>>>,
    flight_types: Arc<Mutex<BTreeMap<SurrogateId, FlightTypeRow>>>,
    dates: Arc<Mutex<BTreeMap<SurrogateId, DateRow>>>,
    facts: Arc<Mutex<Vec<FactRow>>>,
}

impl Default for InMemoryWarehouse {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(table: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    table
        .lock()
        .map_err(|_| EtlError::Warehouse("in-memory table lock poisoned".to_string()))
}

/// Fail if any id is already stored or repeats within `rows`.
fn check_unique<R>(
    table: &BTreeMap<SurrogateId, R>,
    name: &str,
    rows: &[R],
    id_of: impl Fn(&R) -> SurrogateId,
) -> Result<()> {
    let mut seen = BTreeSet::new();
    match rows
        .iter()
        .map(id_of)
        .find(|id| table.contains_key(id) || !seen.insert(*id))
    {
        Some(dup) => Err(EtlError::Warehouse(format!(
            "duplicate key {} in {}",
            dup, name
        ))),
        None => Ok(()),
    }
}

fn insert_rows<R: Clone>(
    table: &mut BTreeMap<SurrogateId, R>,
    rows: &[R],
    id_of: impl Fn(&R) -> SurrogateId,
) -> usize {
    for row in rows {
        table.insert(id_of(row), row.clone());
    }
    rows.len()
}

/// Insert rows keyed by id, rejecting the whole batch on any conflict.
fn insert_unique<R: Clone>(
    table: &Mutex<BTreeMap<SurrogateId, R>>,
    name: &str,
    rows: &[R],
    id_of: impl Fn(&R) -> SurrogateId + Copy,
) -> Result<usize> {
    let mut table = lock(table)?;
    check_unique(&table, name, rows, id_of)?;
    let written = insert_rows(&mut table, rows, id_of);
    debug!("Inserted {} rows into {}", written, name);
    Ok(written)
}

fn upsert_airport_rows(table: &mut BTreeMap<SurrogateId, AirportRow>, rows: &[AirportRow]) -> usize {
    for row in rows {
        table
            .entry(row.airport_id)
            .and_modify(|existing| {
                if row.iata_code.is_some() {
                    existing.iata_code = row.iata_code.clone();
                }
            })
            .or_insert_with(|| row.clone());
    }
    rows.len()
}

impl InMemoryWarehouse {
    pub fn new() -> Self {
        Self {
            airports: Arc::new(Mutex::new(BTreeMap::new())),
            airlines: Arc::new(Mutex::new(BTreeMap::new())),
            routes: Arc::new(Mutex::new(BTreeMap::new())),
            flight_types: Arc::new(Mutex::new(BTreeMap::new())),
            dates: Arc::new(Mutex::new(BTreeMap::new())),
            facts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn airports(&self) -> Result<Vec<AirportRow>> {
        Ok(lock(&self.airports)?.values().cloned().collect())
    }

    pub fn fact_count(&self) -> Result<usize> {
        Ok(lock(&self.facts)?.len())
    }

    /// Rows currently held per table.
    pub fn row_counts(&self) -> Result<LoadSummary> {
        Ok(LoadSummary {
            airports: lock(&self.airports)?.len(),
            airlines: lock(&self.airlines)?.len(),
            routes: lock(&self.routes)?.len(),
            flight_types: lock(&self.flight_types)?.len(),
            dates: lock(&self.dates)?.len(),
            facts: lock(&self.facts)?.len(),
        })
    }
}

#[async_trait]
impl Warehouse for InMemoryWarehouse {
    async fn upsert_airports(&self, rows: &[AirportRow]) -> Result<usize> {
        let written = upsert_airport_rows(&mut *lock(&self.airports)?, rows);
        debug!("Upserted {} airports", written);
        Ok(written)
    }

    async fn insert_airlines(&self, rows: &[AirlineRow]) -> Result<usize> {
        insert_unique(&self.airlines, "airlines", rows, |r| r.airline_id)
    }

    async fn insert_routes(&self, rows: &[RouteRow]) -> Result<usize> {
        insert_unique(&self.routes, "routes", rows, |r| r.route_id)
    }

    async fn insert_flight_types(&self, rows: &[FlightTypeRow]) -> Result<usize> {
        insert_unique(&self.flight_types, "flight types", rows, |r| r.flight_type_id)
    }

    async fn insert_dates(&self, rows: &[DateRow]) -> Result<usize> {
        insert_unique(&self.dates, "dates", rows, |r| r.date_id)
    }

    async fn insert_facts(&self, rows: &[FactRow]) -> Result<usize> {
        lock(&self.facts)?.extend_from_slice(rows);
        Ok(rows.len())
    }

    async fn load(&self, schema: &StarSchema) -> Result<LoadSummary> {
        // Every table stays locked until the load is applied or rejected.
        let mut airports = lock(&self.airports)?;
        let mut airlines = lock(&self.airlines)?;
        let mut routes = lock(&self.routes)?;
        let mut flight_types = lock(&self.flight_types)?;
        let mut dates = lock(&self.dates)?;
        let mut facts = lock(&self.facts)?;

        check_unique(&airlines, "airlines", &schema.airlines, |r| r.airline_id)?;
        check_unique(&routes, "routes", &schema.routes, |r| r.route_id)?;
        check_unique(&flight_types, "flight types", &schema.flight_types, |r| {
            r.flight_type_id
        })?;
        check_unique(&dates, "dates", &schema.dates, |r| r.date_id)?;

        let before = facts.len();
        facts.extend(schema.facts().cloned());
        Ok(LoadSummary {
            airports: upsert_airport_rows(&mut airports, &schema.airports),
            airlines: insert_rows(&mut airlines, &schema.airlines, |r| r.airline_id),
            routes: insert_rows(&mut routes, &schema.routes, |r| r.route_id),
            flight_types: insert_rows(&mut flight_types, &schema.flight_types, |r| {
                r.flight_type_id
            }),
            dates: insert_rows(&mut dates, &schema.dates, |r| r.date_id),
            facts: facts.len() - before,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn airport(id: u32, code: Option<&str>) -> AirportRow {
        AirportRow {
            reporting_airport: "HEATHROW".to_string(),
            airport_id: SurrogateId(id),
            iata_code: code.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_airport_upsert_updates_code_only() {
        let warehouse = InMemoryWarehouse::new();
        warehouse.upsert_airports(&[airport(1, None)]).await.unwrap();
        warehouse.upsert_airports(&[airport(1, Some("LHR"))]).await.unwrap();
        warehouse.upsert_airports(&[airport(1, None)]).await.unwrap();

        let airports = warehouse.airports().unwrap();
        assert_eq!(airports, vec![airport(1, Some("LHR"))]);
    }

    #[tokio::test]
    async fn test_duplicate_dimension_insert_is_rejected() {
        let warehouse = InMemoryWarehouse::new();
        let rows = vec![AirlineRow {
            airline_name: "EASYJET".to_string(),
            airline_id: SurrogateId(1),
        }];
        warehouse.insert_airlines(&rows).await.unwrap();
        let err = warehouse.insert_airlines(&rows).await.unwrap_err();
        assert!(matches!(err, EtlError::Warehouse(_)));
    }
}
