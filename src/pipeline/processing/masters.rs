use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::*;

use super::registry::KeyRegistry;

/// The five dimension registries for one run, plus the airport code column.
///
/// Owned by the orchestrator for the lifetime of a run and threaded through
/// every resolution call.
#[derive(Debug, Clone, Default)]
pub struct MasterTables {
    pub dates: KeyRegistry<DateKey>,
    pub airports: KeyRegistry<AirportKey>,
    pub airlines: KeyRegistry<AirlineKey>,
    pub routes: KeyRegistry<RouteKey>,
    pub flight_types: KeyRegistry<FlightTypeKey>,
    iata_codes: BTreeMap<SurrogateId, String>,
}

/// Number of entries per dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DimensionCounts {
    pub dates: usize,
    pub airports: usize,
    pub airlines: usize,
    pub routes: usize,
    pub flight_types: usize,
}

impl DimensionCounts {
    pub fn total(&self) -> usize {
        self.dates + self.airports + self.airlines + self.routes + self.flight_types
    }
}

impl MasterTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> DimensionCounts {
        DimensionCounts {
            dates: self.dates.len(),
            airports: self.airports.len(),
            airlines: self.airlines.len(),
            routes: self.routes.len(),
            flight_types: self.flight_types.len(),
        }
    }

    pub fn iata_code(&self, airport_id: SurrogateId) -> Option<&str> {
        self.iata_codes.get(&airport_id).map(String::as_str)
    }

    /// Set the code of a registered airport that has none yet.
    ///
    /// Returns false, leaving the table untouched, if the airport is unknown
    /// or already carries a code.
    pub fn set_iata_code(&mut self, airport_id: SurrogateId, code: &str) -> bool {
        if self.airports.key(airport_id).is_none() || self.iata_codes.contains_key(&airport_id) {
            return false;
        }
        self.iata_codes.insert(airport_id, code.to_string());
        true
    }

    pub fn date_rows(&self) -> Vec<DateRow> {
        self.dates.iter().map(|(id, key)| DateRow::new(key, id)).collect()
    }

    pub fn airport_rows(&self) -> Vec<AirportRow> {
        self.airports
            .iter()
            .map(|(id, key)| AirportRow {
                reporting_airport: key.name().to_string(),
                airport_id: id,
                iata_code: self.iata_code(id).map(str::to_string),
            })
            .collect()
    }

    pub fn airline_rows(&self) -> Vec<AirlineRow> {
        self.airlines
            .iter()
            .map(|(id, key)| AirlineRow {
                airline_name: key.name().to_string(),
                airline_id: id,
            })
            .collect()
    }

    pub fn route_rows(&self) -> Vec<RouteRow> {
        self.routes
            .iter()
            .map(|(id, key)| RouteRow {
                origin_destination: key.origin_destination.clone(),
                origin_destination_country: key.origin_destination_country.clone(),
                route_id: id,
            })
            .collect()
    }

    pub fn flight_type_rows(&self) -> Vec<FlightTypeRow> {
        self.flight_types
            .iter()
            .map(|(id, key)| FlightTypeRow {
                scheduled_charter: key.name().to_string(),
                flight_type_id: id,
            })
            .collect()
    }
}
