use metrics::counter;
use tracing::{debug, instrument};

use crate::domain::*;
use crate::error::Result;

use super::masters::{DimensionCounts, MasterTables};
use super::registry::KeyRegistry;

/// A batch with a surrogate id per dimension attached to every row.
#[derive(Debug, Clone)]
pub struct ResolvedBatch {
    /// One entry per input record, in input order.
    pub ids: Vec<DimensionIds>,
    /// Ids newly allocated by this batch.
    pub allocated: DimensionCounts,
}

/// Looks up or allocates surrogate ids for all five dimensions of a batch.
pub struct DimensionResolver;

struct BatchKeys {
    dates: Vec<DateKey>,
    airports: Vec<AirportKey>,
    airlines: Vec<AirlineKey>,
    routes: Vec<RouteKey>,
    flight_types: Vec<FlightTypeKey>,
}

impl BatchKeys {
    fn extract(batch: &[ExtractRecord]) -> Self {
        Self {
            dates: batch.iter().map(ExtractRecord::date_key).collect(),
            airports: batch.iter().map(ExtractRecord::airport_key).collect(),
            airlines: batch.iter().map(ExtractRecord::airline_key).collect(),
            routes: batch.iter().map(ExtractRecord::route_key).collect(),
            flight_types: batch.iter().map(ExtractRecord::flight_type_key).collect(),
        }
    }

    fn validate(&self) -> Result<()> {
        KeyRegistry::<DateKey>::validate(&self.dates)?;
        KeyRegistry::<AirportKey>::validate(&self.airports)?;
        KeyRegistry::<AirlineKey>::validate(&self.airlines)?;
        KeyRegistry::<RouteKey>::validate(&self.routes)?;
        KeyRegistry::<FlightTypeKey>::validate(&self.flight_types)?;
        Ok(())
    }
}

fn record_allocation<K: NaturalKey>(allocated: usize) -> usize {
    if allocated > 0 {
        counter!("etl_surrogate_ids_allocated_total", "dimension" => K::DIMENSION)
            .increment(allocated as u64);
    }
    allocated
}

impl DimensionResolver {
    /// Resolve every dimension of `batch` against `masters`.
    ///
    /// Every key of every dimension is validated first, so a batch that fails
    /// leaves the masters exactly as they were. Registration then runs in
    /// date, airport, airline, route, flight type order.
    #[instrument(skip(batch, masters), fields(rows = batch.len()))]
    pub fn resolve(batch: &[ExtractRecord], masters: &mut MasterTables) -> Result<ResolvedBatch> {
        let keys = BatchKeys::extract(batch);
        keys.validate()?;

        let allocated = DimensionCounts {
            dates: record_allocation::<DateKey>(masters.dates.register(&keys.dates)),
            airports: record_allocation::<AirportKey>(masters.airports.register(&keys.airports)),
            airlines: record_allocation::<AirlineKey>(masters.airlines.register(&keys.airlines)),
            routes: record_allocation::<RouteKey>(masters.routes.register(&keys.routes)),
            flight_types: record_allocation::<FlightTypeKey>(
                masters.flight_types.register(&keys.flight_types),
            ),
        };

        let date_ids = masters.dates.lookup_all(&keys.dates)?;
        let airport_ids = masters.airports.lookup_all(&keys.airports)?;
        let airline_ids = masters.airlines.lookup_all(&keys.airlines)?;
        let route_ids = masters.routes.lookup_all(&keys.routes)?;
        let flight_type_ids = masters.flight_types.lookup_all(&keys.flight_types)?;

        let ids = (0..batch.len())
            .map(|row| DimensionIds {
                date_id: date_ids[row],
                airport_id: airport_ids[row],
                airline_id: airline_ids[row],
                route_id: route_ids[row],
                flight_type_id: flight_type_ids[row],
            })
            .collect();

        debug!(new_ids = allocated.total(), "Resolved batch");
        Ok(ResolvedBatch { ids, allocated })
    }
}
