use crate::domain::{ExtractRecord, FactRow};
use crate::error::{EtlError, Result};

use super::resolver::ResolvedBatch;

/// Pair every record with its resolved ids to build fact rows.
///
/// A length mismatch means a record lost its ids during resolution, which is
/// reported instead of producing a partial fact table.
pub fn project_facts(batch: &[ExtractRecord], resolved: &ResolvedBatch) -> Result<Vec<FactRow>> {
    if batch.len() != resolved.ids.len() {
        return Err(EtlError::UnresolvedKey {
            dimension: "fact",
            key: format!("{} records for {} id rows", batch.len(), resolved.ids.len()),
        });
    }

    Ok(batch
        .iter()
        .zip(&resolved.ids)
        .map(|(record, ids)| FactRow {
            ids: *ids,
            measures: record.measures.clone(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DimensionIds, Measures, SurrogateId};
    use crate::pipeline::processing::masters::DimensionCounts;
    use chrono::NaiveDate;

    fn record(matched: i64) -> ExtractRecord {
        let mut measures = Measures::default();
        measures.counts[0] = Some(matched);
        ExtractRecord {
            reporting_period: "202301".to_string(),
            period_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            run_date: None,
            reporting_airport: "HEATHROW".to_string(),
            airline_name: "AER LINGUS".to_string(),
            origin_destination: "DUBLIN".to_string(),
            origin_destination_country: "IRELAND".to_string(),
            scheduled_charter: "S".to_string(),
            measures,
        }
    }

    fn ids(n: u32) -> DimensionIds {
        DimensionIds {
            date_id: SurrogateId(1),
            airport_id: SurrogateId(n),
            airline_id: SurrogateId(1),
            route_id: SurrogateId(1),
            flight_type_id: SurrogateId(1),
        }
    }

    #[test]
    fn test_projection_keeps_order_and_measures() {
        let batch = vec![record(10), record(20)];
        let resolved = ResolvedBatch {
            ids: vec![ids(1), ids(2)],
            allocated: DimensionCounts::default(),
        };

        let facts = project_facts(&batch, &resolved).unwrap();
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[1].ids.airport_id, SurrogateId(2));
        assert_eq!(facts[1].measures.counts[0], Some(20));
    }

    #[test]
    fn test_missing_ids_are_surfaced() {
        let batch = vec![record(10), record(20)];
        let resolved = ResolvedBatch {
            ids: vec![ids(1)],
            allocated: DimensionCounts::default(),
        };
        assert!(project_facts(&batch, &resolved).is_err());
    }
}
