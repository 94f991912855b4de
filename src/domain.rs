//! Domain data shapes shared across layers: natural keys, surrogate ids,
//! normalized extract records and the star-schema rows built from them.

use std::fmt;
use std::hash::Hash;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::constants::*;

/// Dense integer identifier assigned in first-seen order, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurrogateId(pub u32);

impl SurrogateId {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SurrogateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trim and upper-case free text so keys compare case- and whitespace-insensitively.
pub fn normalize_text(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// A business key that identifies one dimension entity.
///
/// Constructors normalize their text, so two keys built from `" lhr "` and
/// `"LHR"` are equal.
pub trait NaturalKey: Clone + Eq + Hash + fmt::Debug {
    /// Dimension name used in logs, metrics and errors.
    const DIMENSION: &'static str;
    /// Source columns that make up the key.
    const COLUMNS: &'static [&'static str];

    /// First key column whose value is blank, if any.
    fn blank_component(&self) -> Option<&'static str>;
}

fn first_blank(parts: &[(&'static str, &str)]) -> Option<&'static str> {
    parts
        .iter()
        .find(|(_, value)| value.is_empty())
        .map(|(column, _)| *column)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DateKey {
    pub reporting_period: String,
    pub period_date: NaiveDate,
}

impl DateKey {
    pub fn new(reporting_period: &str, period_date: NaiveDate) -> Self {
        Self {
            reporting_period: reporting_period.trim().to_string(),
            period_date,
        }
    }
}

impl NaturalKey for DateKey {
    const DIMENSION: &'static str = "date";
    const COLUMNS: &'static [&'static str] = &[REPORTING_PERIOD, PERIOD_DATE];

    fn blank_component(&self) -> Option<&'static str> {
        first_blank(&[(REPORTING_PERIOD, &self.reporting_period)])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AirportKey(String);

impl AirportKey {
    pub fn new(name: &str) -> Self {
        Self(normalize_text(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl NaturalKey for AirportKey {
    const DIMENSION: &'static str = "airport";
    const COLUMNS: &'static [&'static str] = &[REPORTING_AIRPORT];

    fn blank_component(&self) -> Option<&'static str> {
        first_blank(&[(REPORTING_AIRPORT, &self.0)])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AirlineKey(String);

impl AirlineKey {
    pub fn new(name: &str) -> Self {
        Self(normalize_text(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl NaturalKey for AirlineKey {
    const DIMENSION: &'static str = "airline";
    const COLUMNS: &'static [&'static str] = &[AIRLINE_NAME];

    fn blank_component(&self) -> Option<&'static str> {
        first_blank(&[(AIRLINE_NAME, &self.0)])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub origin_destination: String,
    pub origin_destination_country: String,
}

impl RouteKey {
    pub fn new(origin_destination: &str, origin_destination_country: &str) -> Self {
        Self {
            origin_destination: normalize_text(origin_destination),
            origin_destination_country: normalize_text(origin_destination_country),
        }
    }
}

impl NaturalKey for RouteKey {
    const DIMENSION: &'static str = "route";
    const COLUMNS: &'static [&'static str] = &[ORIGIN_DESTINATION, ORIGIN_DESTINATION_COUNTRY];

    fn blank_component(&self) -> Option<&'static str> {
        first_blank(&[
            (ORIGIN_DESTINATION, &self.origin_destination),
            (ORIGIN_DESTINATION_COUNTRY, &self.origin_destination_country),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlightTypeKey(String);

impl FlightTypeKey {
    pub fn new(scheduled_charter: &str) -> Self {
        Self(normalize_text(scheduled_charter))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl NaturalKey for FlightTypeKey {
    const DIMENSION: &'static str = "flight_type";
    const COLUMNS: &'static [&'static str] = &[SCHEDULED_CHARTER];

    fn blank_component(&self) -> Option<&'static str> {
        first_blank(&[(SCHEDULED_CHARTER, &self.0)])
    }
}

/// Punctuality measures carried through to the fact table untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measures {
    /// `COUNT_MEASURES`, in order. Blank cells stay null.
    pub counts: [Option<i64>; 3],
    /// `RATE_MEASURES`, in order. Blank cells read as 0.
    pub rates: [f64; 12],
    pub previous_year_flights_matched: Option<i64>,
    pub previous_year_early_to_15_late_percent: f64,
    pub previous_year_average_delay: f64,
}

impl Default for Measures {
    fn default() -> Self {
        Self {
            counts: [None; 3],
            rates: [0.0; 12],
            previous_year_flights_matched: None,
            previous_year_early_to_15_late_percent: 0.0,
            previous_year_average_delay: 0.0,
        }
    }
}

/// One cleaned, schema-complete row of a monthly extract.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractRecord {
    pub reporting_period: String,
    pub period_date: NaiveDate,
    pub run_date: Option<NaiveDate>,
    pub reporting_airport: String,
    pub airline_name: String,
    pub origin_destination: String,
    pub origin_destination_country: String,
    pub scheduled_charter: String,
    pub measures: Measures,
}

impl ExtractRecord {
    pub fn date_key(&self) -> DateKey {
        DateKey::new(&self.reporting_period, self.period_date)
    }

    pub fn airport_key(&self) -> AirportKey {
        AirportKey::new(&self.reporting_airport)
    }

    pub fn airline_key(&self) -> AirlineKey {
        AirlineKey::new(&self.airline_name)
    }

    pub fn route_key(&self) -> RouteKey {
        RouteKey::new(&self.origin_destination, &self.origin_destination_country)
    }

    pub fn flight_type_key(&self) -> FlightTypeKey {
        FlightTypeKey::new(&self.scheduled_charter)
    }
}

/// The five surrogate ids a fact row points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionIds {
    pub date_id: SurrogateId,
    pub airport_id: SurrogateId,
    pub airline_id: SurrogateId,
    pub route_id: SurrogateId,
    pub flight_type_id: SurrogateId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactRow {
    pub ids: DimensionIds,
    pub measures: Measures,
}

impl FactRow {
    /// Render the row as CSV fields in `constants::fact_header` order.
    pub fn to_fields(&self) -> Vec<String> {
        fn opt(value: Option<i64>) -> String {
            value.map(|v| v.to_string()).unwrap_or_default()
        }

        let mut fields = vec![
            self.ids.date_id.to_string(),
            self.ids.airport_id.to_string(),
            self.ids.airline_id.to_string(),
            self.ids.route_id.to_string(),
            self.ids.flight_type_id.to_string(),
        ];
        fields.extend(self.measures.counts.iter().map(|c| opt(*c)));
        fields.extend(self.measures.rates.iter().map(|r| r.to_string()));
        fields.push(opt(self.measures.previous_year_flights_matched));
        fields.push(self.measures.previous_year_early_to_15_late_percent.to_string());
        fields.push(self.measures.previous_year_average_delay.to_string());
        fields
    }
}

// ── Dimension rows, columns in natural key / surrogate / extras order ───────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRow {
    pub reporting_period: String,
    pub period_date: NaiveDate,
    pub date_id: SurrogateId,
    pub month: u32,
    pub year: i32,
}

impl DateRow {
    pub fn new(key: &DateKey, date_id: SurrogateId) -> Self {
        Self {
            reporting_period: key.reporting_period.clone(),
            period_date: key.period_date,
            date_id,
            month: key.period_date.month(),
            year: key.period_date.year(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirportRow {
    pub reporting_airport: String,
    pub airport_id: SurrogateId,
    pub iata_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirlineRow {
    pub airline_name: String,
    pub airline_id: SurrogateId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRow {
    pub origin_destination: String,
    pub origin_destination_country: String,
    pub route_id: SurrogateId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightTypeRow {
    pub scheduled_charter: String,
    pub flight_type_id: SurrogateId,
}

/// One `(name, code)` pair from the IATA reference list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceAirport {
    pub name: String,
    pub iata_code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_normalize_on_construction() {
        assert_eq!(AirportKey::new(" lhr "), AirportKey::new("LHR"));
        assert_eq!(AirlineKey::new("british airways\t"), AirlineKey::new("BRITISH AIRWAYS"));
        assert_eq!(RouteKey::new(" paris", "france "), RouteKey::new("PARIS", "FRANCE"));
        assert_eq!(FlightTypeKey::new("s"), FlightTypeKey::new(" S "));
    }

    #[test]
    fn test_blank_component_reports_column() {
        assert_eq!(AirportKey::new("   ").blank_component(), Some(REPORTING_AIRPORT));
        assert_eq!(
            RouteKey::new("PARIS", "").blank_component(),
            Some(ORIGIN_DESTINATION_COUNTRY)
        );
        assert_eq!(RouteKey::new("PARIS", "FRANCE").blank_component(), None);
    }

    #[test]
    fn test_date_row_derives_month_and_year() {
        let date = NaiveDate::from_ymd_opt(2023, 7, 1).unwrap();
        let row = DateRow::new(&DateKey::new("202307", date), SurrogateId(4));
        assert_eq!(row.month, 7);
        assert_eq!(row.year, 2023);
        assert_eq!(row.date_id, SurrogateId(4));
    }

    #[test]
    fn test_fact_fields_leave_missing_counts_blank() {
        let ids = DimensionIds {
            date_id: SurrogateId(1),
            airport_id: SurrogateId(2),
            airline_id: SurrogateId(3),
            route_id: SurrogateId(4),
            flight_type_id: SurrogateId(5),
        };
        let mut measures = Measures::default();
        measures.counts[0] = Some(12);
        let fields = FactRow { ids, measures }.to_fields();
        assert_eq!(fields.len(), fact_header().len());
        assert_eq!(&fields[..6], &["1", "2", "3", "4", "5", "12"]);
        assert_eq!(fields[6], "");
    }
}
