/// Column names used by the punctuality extracts, the reference list and the
/// generated artifacts. These are the single source of truth for CSV headers.

// ── Natural-key columns ─────────────────────────────────────────────────────
pub const REPORTING_PERIOD: &str = "reporting_period";
pub const PERIOD_DATE: &str = "period_date";
pub const REPORTING_AIRPORT: &str = "reporting_airport";
pub const AIRLINE_NAME: &str = "airline_name";
pub const ORIGIN_DESTINATION: &str = "origin_destination";
pub const ORIGIN_DESTINATION_COUNTRY: &str = "origin_destination_country";
pub const SCHEDULED_CHARTER: &str = "scheduled_charter";
pub const RUN_DATE: &str = "run_date";

// ── Surrogate id columns ────────────────────────────────────────────────────
pub const DATE_ID: &str = "date_id";
pub const AIRPORT_ID: &str = "airport_id";
pub const AIRLINE_ID: &str = "airline_id";
pub const ROUTE_ID: &str = "route_id";
pub const FLIGHT_TYPE_ID: &str = "flight_type_id";

// ── Reference list ──────────────────────────────────────────────────────────
pub const REFERENCE_NAME: &str = "name";
pub const IATA_CODE: &str = "iata_code";
pub const IATA_CODE_LEN: usize = 3;

// ── Fact measures ───────────────────────────────────────────────────────────
pub const NUMBER_FLIGHTS_MATCHED: &str = "number_flights_matched";
pub const ACTUAL_FLIGHTS_UNMATCHED: &str = "actual_flights_unmatched";
pub const NUMBER_FLIGHTS_CANCELLED: &str = "number_flights_cancelled";
pub const FLIGHTS_UNMATCHED_PERCENT: &str = "flights_unmatched_percent";
pub const PREVIOUS_YEAR_MONTH_FLIGHTS_MATCHED: &str = "previous_year_month_flights_matched";

/// Integer measures in fact column order.
pub const COUNT_MEASURES: [&str; 3] = [
    NUMBER_FLIGHTS_MATCHED,
    ACTUAL_FLIGHTS_UNMATCHED,
    NUMBER_FLIGHTS_CANCELLED,
];

/// Percentage and delay measures in fact column order. Blank cells read as 0.
pub const RATE_MEASURES: [&str; 12] = [
    "flights_more_than_15_minutes_early_percent",
    "flights_15_minutes_early_to_1_minute_early_percent",
    "flights_0_to_15_minutes_late_percent",
    "flights_between_16_and_30_minutes_late_percent",
    "flights_between_31_and_60_minutes_late_percent",
    "flights_between_61_and_120_minutes_late_percent",
    "flights_between_121_and_180_minutes_late_percent",
    "flights_between_181_and_360_minutes_late_percent",
    "flights_more_than_360_minutes_late_percent",
    FLIGHTS_UNMATCHED_PERCENT,
    "flights_cancelled_percent",
    "average_delay_mins",
];

/// Previous-year measures that trail the fact row.
pub const PREVIOUS_YEAR_EARLY_TO_15_LATE_PERCENT: &str =
    "previous_year_month_early_to_15_mins_late_percent";
pub const PREVIOUS_YEAR_AVERAGE_DELAY: &str = "previous_year_month_average_delay";

/// Columns absent from some yearly extracts; backfilled with defaults.
pub const OPTIONAL_COLUMNS: [&str; 4] = [
    ACTUAL_FLIGHTS_UNMATCHED,
    FLIGHTS_UNMATCHED_PERCENT,
    PREVIOUS_YEAR_MONTH_FLIGHTS_MATCHED,
    RUN_DATE,
];

/// Natural-key source columns, in dimension order.
pub const KEY_COLUMNS: [&str; 6] = [
    REPORTING_PERIOD,
    REPORTING_AIRPORT,
    AIRLINE_NAME,
    ORIGIN_DESTINATION,
    ORIGIN_DESTINATION_COUNTRY,
    SCHEDULED_CHARTER,
];

/// Columns every extract must carry once optional columns are backfilled.
pub fn required_columns() -> Vec<&'static str> {
    let header = fact_header();
    KEY_COLUMNS
        .iter()
        .chain(&header[5..])
        .copied()
        .filter(|c| !OPTIONAL_COLUMNS.contains(c))
        .collect()
}

// ── Defaults ────────────────────────────────────────────────────────────────
pub const DEFAULT_SOURCE_PATTERN: &str = "*_Punctuality_Statistics_UK_airports.csv";
pub const DEFAULT_MATCH_THRESHOLD: u8 = 80;
pub const DEFAULT_OUTPUT_DIR: &str = "cleaned_data";
pub const DEFAULT_WAREHOUSE_PATH: &str = "punctuality.db";
pub const DEFAULT_CONFIG_FILE: &str = "etl.toml";
pub const RUN_REPORT_FILE: &str = "run_report.json";
pub const FACT_FILE_PREFIX: &str = "fact_punctuality";

/// Build the fact CSV header in stable column order.
pub fn fact_header() -> Vec<&'static str> {
    let mut header = vec![DATE_ID, AIRPORT_ID, AIRLINE_ID, ROUTE_ID, FLIGHT_TYPE_ID];
    header.extend_from_slice(&COUNT_MEASURES);
    header.extend_from_slice(&RATE_MEASURES);
    header.push(PREVIOUS_YEAR_MONTH_FLIGHTS_MATCHED);
    header.push(PREVIOUS_YEAR_EARLY_TO_15_LATE_PERCENT);
    header.push(PREVIOUS_YEAR_AVERAGE_DELAY);
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fact_header_order() {
        let header = fact_header();
        assert_eq!(header.len(), 23);
        assert_eq!(&header[..5], &[DATE_ID, AIRPORT_ID, AIRLINE_ID, ROUTE_ID, FLIGHT_TYPE_ID]);
        assert_eq!(header[5], NUMBER_FLIGHTS_MATCHED);
        assert_eq!(header[22], PREVIOUS_YEAR_AVERAGE_DELAY);
    }

    #[test]
    fn test_required_columns_exclude_backfilled() {
        let required = required_columns();
        assert_eq!(required.len(), 6 + 18 - 3);
        assert!(required.contains(&REPORTING_AIRPORT));
        assert!(required.contains(&NUMBER_FLIGHTS_MATCHED));
        assert!(!required.contains(&ACTUAL_FLIGHTS_UNMATCHED));
        assert!(!required.contains(&FLIGHTS_UNMATCHED_PERCENT));
    }
}
