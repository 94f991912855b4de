#![allow(dead_code)]

use std::path::{Path, PathBuf};

pub const HEADER: &str = "run_date,reporting_period,reporting_airport,origin_destination_country,origin_destination,airline_name,scheduled_charter,number_flights_matched,actual_flights_unmatched,number_flights_cancelled,flights_more_than_15_minutes_early_percent,flights_15_minutes_early_to_1_minute_early_percent,flights_0_to_15_minutes_late_percent,flights_between_16_and_30_minutes_late_percent,flights_between_31_and_60_minutes_late_percent,flights_between_61_and_120_minutes_late_percent,flights_between_121_and_180_minutes_late_percent,flights_between_181_and_360_minutes_late_percent,flights_more_than_360_minutes_late_percent,flights_unmatched_percent,flights_cancelled_percent,average_delay_mins,previous_year_month_flights_matched,previous_year_month_early_to_15_mins_late_percent,previous_year_month_average_delay";

/// One extract row; the measures are fixed.
pub fn row(period: &str, airport: &str, airline: &str, destination: &str) -> String {
    format!(
        "2023-03-02,{},{},SPAIN,{},{},S,120,2,3,10,20,30,15,10,5,4,3,1,1.5,2.5,9.25,110,70.5,8",
        period, airport, destination, airline
    )
}

pub fn extract_name(period: &str) -> String {
    format!("{}_Punctuality_Statistics_UK_airports.csv", period)
}

pub fn write_extract(dir: &Path, period: &str, rows: &[String]) -> PathBuf {
    let path = dir.join(extract_name(period));
    let mut content = String::from(HEADER);
    for row in rows {
        content.push('\n');
        content.push_str(row);
    }
    content.push('\n');
    std::fs::write(&path, content).unwrap();
    path
}

pub fn write_reference(dir: &Path) -> PathBuf {
    let path = dir.join("airports.csv");
    std::fs::write(
        &path,
        "name,iata_code\nLondon Heathrow Airport,LHR\nLondon Gatwick Airport,LGW\nManchester Airport,MAN\nHeliport,\n",
    )
    .unwrap();
    path
}
