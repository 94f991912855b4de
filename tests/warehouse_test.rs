mod common;

use anyhow::Result;
use tempfile::tempdir;

use common::{row, write_extract};
use punctuality_etl::constants::DEFAULT_SOURCE_PATTERN;
use punctuality_etl::domain::{AirportRow, SurrogateId};
use punctuality_etl::pipeline::storage::{InMemoryWarehouse, SqliteWarehouse};
use punctuality_etl::pipeline::{
    load_star_schema, LoadSummary, PipelineOrchestrator, StarSchema, Warehouse,
};

fn airport(code: Option<&str>) -> AirportRow {
    AirportRow {
        reporting_airport: "LONDON HEATHROW".to_string(),
        airport_id: SurrogateId(7),
        iata_code: code.map(str::to_string),
    }
}

fn sample_schema() -> StarSchema {
    let dir = tempdir().unwrap();
    let jan = write_extract(
        dir.path(),
        "202301",
        &[
            row("202301", "HEATHROW", "EASYJET", "MALAGA"),
            row("202301", "GATWICK", "RYANAIR", "ALICANTE"),
        ],
    );
    let feb = write_extract(dir.path(), "202302", &[row("202302", "HEATHROW", "EASYJET", "MALAGA")]);
    PipelineOrchestrator::new(DEFAULT_SOURCE_PATTERN, None)
        .run(&[jan, feb])
        .schema
}

#[tokio::test]
async fn test_sqlite_airport_upsert_keeps_one_row() -> Result<()> {
    let dir = tempdir()?;
    let warehouse = SqliteWarehouse::open(dir.path().join("db").join("punctuality.db"))?;

    warehouse.upsert_airports(&[airport(None)]).await?;
    warehouse.upsert_airports(&[airport(Some("LHR"))]).await?;

    assert_eq!(warehouse.row_count("dim_airport")?, 1);
    assert_eq!(warehouse.airport(SurrogateId(7))?, Some(airport(Some("LHR"))));

    // A later load without a code leaves the stored one alone.
    warehouse.upsert_airports(&[airport(None)]).await?;
    assert_eq!(warehouse.airport(SurrogateId(7))?, Some(airport(Some("LHR"))));
    Ok(())
}

#[tokio::test]
async fn test_sqlite_loads_full_schema() -> Result<()> {
    let schema = sample_schema();
    let warehouse = SqliteWarehouse::open_in_memory()?;

    let summary = load_star_schema(&warehouse, &schema).await?;
    assert_eq!(summary.airports, 2);
    assert_eq!(summary.airlines, 2);
    assert_eq!(summary.routes, 2);
    assert_eq!(summary.flight_types, 1);
    assert_eq!(summary.dates, 2);
    assert_eq!(summary.facts, 3);

    assert_eq!(warehouse.row_count("fact_punctuality")?, 3);
    assert_eq!(warehouse.row_count("dim_date")?, 2);
    Ok(())
}

#[tokio::test]
async fn test_sqlite_rejects_duplicate_dimension_ids() -> Result<()> {
    let schema = sample_schema();
    let warehouse = SqliteWarehouse::open_in_memory()?;
    warehouse.insert_airlines(&schema.airlines).await?;

    assert!(warehouse.insert_airlines(&schema.airlines).await.is_err());
    assert_eq!(warehouse.row_count("dim_airline")?, 2);
    Ok(())
}

#[tokio::test]
async fn test_in_memory_matches_sqlite_load() -> Result<()> {
    let schema = sample_schema();
    let memory = InMemoryWarehouse::new();
    let sqlite = SqliteWarehouse::open_in_memory()?;

    let from_memory = load_star_schema(&memory, &schema).await?;
    let from_sqlite = load_star_schema(&sqlite, &schema).await?;

    assert_eq!(from_memory, from_sqlite);
    assert_eq!(memory.fact_count()?, 3);
    assert_eq!(memory.airports()?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_sqlite_failed_load_leaves_no_partial_state() -> Result<()> {
    let schema = sample_schema();
    let warehouse = SqliteWarehouse::open_in_memory()?;
    // A date row already present makes the dim_date step of the load conflict.
    warehouse.insert_dates(&schema.dates[..1]).await?;

    assert!(load_star_schema(&warehouse, &schema).await.is_err());

    for table in [
        "dim_airport",
        "dim_airline",
        "dim_route",
        "dim_flight_type",
        "fact_punctuality",
    ] {
        assert_eq!(warehouse.row_count(table)?, 0, "{} was written", table);
    }
    assert_eq!(warehouse.row_count("dim_date")?, 1);
    Ok(())
}

#[tokio::test]
async fn test_in_memory_failed_load_leaves_no_partial_state() -> Result<()> {
    let schema = sample_schema();
    let warehouse = InMemoryWarehouse::new();
    warehouse.insert_dates(&schema.dates[..1]).await?;

    assert!(load_star_schema(&warehouse, &schema).await.is_err());
    assert_eq!(
        warehouse.row_counts()?,
        LoadSummary {
            dates: 1,
            ..LoadSummary::default()
        }
    );
    Ok(())
}
