use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::{debug, info};

use super::{LoadSummary, Warehouse};
use crate::constants::fact_header;
use crate::domain::*;
use crate::error::{EtlError, Result};
use crate::pipeline::schema::StarSchema;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS dim_airport (
        airport_id     INTEGER PRIMARY KEY,
        airport_name   TEXT NOT NULL,
        iata_code      TEXT
    );
    CREATE TABLE IF NOT EXISTS dim_airline (
        airline_id     INTEGER PRIMARY KEY,
        airline_name   TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS dim_route (
        route_id                    INTEGER PRIMARY KEY,
        origin_destination          TEXT NOT NULL,
        origin_destination_country  TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS dim_flight_type (
        flight_type_id     INTEGER PRIMARY KEY,
        scheduled_charter  TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS dim_date (
        date_id           INTEGER PRIMARY KEY,
        full_date         TEXT NOT NULL,
        month             INTEGER NOT NULL,
        year              INTEGER NOT NULL,
        reporting_period  TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS fact_punctuality (
        date_id                                     INTEGER NOT NULL REFERENCES dim_date(date_id),
        airport_id                                  INTEGER NOT NULL REFERENCES dim_airport(airport_id),
        airline_id                                  INTEGER NOT NULL REFERENCES dim_airline(airline_id),
        route_id                                    INTEGER NOT NULL REFERENCES dim_route(route_id),
        flight_type_id                              INTEGER NOT NULL REFERENCES dim_flight_type(flight_type_id),
        number_flights_matched                      INTEGER,
        actual_flights_unmatched                    INTEGER,
        number_flights_cancelled                    INTEGER,
        flights_more_than_15_minutes_early_percent  REAL NOT NULL,
        flights_15_minutes_early_to_1_minute_early_percent REAL NOT NULL,
        flights_0_to_15_minutes_late_percent        REAL NOT NULL,
        flights_between_16_and_30_minutes_late_percent REAL NOT NULL,
        flights_between_31_and_60_minutes_late_percent REAL NOT NULL,
        flights_between_61_and_120_minutes_late_percent REAL NOT NULL,
        flights_between_121_and_180_minutes_late_percent REAL NOT NULL,
        flights_between_181_and_360_minutes_late_percent REAL NOT NULL,
        flights_more_than_360_minutes_late_percent  REAL NOT NULL,
        flights_unmatched_percent                   REAL NOT NULL,
        flights_cancelled_percent                   REAL NOT NULL,
        average_delay_mins                          REAL NOT NULL,
        previous_year_month_flights_matched         INTEGER,
        previous_year_month_early_to_15_mins_late_percent REAL NOT NULL,
        previous_year_month_average_delay           REAL NOT NULL
    );
"#;

/// SQLite-backed punctuality warehouse.
///
/// Every bulk call runs inside a single transaction, so a failed batch
/// leaves its table untouched. `load` writes all six tables in one
/// transaction.
pub struct SqliteWarehouse {
    conn: Mutex<Connection>,
}

impl SqliteWarehouse {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        info!("🗄️ Opened warehouse at {}", path.display());
        Self::with_schema(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_schema(Connection::open_in_memory()?)
    }

    fn with_schema(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| EtlError::Warehouse("connection lock poisoned".to_string()))
    }

    /// Run `write` in one transaction and commit it.
    fn in_transaction<F>(&self, table: &str, write: F) -> Result<usize>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<usize>,
    {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        let written = write(&*tx)?;
        tx.commit()?;
        debug!("Wrote {} rows to {}", written, table);
        Ok(written)
    }

    /// Row count of one warehouse table.
    pub fn row_count(&self, table: &str) -> Result<i64> {
        const TABLES: [&str; 6] = [
            "dim_airport",
            "dim_airline",
            "dim_route",
            "dim_flight_type",
            "dim_date",
            "fact_punctuality",
        ];
        if !TABLES.contains(&table) {
            return Err(EtlError::Warehouse(format!("unknown table {}", table)));
        }
        let conn = self.connection()?;
        let count = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })?;
        Ok(count)
    }

    pub fn airport(&self, airport_id: SurrogateId) -> Result<Option<AirportRow>> {
        let conn = self.connection()?;
        let row = conn
            .query_row(
                "SELECT airport_name, iata_code FROM dim_airport WHERE airport_id = ?1",
                params![airport_id.get()],
                |row| {
                    Ok(AirportRow {
                        reporting_airport: row.get(0)?,
                        airport_id,
                        iata_code: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }
}

fn fact_values(row: &FactRow) -> Vec<Value> {
    fn count(value: Option<i64>) -> Value {
        value.map(Value::Integer).unwrap_or(Value::Null)
    }

    let ids = &row.ids;
    let measures = &row.measures;
    let mut values: Vec<Value> = [
        ids.date_id,
        ids.airport_id,
        ids.airline_id,
        ids.route_id,
        ids.flight_type_id,
    ]
    .into_iter()
    .map(|id| Value::Integer(i64::from(id.get())))
    .collect();
    values.extend(measures.counts.iter().map(|c| count(*c)));
    values.extend(measures.rates.iter().map(|r| Value::Real(*r)));
    values.push(count(measures.previous_year_flights_matched));
    values.push(Value::Real(measures.previous_year_early_to_15_late_percent));
    values.push(Value::Real(measures.previous_year_average_delay));
    values
}

fn fact_insert_sql() -> String {
    let header = fact_header();
    let placeholders: Vec<String> = (1..=header.len()).map(|i| format!("?{}", i)).collect();
    format!(
        "INSERT INTO fact_punctuality ({}) VALUES ({})",
        header.join(", "),
        placeholders.join(", ")
    )
}

fn write_airports(conn: &Connection, rows: &[AirportRow]) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT INTO dim_airport (airport_id, airport_name, iata_code) VALUES (?1, ?2, ?3)
         ON CONFLICT(airport_id) DO UPDATE SET iata_code = COALESCE(excluded.iata_code, dim_airport.iata_code)",
    )?;
    for row in rows {
        stmt.execute(params![
            row.airport_id.get(),
            row.reporting_airport,
            row.iata_code
        ])?;
    }
    Ok(rows.len())
}

fn write_airlines(conn: &Connection, rows: &[AirlineRow]) -> rusqlite::Result<usize> {
    let mut stmt =
        conn.prepare("INSERT INTO dim_airline (airline_id, airline_name) VALUES (?1, ?2)")?;
    for row in rows {
        stmt.execute(params![row.airline_id.get(), row.airline_name])?;
    }
    Ok(rows.len())
}

fn write_routes(conn: &Connection, rows: &[RouteRow]) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT INTO dim_route (route_id, origin_destination, origin_destination_country)
         VALUES (?1, ?2, ?3)",
    )?;
    for row in rows {
        stmt.execute(params![
            row.route_id.get(),
            row.origin_destination,
            row.origin_destination_country
        ])?;
    }
    Ok(rows.len())
}

fn write_flight_types(conn: &Connection, rows: &[FlightTypeRow]) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT INTO dim_flight_type (flight_type_id, scheduled_charter) VALUES (?1, ?2)",
    )?;
    for row in rows {
        stmt.execute(params![row.flight_type_id.get(), row.scheduled_charter])?;
    }
    Ok(rows.len())
}

fn write_dates(conn: &Connection, rows: &[DateRow]) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT INTO dim_date (date_id, full_date, month, year, reporting_period)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for row in rows {
        stmt.execute(params![
            row.date_id.get(),
            row.period_date.format("%Y-%m-%d").to_string(),
            row.month,
            row.year,
            row.reporting_period
        ])?;
    }
    Ok(rows.len())
}

fn write_facts<'a, I>(conn: &Connection, rows: I) -> rusqlite::Result<usize>
where
    I: IntoIterator<Item = &'a FactRow>,
{
    let mut stmt = conn.prepare(&fact_insert_sql())?;
    let mut written = 0;
    for row in rows {
        stmt.execute(params_from_iter(fact_values(row)))?;
        written += 1;
    }
    Ok(written)
}

#[async_trait]
impl Warehouse for SqliteWarehouse {
    async fn upsert_airports(&self, rows: &[AirportRow]) -> Result<usize> {
        self.in_transaction("dim_airport", |conn| write_airports(conn, rows))
    }

    async fn insert_airlines(&self, rows: &[AirlineRow]) -> Result<usize> {
        self.in_transaction("dim_airline", |conn| write_airlines(conn, rows))
    }

    async fn insert_routes(&self, rows: &[RouteRow]) -> Result<usize> {
        self.in_transaction("dim_route", |conn| write_routes(conn, rows))
    }

    async fn insert_flight_types(&self, rows: &[FlightTypeRow]) -> Result<usize> {
        self.in_transaction("dim_flight_type", |conn| write_flight_types(conn, rows))
    }

    async fn insert_dates(&self, rows: &[DateRow]) -> Result<usize> {
        self.in_transaction("dim_date", |conn| write_dates(conn, rows))
    }

    async fn insert_facts(&self, rows: &[FactRow]) -> Result<usize> {
        self.in_transaction("fact_punctuality", |conn| write_facts(conn, rows))
    }

    async fn load(&self, schema: &StarSchema) -> Result<LoadSummary> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        let summary = LoadSummary {
            airports: write_airports(&tx, &schema.airports)?,
            airlines: write_airlines(&tx, &schema.airlines)?,
            routes: write_routes(&tx, &schema.routes)?,
            flight_types: write_flight_types(&tx, &schema.flight_types)?,
            dates: write_dates(&tx, &schema.dates)?,
            facts: write_facts(&tx, schema.facts())?,
        };
        tx.commit()?;
        debug!("Committed star schema load with {} facts", summary.facts);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fact_insert_sql_covers_every_column() {
        let sql = fact_insert_sql();
        assert!(sql.starts_with("INSERT INTO fact_punctuality (date_id, airport_id"));
        assert!(sql.ends_with("?23)"));
    }

    #[test]
    fn test_fact_values_keep_null_counts() {
        let row = FactRow {
            ids: DimensionIds {
                date_id: SurrogateId(1),
                airport_id: SurrogateId(2),
                airline_id: SurrogateId(3),
                route_id: SurrogateId(4),
                flight_type_id: SurrogateId(5),
            },
            measures: Measures::default(),
        };
        let values = fact_values(&row);
        assert_eq!(values.len(), fact_header().len());
        assert_eq!(values[1], Value::Integer(2));
        assert_eq!(values[5], Value::Null);
        assert_eq!(values[8], Value::Real(0.0));
    }

    #[tokio::test]
    async fn test_unknown_table_is_rejected() {
        let warehouse = SqliteWarehouse::open_in_memory().unwrap();
        assert!(warehouse.row_count("sqlite_master; DROP TABLE dim_date").is_err());
        assert_eq!(warehouse.row_count("dim_date").unwrap(), 0);
    }
}
