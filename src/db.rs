use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, error, info};

use crate::config::DbConfig;
use crate::error::{DashboardError, Result};
use crate::models::Observation;

const LOAD_QUERY: &str = "SELECT * FROM sales_economics;";

/// Anything that can produce the raw observation table
#[allow(async_fn_in_trait)]
pub trait DataSource {
    async fn load_observations(&self) -> Result<Vec<Observation>>;
}

/// Postgres-backed loader for the `sales_economics` table
pub struct PgDataSource {
    config: DbConfig,
}

impl PgDataSource {
    pub fn new(config: DbConfig) -> Self {
        Self { config }
    }
}

impl DataSource for PgDataSource {
    async fn load_observations(&self) -> Result<Vec<Observation>> {
        let client = connect(&self.config).await?;
        fetch_observations(&client).await
    }
}

/// Connect to the PostgreSQL database
pub async fn connect(config: &DbConfig) -> Result<Client> {
    let connection_string = format!(
        "host={} port={} user={} password={} dbname={}",
        config.host, config.port, config.user, config.password, config.database
    );
    info!(host = %config.host, port = config.port, database = %config.database, "Connecting to database");

    let client = if config.use_tls {
        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| DashboardError::Connection(format!("TLS setup failed: {}", e)))?;
        let connector = MakeTlsConnector::new(connector);

        let (client, connection) = tokio_postgres::connect(&connection_string, connector).await?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("Database connection error: {}", e);
            }
        });

        client
    } else {
        let (client, connection) = tokio_postgres::connect(&connection_string, NoTls).await?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("Database connection error: {}", e);
            }
        });

        client
    };

    Ok(client)
}

/// Fetch every row of `sales_economics`
pub async fn fetch_observations(client: &Client) -> Result<Vec<Observation>> {
    let rows = client.query(LOAD_QUERY, &[]).await?;
    debug!("Fetched {} rows from sales_economics", rows.len());

    rows.iter().map(row_to_observation).collect()
}

fn row_to_observation(row: &Row) -> Result<Observation> {
    let variable: String = row.try_get("variable")?;
    Ok(Observation {
        variable,
        date: read_timestamp(row, "date")?,
        value: read_float(row, "value")?,
        value01: read_float(row, "value01")?,
    })
}

/// `date` may be stored as date, timestamp or timestamptz
fn read_timestamp(row: &Row, column: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = row.try_get::<_, DateTime<Utc>>(column) {
        return Ok(ts);
    }
    if let Ok(ts) = row.try_get::<_, NaiveDateTime>(column) {
        return Ok(ts.and_utc());
    }
    let date: NaiveDate = row.try_get(column)?;
    date.and_hms_opt(0, 0, 0)
        .map(|ts| ts.and_utc())
        .ok_or_else(|| DashboardError::Connection(format!("Invalid date in column {}", column)))
}

/// Value columns may be float8, float4 or numeric
fn read_float(row: &Row, column: &str) -> Result<f64> {
    let value = if let Ok(v) = row.try_get::<_, Option<f64>>(column) {
        v
    } else if let Ok(v) = row.try_get::<_, Option<f32>>(column) {
        v.map(f64::from)
    } else {
        match row.try_get::<_, Option<Decimal>>(column)? {
            Some(d) => Some(d.to_f64().ok_or_else(|| {
                DashboardError::Connection(format!("Value out of range in column {}", column))
            })?),
            None => None,
        }
    };
    require_value(column, value)
}

fn require_value(column: &str, value: Option<f64>) -> Result<f64> {
    value.ok_or_else(|| DashboardError::Connection(format!("Column {} is NULL", column)))
}
