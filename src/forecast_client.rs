use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::ApiConfig;
use crate::error::{DashboardError, Result};
use crate::models::{ForecastModel, ForecastRow, Observation, TargetColumn};

/// Parameters of one forecasting call
#[derive(Debug, Clone)]
pub struct ForecastRequest<'a> {
    pub actuals: &'a [Observation],
    pub horizon: usize,
    pub group_target: Option<&'a str>,
    pub target: TargetColumn,
    pub date_var: &'a str,
    pub models: &'a [ForecastModel],
}

/// Remote forecasting service.
///
/// Implementations must return rows normalized to `ForecastRow` and sorted by
/// date (stable, so rows sharing a date keep the service's order).
#[allow(async_fn_in_trait)]
pub trait ForecastService {
    async fn forecast(&self, request: &ForecastRequest<'_>) -> Result<Vec<ForecastRow>>;
}

/// HTTP client for the forecasting API
pub struct HttpForecastClient {
    client: Client,
    url: String,
    token: String,
}

#[derive(Debug, Serialize)]
struct ForecastBody<'a> {
    actuals: &'a [Observation],
    fcast_horizon: usize,
    group_target: Option<&'a str>,
    target_var: &'a str,
    date_var: &'a str,
    models_list: Vec<&'static str>,
}

/// One record of the API response
#[derive(Debug, Clone, Deserialize)]
pub struct RawForecastRecord {
    #[serde(rename = ".index")]
    pub index: String,
    #[serde(rename = ".value")]
    pub value: Option<f64>,
    #[serde(rename = ".model_id")]
    pub model_id: u32,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ForecastResponse {
    Records(Vec<RawForecastRecord>),
    Wrapped { data: Vec<RawForecastRecord> },
}

impl HttpForecastClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| DashboardError::ForecastService(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: format!(
                "{}{}",
                config.base_url.trim_end_matches('/'),
                config.forecast_path
            ),
            token: config.token.clone(),
        })
    }
}

impl ForecastService for HttpForecastClient {
    async fn forecast(&self, request: &ForecastRequest<'_>) -> Result<Vec<ForecastRow>> {
        let body = ForecastBody {
            actuals: request.actuals,
            fcast_horizon: request.horizon,
            group_target: request.group_target,
            target_var: request.target.as_str(),
            date_var: request.date_var,
            models_list: request.models.iter().map(|m| m.as_str()).collect(),
        };

        debug!(
            url = %self.url,
            history = request.actuals.len(),
            horizon = request.horizon,
            target = %request.target,
            "Requesting forecast"
        );

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| DashboardError::ForecastService(format!("Failed to reach forecasting API: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(DashboardError::ForecastService(format!(
                "Forecast request failed: {} - {}",
                status, text
            )));
        }

        let text = response.text().await?;
        normalize_response(&text, request.target)
    }
}

/// Turn the raw API payload into date-sorted `ForecastRow`s for `target`
pub fn normalize_response(body: &str, target: TargetColumn) -> Result<Vec<ForecastRow>> {
    let parsed: ForecastResponse = serde_json::from_str(body)
        .map_err(|e| DashboardError::ForecastService(format!("Malformed forecast response: {}", e)))?;

    let records = match parsed {
        ForecastResponse::Records(records) => records,
        ForecastResponse::Wrapped { data } => data,
    };

    let mut rows = records
        .into_iter()
        .map(|record| {
            let date = parse_forecast_date(&record.index)?;
            let y = record.value.ok_or_else(|| {
                DashboardError::ForecastService(format!("Missing forecast value at {}", record.index))
            })?;
            Ok(ForecastRow::new(date, target, y, record.model_id))
        })
        .collect::<Result<Vec<_>>>()?;

    rows.sort_by_key(|row| row.date);
    Ok(rows)
}

/// Parse the service's time index into a UTC timestamp
pub fn parse_forecast_date(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(ts.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
        .ok_or_else(|| DashboardError::ForecastService(format!("Unparseable forecast date: {}", raw)))
}
