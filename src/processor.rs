use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::error::{DashboardError, Result};
use crate::forecast_client::{ForecastRequest, ForecastService};
use crate::models::{
    CombinedSeries, ForecastModel, ForecastRow, ModelAssignment, ModelForecast, ModelForecasts,
    Observation, TargetColumn, ZoomRange,
};

/// Date column name sent to the forecasting API
pub const DATE_VAR: &str = "date";

/// How overlapping (model, date) pairs between the backtest and forecast
/// segments are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// Keep every row
    #[default]
    None,
    /// Keep the earliest row, i.e. the backtest one
    KeepFirst,
    /// Keep the latest row, i.e. the full-history forecast
    KeepLast,
}

/// Observed (min, max) of a variable's raw values
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MinMax {
    pub min: f64,
    pub max: f64,
}

impl MinMax {
    pub fn of(observations: &[Observation]) -> Option<Self> {
        let mut iter = observations.iter().map(|o| o.value);
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
        Some(Self { min, max })
    }

    /// Map a normalized value back to the raw scale
    pub fn denormalize(&self, value01: f64) -> f64 {
        value01 * (self.max - self.min) + self.min
    }
}

/// Rows of one variable, sorted by date
pub fn filter_variable(observations: &[Observation], variable: &str) -> Vec<Observation> {
    let mut filtered: Vec<Observation> = observations
        .iter()
        .filter(|o| o.variable == variable)
        .cloned()
        .collect();
    filtered.sort_by_key(|o| o.date);
    filtered
}

/// History without its last `horizon` points
pub fn backtest_slice(full: &[Observation], horizon: usize) -> Result<&[Observation]> {
    if horizon >= full.len() {
        return Err(DashboardError::InsufficientHistory {
            horizon,
            available: full.len(),
        });
    }
    Ok(&full[..full.len() - horizon])
}

/// Forecast `target` twice, once from the backtest history and once from the
/// full history, and concatenate the results in that order.
pub async fn combine_backtest_forecast<F: ForecastService>(
    service: &F,
    full: &[Observation],
    backtest: &[Observation],
    horizon: usize,
    target: TargetColumn,
    models: &[ForecastModel],
) -> Result<CombinedSeries> {
    if models.is_empty() {
        return Err(DashboardError::EmptyModelList);
    }
    if backtest.is_empty() {
        return Err(DashboardError::InsufficientHistory {
            horizon,
            available: full.len(),
        });
    }

    let backtest_rows = service
        .forecast(&ForecastRequest {
            actuals: backtest,
            horizon,
            group_target: None,
            target,
            date_var: DATE_VAR,
            models,
        })
        .await?;
    debug!(target = %target, rows = backtest_rows.len(), "Backtest forecast received");

    let forecast_rows = service
        .forecast(&ForecastRequest {
            actuals: full,
            horizon,
            group_target: None,
            target,
            date_var: DATE_VAR,
            models,
        })
        .await?;
    debug!(target = %target, rows = forecast_rows.len(), "Future forecast received");

    let backtest_len = backtest_rows.len();
    let mut rows = backtest_rows;
    rows.extend(forecast_rows);

    info!(
        target = %target,
        backtest = backtest_len,
        total = rows.len(),
        "Combined backtest and forecast"
    );

    Ok(CombinedSeries {
        target,
        backtest_rows: backtest_len,
        rows,
    })
}

/// Attach `value = value01 * (max - min) + min` to every normalized row
pub fn rescale_normalized(series: &mut CombinedSeries, range: MinMax) {
    for row in &mut series.rows {
        if let Some(v01) = row.value01 {
            row.value = Some(range.denormalize(v01));
        }
    }
}

/// Drop rows whose (model_id, date) already appeared, per `policy`
pub fn dedup_overlapping(series: &mut CombinedSeries, policy: DedupPolicy) {
    let before = series.rows.len();
    let rows = std::mem::take(&mut series.rows);

    let kept: Vec<(usize, ForecastRow)> = match policy {
        DedupPolicy::None => rows.into_iter().enumerate().collect(),
        DedupPolicy::KeepFirst => {
            let mut seen = HashSet::new();
            rows.into_iter()
                .enumerate()
                .filter(|(_, row)| seen.insert((row.model_id, row.date)))
                .collect()
        }
        DedupPolicy::KeepLast => {
            let mut seen = HashSet::new();
            let mut kept: Vec<_> = rows
                .into_iter()
                .enumerate()
                .rev()
                .filter(|(_, row)| seen.insert((row.model_id, row.date)))
                .collect();
            kept.reverse();
            kept
        }
    };

    let backtest_boundary = series.backtest_rows;
    series.backtest_rows = kept.iter().filter(|(i, _)| *i < backtest_boundary).count();
    series.rows = kept.into_iter().map(|(_, row)| row).collect();

    if series.rows.len() != before {
        debug!(
            policy = ?policy,
            removed = before - series.rows.len(),
            "Removed overlapping forecast rows"
        );
    }
}

/// Partition rows by model id, one entry per assigned model
pub fn split_forecasts_by_model(rows: &[ForecastRow], assignment: &ModelAssignment) -> ModelForecasts {
    let entries = assignment
        .iter()
        .map(|(model_id, model)| ModelForecast {
            model,
            model_id,
            rows: rows
                .iter()
                .filter(|row| row.model_id == model_id)
                .cloned()
                .collect(),
        })
        .collect();

    ModelForecasts { entries }
}

/// Chart window: the `history_points`-th last actual through the last forecast date
pub fn zoom_range(
    history: &[Observation],
    forecast_end: Option<DateTime<Utc>>,
    history_points: usize,
) -> Option<ZoomRange> {
    let start_index = history.len().saturating_sub(history_points);
    let start = history.get(start_index)?.date;
    let end = forecast_end.unwrap_or(history.last()?.date);
    Some(ZoomRange { start, end })
}
