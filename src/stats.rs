use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::models::{ForecastModel, ForecastRow, ModelAssignment, Observation, TargetColumn};

/// Backtest error of one model against the known actuals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestAccuracy {
    pub model: ForecastModel,
    /// Forecast points whose date matched an actual observation
    pub matched: usize,
    pub mae: f64,
    pub rmse: f64,
    /// Mean absolute percentage error, skipping zero actuals
    pub mape: Option<f64>,
}

/// Mean absolute error
pub fn mean_absolute_error(pairs: &[(f64, f64)]) -> f64 {
    if pairs.is_empty() {
        return 0.0;
    }
    pairs.iter().map(|(actual, predicted)| (actual - predicted).abs()).sum::<f64>() / pairs.len() as f64
}

/// Root mean squared error
pub fn root_mean_squared_error(pairs: &[(f64, f64)]) -> f64 {
    if pairs.is_empty() {
        return 0.0;
    }
    let mse = pairs
        .iter()
        .map(|(actual, predicted)| (actual - predicted).powi(2))
        .sum::<f64>()
        / pairs.len() as f64;
    mse.sqrt()
}

/// Mean absolute percentage error (as a fraction). None if every actual is zero.
pub fn mean_absolute_percentage_error(pairs: &[(f64, f64)]) -> Option<f64> {
    let terms: Vec<f64> = pairs
        .iter()
        .filter(|(actual, _)| *actual != 0.0)
        .map(|(actual, predicted)| ((actual - predicted) / actual).abs())
        .collect();
    if terms.is_empty() {
        return None;
    }
    Some(terms.iter().sum::<f64>() / terms.len() as f64)
}

/// Score each model's backtest rows against the actuals on matching dates.
///
/// `column` picks which actual/forecast column is compared. Models without any
/// matching date are still reported, with `matched == 0`.
pub fn backtest_accuracy(
    actuals: &[Observation],
    backtest: &[ForecastRow],
    assignment: &ModelAssignment,
    column: TargetColumn,
) -> Vec<BacktestAccuracy> {
    let by_date: HashMap<DateTime<Utc>, f64> = actuals
        .iter()
        .map(|o| {
            let v = match column {
                TargetColumn::Value => o.value,
                TargetColumn::Value01 => o.value01,
            };
            (o.date, v)
        })
        .collect();

    assignment
        .iter()
        .map(|(model_id, model)| {
            let pairs: Vec<(f64, f64)> = backtest
                .iter()
                .filter(|row| row.model_id == model_id)
                .filter_map(|row| Some((*by_date.get(&row.date)?, row.get(column)?)))
                .collect();

            BacktestAccuracy {
                model,
                matched: pairs.len(),
                mae: mean_absolute_error(&pairs),
                rmse: root_mean_squared_error(&pairs),
                mape: mean_absolute_percentage_error(&pairs),
            }
        })
        .collect()
}
