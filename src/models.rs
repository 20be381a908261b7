use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DashboardError, Result};

/// One row of the `sales_economics` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub variable: String,
    pub date: DateTime<Utc>,
    pub value: f64,
    /// `value` rescaled to [0, 1] with the variable's own min/max
    pub value01: f64,
}

/// Economic variables available in the dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variable {
    Pce,
    Pop,
    Psavert,
    Uempmed,
    Unemploy,
}

impl Variable {
    pub const ALL: [Variable; 5] = [
        Variable::Pce,
        Variable::Pop,
        Variable::Psavert,
        Variable::Uempmed,
        Variable::Unemploy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Variable::Pce => "pce",
            Variable::Pop => "pop",
            Variable::Psavert => "psavert",
            Variable::Uempmed => "uempmed",
            Variable::Unemploy => "unemploy",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Variable::Pce => "Personal Consumption Expenditures (in billions of dollars).",
            Variable::Pop => "Total population (in thousands).",
            Variable::Psavert => "Personal savings rate (percentage of disposable income).",
            Variable::Uempmed => "Median duration of unemployment (in weeks).",
            Variable::Unemploy => "Number of unemployed individuals (in thousands).",
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variable {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        // Accept the "pop - Total population..." labels shown in selectors
        let key = s.split(" - ").next().unwrap_or(s).trim().to_lowercase();
        Variable::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == key)
            .ok_or_else(|| DashboardError::UnknownVariable(s.to_string()))
    }
}

/// Forecasting models supported by the remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastModel {
    Xgboost,
    Arima,
    RandomForest,
}

impl ForecastModel {
    pub const ALL: [ForecastModel; 3] = [
        ForecastModel::Xgboost,
        ForecastModel::Arima,
        ForecastModel::RandomForest,
    ];

    /// Name the forecasting API expects in `models_list`
    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastModel::Xgboost => "xgboost",
            ForecastModel::Arima => "arima",
            ForecastModel::RandomForest => "random_forest",
        }
    }
}

impl fmt::Display for ForecastModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForecastModel {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_lowercase().replace('-', "_");
        ForecastModel::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == key)
            .ok_or_else(|| DashboardError::UnknownModel(s.to_string()))
    }
}

/// Parse the user's model selection against the closed set of supported models.
///
/// Order is preserved; it determines the model ids. Unknown names and
/// duplicates are rejected.
pub fn parse_model_selection<S: AsRef<str>>(names: &[S]) -> Result<Vec<ForecastModel>> {
    let mut models = Vec::with_capacity(names.len());
    for name in names {
        let model: ForecastModel = name.as_ref().parse()?;
        if models.contains(&model) {
            return Err(DashboardError::DuplicateModel(model.to_string()));
        }
        models.push(model);
    }
    Ok(models)
}

/// Which value column is sent to the forecasting API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetColumn {
    Value,
    Value01,
}

impl TargetColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetColumn::Value => "value",
            TargetColumn::Value01 => "value01",
        }
    }
}

impl fmt::Display for TargetColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request-scoped mapping from 1-based model id to model.
///
/// Ids are contiguous `1..=N` in selection order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelAssignment {
    entries: Vec<(u32, ForecastModel)>,
}

impl ModelAssignment {
    pub fn new(models: &[ForecastModel]) -> Self {
        let entries = models
            .iter()
            .enumerate()
            .map(|(index, model)| (index as u32 + 1, *model))
            .collect();
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, ForecastModel)> + '_ {
        self.entries.iter().copied()
    }

    pub fn model_for(&self, model_id: u32) -> Option<ForecastModel> {
        self.entries
            .iter()
            .find(|(id, _)| *id == model_id)
            .map(|(_, model)| *model)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A forecast row normalized from the API response.
///
/// The API fills only the column that was requested; the other one is
/// attached later by rescaling (normalized forecasts get a `value`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub date: DateTime<Utc>,
    pub value: Option<f64>,
    pub value01: Option<f64>,
    pub model_id: u32,
}

impl ForecastRow {
    pub fn new(date: DateTime<Utc>, target: TargetColumn, y: f64, model_id: u32) -> Self {
        let (value, value01) = match target {
            TargetColumn::Value => (Some(y), None),
            TargetColumn::Value01 => (None, Some(y)),
        };
        Self {
            date,
            value,
            value01,
            model_id,
        }
    }

    pub fn get(&self, column: TargetColumn) -> Option<f64> {
        match column {
            TargetColumn::Value => self.value,
            TargetColumn::Value01 => self.value01,
        }
    }
}

/// Backtest rows followed by full-history forecast rows for one target column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedSeries {
    pub target: TargetColumn,
    /// Number of leading rows that came from the backtest call
    pub backtest_rows: usize,
    pub rows: Vec<ForecastRow>,
}

impl CombinedSeries {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn backtest(&self) -> &[ForecastRow] {
        &self.rows[..self.backtest_rows.min(self.rows.len())]
    }

    pub fn last_date(&self) -> Option<DateTime<Utc>> {
        self.rows.last().map(|row| row.date)
    }
}

/// Forecast rows for one model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelForecast {
    pub model: ForecastModel,
    pub model_id: u32,
    pub rows: Vec<ForecastRow>,
}

/// Per-model forecast tables, one entry per assigned model, in assignment order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelForecasts {
    pub entries: Vec<ModelForecast>,
}

impl ModelForecasts {
    pub fn get(&self, model: ForecastModel) -> Option<&ModelForecast> {
        self.entries.iter().find(|entry| entry.model == model)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelForecast> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_rows(&self) -> usize {
        self.entries.iter().map(|entry| entry.rows.len()).sum()
    }
}

/// Display window for charts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ZoomRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}
