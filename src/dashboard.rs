//! Session controller: owns the loaded dataset and runs the
//! "Generate Forecast" action end to end.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::DashboardConfig;
use crate::db::DataSource;
use crate::error::{DashboardError, Result};
use crate::forecast_client::ForecastService;
use crate::models::{
    CombinedSeries, ForecastModel, ModelAssignment, ModelForecasts, Observation, TargetColumn,
    Variable, ZoomRange,
};
use crate::processor::{self, MinMax};
use crate::stats::{self, BacktestAccuracy};

pub const MIN_HORIZON: usize = 1;
pub const MAX_HORIZON: usize = 90;
pub const DEFAULT_HORIZON: usize = 12;

/// User selections for one forecast generation
#[derive(Debug, Clone)]
pub struct ForecastSelection {
    pub variable: Variable,
    pub horizon: usize,
    pub models: Vec<ForecastModel>,
}

/// Everything the presentation layer needs for one variable
#[derive(Debug, Clone, Serialize)]
pub struct ForecastReport {
    pub variable: Variable,
    pub horizon: usize,
    pub assignment: ModelAssignment,
    pub history: Vec<Observation>,
    pub range: MinMax,
    pub original: CombinedSeries,
    pub normalized: CombinedSeries,
    pub forecasts_original: ModelForecasts,
    pub forecasts_normalized: ModelForecasts,
    pub zoom: ZoomRange,
    pub accuracy_original: Vec<BacktestAccuracy>,
    pub accuracy_normalized: Vec<BacktestAccuracy>,
}

/// Application state for one session.
///
/// The dataset is loaded at most once and reused by every generation.
pub struct Dashboard<F: ForecastService> {
    config: DashboardConfig,
    service: F,
    data: Option<Vec<Observation>>,
}

impl<F: ForecastService> Dashboard<F> {
    pub fn new(config: DashboardConfig, service: F) -> Self {
        Self {
            config,
            service,
            data: None,
        }
    }

    /// Load the dataset, or return the cached copy if already loaded
    pub async fn load_data<D: DataSource>(&mut self, source: &D) -> Result<&[Observation]> {
        if self.data.is_none() {
            info!("Loading dataset from data source");
            let rows = source.load_observations().await?;
            info!("Loaded {} observations", rows.len());
            self.data = Some(rows);
        } else {
            debug!("Reusing cached dataset");
        }
        self.data().ok_or(DashboardError::DataNotLoaded)
    }

    pub fn data(&self) -> Option<&[Observation]> {
        self.data.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.data.is_some()
    }

    pub fn service(&self) -> &F {
        &self.service
    }

    /// Run the full backtest/forecast pipeline for one selection.
    ///
    /// All validation happens before the first remote call. A failure leaves
    /// the cached dataset untouched.
    pub async fn generate_forecast(&self, selection: &ForecastSelection) -> Result<ForecastReport> {
        if selection.models.is_empty() {
            warn!("Forecast requested without any model selected");
            return Err(DashboardError::EmptyModelList);
        }
        if !(MIN_HORIZON..=MAX_HORIZON).contains(&selection.horizon) {
            return Err(DashboardError::InvalidHorizon {
                got: selection.horizon,
                min: MIN_HORIZON,
                max: MAX_HORIZON,
            });
        }
        let data = self.data().ok_or(DashboardError::DataNotLoaded)?;

        let history = processor::filter_variable(data, selection.variable.as_str());
        let range = MinMax::of(&history)
            .ok_or_else(|| DashboardError::UnknownVariable(selection.variable.to_string()))?;
        let backtest = processor::backtest_slice(&history, selection.horizon)?;
        let assignment = ModelAssignment::new(&selection.models);

        info!(
            variable = %selection.variable,
            horizon = selection.horizon,
            models = ?selection.models,
            history = history.len(),
            backtest = backtest.len(),
            "Generating forecast"
        );

        let mut original = processor::combine_backtest_forecast(
            &self.service,
            &history,
            backtest,
            selection.horizon,
            TargetColumn::Value,
            &selection.models,
        )
        .await?;

        let mut normalized = processor::combine_backtest_forecast(
            &self.service,
            &history,
            backtest,
            selection.horizon,
            TargetColumn::Value01,
            &selection.models,
        )
        .await?;

        processor::rescale_normalized(&mut normalized, range);
        processor::dedup_overlapping(&mut original, self.config.dedup);
        processor::dedup_overlapping(&mut normalized, self.config.dedup);

        let forecasts_original = processor::split_forecasts_by_model(&original.rows, &assignment);
        let forecasts_normalized = processor::split_forecasts_by_model(&normalized.rows, &assignment);

        let zoom = processor::zoom_range(
            &history,
            original.last_date(),
            self.config.zoom_history_points,
        )
        .ok_or_else(|| DashboardError::UnknownVariable(selection.variable.to_string()))?;

        let accuracy_original =
            stats::backtest_accuracy(&history, original.backtest(), &assignment, TargetColumn::Value);
        let accuracy_normalized =
            stats::backtest_accuracy(&history, normalized.backtest(), &assignment, TargetColumn::Value01);

        Ok(ForecastReport {
            variable: selection.variable,
            horizon: selection.horizon,
            assignment,
            history,
            range,
            original,
            normalized,
            forecasts_original,
            forecasts_normalized,
            zoom,
            accuracy_original,
            accuracy_normalized,
        })
    }
}
