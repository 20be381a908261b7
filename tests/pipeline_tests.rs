//! Pipeline tests for the backtest/forecast dashboard
//!
//! These run the combine -> rescale -> split flow against an in-memory
//! forecasting service and data source, so no database or network is needed.
//!
//! Run with: cargo test --test pipeline_tests

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::cell::{Cell, RefCell};

use econ_forecast::config::DashboardConfig;
use econ_forecast::dashboard::{Dashboard, ForecastSelection};
use econ_forecast::db::DataSource;
use econ_forecast::error::{DashboardError, Result};
use econ_forecast::forecast_client::{ForecastRequest, ForecastService};
use econ_forecast::models::{
    ForecastModel, ForecastRow, ModelAssignment, Observation, TargetColumn, Variable,
};
use econ_forecast::processor::{self, DedupPolicy};

// ============================================================================
// FIXTURES
// ============================================================================

fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap() + Duration::days(n)
}

/// `len` daily observations with value01 consistent with the series min/max
fn series(variable: &str, len: usize) -> Vec<Observation> {
    let values: Vec<f64> = (0..len).map(|i| 1000.0 + (i as f64 * 0.7).sin() * 50.0 + i as f64).collect();
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    values
        .iter()
        .enumerate()
        .map(|(i, v)| Observation {
            variable: variable.to_string(),
            date: day(i as i64),
            value: *v,
            value01: (v - min) / (max - min),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
struct RecordedCall {
    history: usize,
    horizon: usize,
    target: TargetColumn,
    models: Vec<ForecastModel>,
}

/// Returns exactly `horizon` rows per model, dated after the last actual
#[derive(Default)]
struct StubForecaster {
    calls: RefCell<Vec<RecordedCall>>,
    fail: bool,
}

impl ForecastService for StubForecaster {
    async fn forecast(&self, request: &ForecastRequest<'_>) -> Result<Vec<ForecastRow>> {
        self.calls.borrow_mut().push(RecordedCall {
            history: request.actuals.len(),
            horizon: request.horizon,
            target: request.target,
            models: request.models.to_vec(),
        });
        if self.fail {
            return Err(DashboardError::ForecastService("503 Service Unavailable".to_string()));
        }

        let last = request.actuals.last().map(|o| o.date).unwrap_or_else(|| day(0));
        let mut rows = Vec::new();
        for step in 1..=request.horizon {
            for (index, _) in request.models.iter().enumerate() {
                let y = match request.target {
                    TargetColumn::Value => 1000.0 + step as f64,
                    TargetColumn::Value01 => 0.5,
                };
                rows.push(ForecastRow::new(
                    last + Duration::days(step as i64),
                    request.target,
                    y,
                    index as u32 + 1,
                ));
            }
        }
        Ok(rows)
    }
}

struct StubSource {
    rows: Vec<Observation>,
    loads: Cell<usize>,
}

impl DataSource for StubSource {
    async fn load_observations(&self) -> Result<Vec<Observation>> {
        self.loads.set(self.loads.get() + 1);
        Ok(self.rows.clone())
    }
}

fn pop_source() -> StubSource {
    let mut rows = series("pop", 100);
    rows.extend(series("pce", 30));
    StubSource {
        rows,
        loads: Cell::new(0),
    }
}

// ============================================================================
// COMBINER
// ============================================================================

#[tokio::test]
async fn test_combine_row_count_and_call_order() {
    let stub = StubForecaster::default();
    let full = series("pop", 100);
    let backtest = processor::backtest_slice(&full, 12).unwrap();
    let models = [ForecastModel::Xgboost, ForecastModel::Arima];

    let combined = processor::combine_backtest_forecast(
        &stub,
        &full,
        backtest,
        12,
        TargetColumn::Value,
        &models,
    )
    .await
    .unwrap();

    assert_eq!(combined.len(), 2 * 12 * 2);
    assert_eq!(combined.backtest_rows, 24);

    let calls = stub.calls.borrow();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].history, 88, "backtest call goes first");
    assert_eq!(calls[1].history, 100);
    assert!(calls.iter().all(|c| c.horizon == 12 && c.models == models));

    // Backtest rows overlap the known tail, forecast rows are in the future
    assert!(combined.backtest().iter().all(|r| r.date <= full[99].date));
    assert!(combined.rows[24..].iter().all(|r| r.date > full[99].date));
}

#[tokio::test]
async fn test_combine_rejects_empty_models_without_calling() {
    let stub = StubForecaster::default();
    let full = series("pop", 20);
    let backtest = processor::backtest_slice(&full, 5).unwrap();

    let err = processor::combine_backtest_forecast(&stub, &full, backtest, 5, TargetColumn::Value, &[])
        .await
        .unwrap_err();

    assert!(matches!(err, DashboardError::EmptyModelList));
    assert!(stub.calls.borrow().is_empty());
}

#[tokio::test]
async fn test_combine_rejects_empty_backtest() {
    let stub = StubForecaster::default();
    let full = series("pop", 5);

    let err = processor::combine_backtest_forecast(
        &stub,
        &full,
        &[],
        5,
        TargetColumn::Value,
        &[ForecastModel::Arima],
    )
    .await
    .unwrap_err();

    assert!(matches!(err, DashboardError::InsufficientHistory { horizon: 5, available: 5 }));
    assert!(stub.calls.borrow().is_empty());
}

// ============================================================================
// SPLITTER
// ============================================================================

#[tokio::test]
async fn test_split_reconstructs_combined_table() {
    let stub = StubForecaster::default();
    let full = series("pop", 40);
    let backtest = processor::backtest_slice(&full, 6).unwrap();
    let models = [ForecastModel::RandomForest, ForecastModel::Xgboost];
    let combined =
        processor::combine_backtest_forecast(&stub, &full, backtest, 6, TargetColumn::Value, &models)
            .await
            .unwrap();

    // Assign a third model the service never returned
    let assignment = ModelAssignment::new(&[
        ForecastModel::RandomForest,
        ForecastModel::Xgboost,
        ForecastModel::Arima,
    ]);
    let split = processor::split_forecasts_by_model(&combined.rows, &assignment);

    assert_eq!(split.len(), 3);
    assert!(split.get(ForecastModel::Arima).unwrap().rows.is_empty());
    assert_eq!(split.total_rows(), combined.len());

    for entry in split.iter() {
        let expected: Vec<ForecastRow> = combined
            .rows
            .iter()
            .filter(|r| r.model_id == entry.model_id)
            .cloned()
            .collect();
        assert_eq!(entry.rows, expected);
    }
}

// ============================================================================
// DASHBOARD END TO END
// ============================================================================

#[tokio::test]
async fn test_end_to_end_pop_scenario() {
    let source = pop_source();
    let mut dashboard = Dashboard::new(DashboardConfig::default(), StubForecaster::default());
    dashboard.load_data(&source).await.unwrap();

    let selection = ForecastSelection {
        variable: Variable::Pop,
        horizon: 12,
        models: vec![ForecastModel::Xgboost, ForecastModel::Arima],
    };
    let report = dashboard.generate_forecast(&selection).await.unwrap();

    assert_eq!(report.history.len(), 100);
    assert_eq!(report.original.len(), 48);
    assert_eq!(report.normalized.len(), 48);

    for forecasts in [&report.forecasts_original, &report.forecasts_normalized] {
        assert_eq!(forecasts.len(), 2);
        assert_eq!(forecasts.get(ForecastModel::Xgboost).unwrap().rows.len(), 24);
        assert_eq!(forecasts.get(ForecastModel::Arima).unwrap().rows.len(), 24);
    }

    // Zoom: 20th-from-last actual through the last forecast date
    assert_eq!(report.zoom.start, report.history[80].date);
    assert_eq!(report.zoom.end, day(99 + 12));

    // Normalized forecasts are rescaled onto the raw value range
    let expected = report.range.min + 0.5 * (report.range.max - report.range.min);
    for row in &report.normalized.rows {
        assert!((row.value.unwrap() - expected).abs() < 1e-9);
    }

    // Accuracy is reported for every model
    assert_eq!(report.accuracy_original.len(), 2);
    assert!(report.accuracy_original.iter().all(|a| a.matched == 12));

    let calls = dashboard_calls(&dashboard);
    let histories: Vec<(usize, TargetColumn)> = calls.iter().map(|c| (c.history, c.target)).collect();
    assert_eq!(
        histories,
        vec![
            (88, TargetColumn::Value),
            (100, TargetColumn::Value),
            (88, TargetColumn::Value01),
            (100, TargetColumn::Value01),
        ]
    );
}

fn dashboard_calls(dashboard: &Dashboard<StubForecaster>) -> Vec<RecordedCall> {
    dashboard.service().calls.borrow().clone()
}

#[tokio::test]
async fn test_empty_model_selection_aborts_before_remote_call() {
    let source = pop_source();
    let mut dashboard = Dashboard::new(DashboardConfig::default(), StubForecaster::default());
    dashboard.load_data(&source).await.unwrap();

    let selection = ForecastSelection {
        variable: Variable::Pop,
        horizon: 12,
        models: vec![],
    };
    let err = dashboard.generate_forecast(&selection).await.unwrap_err();

    assert!(matches!(err, DashboardError::EmptyModelList));
    assert!(dashboard_calls(&dashboard).is_empty());
}

#[tokio::test]
async fn test_horizon_validation() {
    let source = pop_source();
    let mut dashboard = Dashboard::new(DashboardConfig::default(), StubForecaster::default());
    dashboard.load_data(&source).await.unwrap();

    let out_of_range = ForecastSelection {
        variable: Variable::Pop,
        horizon: 91,
        models: vec![ForecastModel::Arima],
    };
    assert!(matches!(
        dashboard.generate_forecast(&out_of_range).await,
        Err(DashboardError::InvalidHorizon { got: 91, .. })
    ));

    // pce only has 30 points
    let too_long = ForecastSelection {
        variable: Variable::Pce,
        horizon: 30,
        models: vec![ForecastModel::Arima],
    };
    assert!(matches!(
        dashboard.generate_forecast(&too_long).await,
        Err(DashboardError::InsufficientHistory { horizon: 30, available: 30 })
    ));

    // Variable absent from the dataset
    let missing = ForecastSelection {
        variable: Variable::Psavert,
        horizon: 3,
        models: vec![ForecastModel::Arima],
    };
    assert!(matches!(
        dashboard.generate_forecast(&missing).await,
        Err(DashboardError::UnknownVariable(_))
    ));

    assert!(dashboard_calls(&dashboard).is_empty());
}

#[tokio::test]
async fn test_generate_requires_loaded_data() {
    let dashboard = Dashboard::new(DashboardConfig::default(), StubForecaster::default());
    let selection = ForecastSelection {
        variable: Variable::Pop,
        horizon: 12,
        models: vec![ForecastModel::Xgboost],
    };

    assert!(matches!(
        dashboard.generate_forecast(&selection).await,
        Err(DashboardError::DataNotLoaded)
    ));
}

#[tokio::test]
async fn test_dataset_is_loaded_once_per_session() {
    let source = pop_source();
    let mut dashboard = Dashboard::new(DashboardConfig::default(), StubForecaster::default());

    assert!(!dashboard.is_loaded());
    let first = dashboard.load_data(&source).await.unwrap().len();
    let second = dashboard.load_data(&source).await.unwrap().len();

    assert_eq!(first, 130);
    assert_eq!(second, 130);
    assert_eq!(source.loads.get(), 1);
}

#[tokio::test]
async fn test_service_failure_keeps_cached_data() {
    let source = pop_source();
    let stub = StubForecaster {
        fail: true,
        ..StubForecaster::default()
    };
    let mut dashboard = Dashboard::new(DashboardConfig::default(), stub);
    dashboard.load_data(&source).await.unwrap();

    let selection = ForecastSelection {
        variable: Variable::Pop,
        horizon: 12,
        models: vec![ForecastModel::Xgboost],
    };
    let err = dashboard.generate_forecast(&selection).await.unwrap_err();

    assert!(matches!(err, DashboardError::ForecastService(_)));
    // Aborted after the first failing call
    assert_eq!(dashboard_calls(&dashboard).len(), 1);
    assert_eq!(dashboard.data().map(|d| d.len()), Some(130));
}

#[tokio::test]
async fn test_keep_last_dedup_drops_overlap() {
    let source = pop_source();
    let config = DashboardConfig {
        dedup: DedupPolicy::KeepLast,
        ..DashboardConfig::default()
    };
    let mut dashboard = Dashboard::new(config, StubForecaster::default());
    dashboard.load_data(&source).await.unwrap();

    // Horizon 12 on 100 points: backtest forecasts days 88..=99, future 100..=111,
    // so the segments do not overlap and nothing is dropped
    let selection = ForecastSelection {
        variable: Variable::Pop,
        horizon: 12,
        models: vec![ForecastModel::Xgboost],
    };
    let report = dashboard.generate_forecast(&selection).await.unwrap();
    assert_eq!(report.original.len(), 24);

    // An overlapping table loses the earlier duplicates
    let mut combined = report.original.clone();
    let duplicate = combined.rows[combined.backtest_rows].clone();
    combined.rows.insert(0, duplicate);
    combined.backtest_rows += 1;
    processor::dedup_overlapping(&mut combined, DedupPolicy::KeepLast);
    assert_eq!(combined.len(), 24);
    assert_eq!(combined.backtest_rows, 12);
}
