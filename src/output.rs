use chrono::{DateTime, Utc};
use plotly::common::{Line, Marker, Mode};
use plotly::layout::{Axis, BarMode};
use plotly::{Bar, Layout, Plot, Scatter};
use std::path::{Path, PathBuf};
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::dashboard::ForecastReport;
use crate::error::Result;
use crate::models::{CombinedSeries, ModelAssignment, ModelForecasts, Observation, Variable, ZoomRange};
use crate::stats::BacktestAccuracy;

const ACTUALS_COLOR: &str = "blue";

fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn zoom_axis(zoom: &ZoomRange) -> Axis {
    Axis::new()
        .title("Date")
        .range(vec![format_date(&zoom.start), format_date(&zoom.end)])
}

/// Actuals plus one trace per model, as lines with markers
pub fn create_line_plot(
    actuals: &[Observation],
    forecasts: &ModelForecasts,
    title: &str,
    y_title: &str,
    zoom: &ZoomRange,
) -> Plot {
    let mut plot = Plot::new();

    let dates: Vec<String> = actuals.iter().map(|o| format_date(&o.date)).collect();
    let values: Vec<f64> = actuals.iter().map(|o| o.value).collect();
    plot.add_trace(
        Scatter::new(dates, values)
            .mode(Mode::LinesMarkers)
            .name("Actuals")
            .marker(Marker::new().color(ACTUALS_COLOR).size(6))
            .line(Line::new().color(ACTUALS_COLOR).width(2.0)),
    );

    for forecast in forecasts.iter() {
        let (dates, values): (Vec<String>, Vec<f64>) = forecast
            .rows
            .iter()
            .filter_map(|row| Some((format_date(&row.date), row.value?)))
            .unzip();
        plot.add_trace(
            Scatter::new(dates, values)
                .mode(Mode::LinesMarkers)
                .name(forecast.model.as_str())
                .marker(Marker::new().size(5))
                .line(Line::new().width(2.0)),
        );
    }

    plot.set_layout(
        Layout::new()
            .title(title)
            .x_axis(zoom_axis(zoom))
            .y_axis(Axis::new().title(y_title))
            .show_legend(true),
    );
    plot
}

/// Actuals plus one grouped bar series per model
pub fn create_bar_chart(
    actuals: &[Observation],
    forecasts: &ModelForecasts,
    title: &str,
    y_title: &str,
    zoom: &ZoomRange,
) -> Plot {
    let mut plot = Plot::new();

    let dates: Vec<String> = actuals.iter().map(|o| format_date(&o.date)).collect();
    let values: Vec<f64> = actuals.iter().map(|o| o.value).collect();
    plot.add_trace(
        Bar::new(dates, values)
            .name("Actuals")
            .marker(Marker::new().color(ACTUALS_COLOR)),
    );

    for forecast in forecasts.iter() {
        let (dates, values): (Vec<String>, Vec<f64>) = forecast
            .rows
            .iter()
            .filter_map(|row| Some((format_date(&row.date), row.value?)))
            .unzip();
        plot.add_trace(Bar::new(dates, values).name(forecast.model.as_str()));
    }

    plot.set_layout(
        Layout::new()
            .title(title)
            .x_axis(zoom_axis(zoom))
            .y_axis(Axis::new().title(y_title))
            .bar_mode(BarMode::Group)
            .show_legend(true),
    );
    plot
}

/// Write a standalone HTML page for `plot`
pub fn write_chart(plot: &Plot, path: &Path) -> Result<()> {
    std::fs::write(path, plot.to_html())?;
    Ok(())
}

/// Files written for one report
#[derive(Debug, Clone, Default)]
pub struct ExportedFiles {
    pub charts: Vec<PathBuf>,
    pub csv: Vec<PathBuf>,
    pub json: PathBuf,
    pub report: PathBuf,
}

/// Write the four charts, per-target CSVs, the JSON dump and the text report
pub fn export_report(report: &ForecastReport, output_dir: &Path) -> Result<ExportedFiles> {
    std::fs::create_dir_all(output_dir)?;
    let variable = report.variable;
    let mut files = ExportedFiles::default();

    let charts = [
        (
            format!("{}_line_original.html", variable),
            create_line_plot(
                &report.history,
                &report.forecasts_original,
                &format!("Original Values Forecast Comparison with Backtest for {}", variable),
                "Value",
                &report.zoom,
            ),
        ),
        (
            format!("{}_line_normalized.html", variable),
            create_line_plot(
                &report.history,
                &report.forecasts_normalized,
                &format!("Normalized Values Forecast Comparison with Backtest for {}", variable),
                "Value",
                &report.zoom,
            ),
        ),
        (
            format!("{}_bar_original.html", variable),
            create_bar_chart(
                &report.history,
                &report.forecasts_original,
                &format!("Original Values Bar Chart for {}", variable),
                "Value",
                &report.zoom,
            ),
        ),
        (
            format!("{}_bar_normalized.html", variable),
            create_bar_chart(
                &report.history,
                &report.forecasts_normalized,
                &format!("Normalized Values Bar Chart for {}", variable),
                "Value",
                &report.zoom,
            ),
        ),
    ];
    for (name, plot) in &charts {
        let path = output_dir.join(name);
        write_chart(plot, &path)?;
        files.charts.push(path);
    }

    for series in [&report.original, &report.normalized] {
        let path = output_dir.join(format!("{}_forecast_{}.csv", variable, series.target));
        export_forecast_to_csv(series, &report.assignment, &path)?;
        files.csv.push(path);
    }

    files.json = output_dir.join(format!("{}_report.json", variable));
    export_to_json(report, &files.json)?;

    files.report = output_dir.join(format!("{}_report.txt", variable));
    std::fs::write(&files.report, generate_report(report))?;

    Ok(files)
}

/// Export the report to JSON
pub fn export_to_json(report: &ForecastReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Export one combined series to CSV
/// Format: segment, model, model_id, date, value, value01
pub fn export_forecast_to_csv(
    series: &CombinedSeries,
    assignment: &ModelAssignment,
    path: &Path,
) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record(["segment", "model", "model_id", "date", "value", "value01"])?;

    for (index, row) in series.rows.iter().enumerate() {
        let segment = if index < series.backtest_rows { "backtest" } else { "forecast" };
        let model = assignment
            .model_for(row.model_id)
            .map(|m| m.to_string())
            .unwrap_or_default();
        wtr.write_record(&[
            segment.to_string(),
            model,
            row.model_id.to_string(),
            format_date(&row.date),
            row.value.map(|v| format!("{:.6}", v)).unwrap_or_default(),
            row.value01.map(|v| format!("{:.6}", v)).unwrap_or_default(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

#[derive(Tabled)]
struct ObservationRow {
    variable: String,
    date: String,
    value: String,
    value01: String,
}

/// Table of the first `limit` observations
pub fn format_dataset_preview(observations: &[Observation], limit: usize) -> String {
    let rows: Vec<ObservationRow> = observations
        .iter()
        .take(limit)
        .map(|o| ObservationRow {
            variable: o.variable.clone(),
            date: o.date.format("%Y-%m-%d").to_string(),
            value: format!("{:.3}", o.value),
            value01: format!("{:.4}", o.value01),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    table.to_string()
}

#[derive(Tabled)]
struct VariableRow {
    variable: &'static str,
    description: &'static str,
    observations: usize,
}

/// Table of the supported variables with their row counts
pub fn format_variables(observations: &[Observation]) -> String {
    let rows: Vec<VariableRow> = Variable::ALL
        .iter()
        .map(|v| VariableRow {
            variable: v.as_str(),
            description: v.description(),
            observations: observations.iter().filter(|o| o.variable == v.as_str()).count(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    table.to_string()
}

#[derive(Tabled)]
struct AccuracyRow {
    model: String,
    matched: usize,
    mae: String,
    rmse: String,
    mape: String,
}

/// Table of backtest errors per model
pub fn format_accuracy(scores: &[BacktestAccuracy]) -> String {
    let rows: Vec<AccuracyRow> = scores
        .iter()
        .map(|s| AccuracyRow {
            model: s.model.to_string(),
            matched: s.matched,
            mae: format!("{:.4}", s.mae),
            rmse: format!("{:.4}", s.rmse),
            mape: s
                .mape
                .map(|m| format!("{:.2}%", m * 100.0))
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    table.to_string()
}

/// Generate a human-readable summary report
pub fn generate_report(report: &ForecastReport) -> String {
    let mut out = String::new();

    out.push_str("╔══════════════════════════════════════════════════════════════════╗\n");
    out.push_str("║              ECONOMIC FORECAST - BACKTEST REPORT                 ║\n");
    out.push_str("╚══════════════════════════════════════════════════════════════════╝\n\n");

    out.push_str("📊 DATA SUMMARY\n");
    out.push_str("─────────────────────────────────────────\n");
    out.push_str(&format!(
        "Variable:          {} ({})\n",
        report.variable,
        report.variable.description()
    ));
    out.push_str(&format!("History points:    {}\n", report.history.len()));
    if let (Some(first), Some(last)) = (report.history.first(), report.history.last()) {
        out.push_str(&format!(
            "Date range:        {} to {}\n",
            first.date.format("%Y-%m-%d"),
            last.date.format("%Y-%m-%d")
        ));
    }
    out.push_str(&format!(
        "Value range:       {:.3} to {:.3}\n",
        report.range.min, report.range.max
    ));
    out.push_str(&format!("Horizon:           {} periods\n", report.horizon));
    out.push_str(&format!(
        "Chart window:      {} to {}\n",
        report.zoom.start.format("%Y-%m-%d"),
        report.zoom.end.format("%Y-%m-%d")
    ));
    out.push('\n');

    out.push_str("🤖 MODELS\n");
    out.push_str("─────────────────────────────────────────\n");
    for (model_id, model) in report.assignment.iter() {
        let original = report
            .forecasts_original
            .get(model)
            .map(|f| f.rows.len())
            .unwrap_or(0);
        let normalized = report
            .forecasts_normalized
            .get(model)
            .map(|f| f.rows.len())
            .unwrap_or(0);
        out.push_str(&format!(
            "  #{} {:<14} {} original rows, {} normalized rows\n",
            model_id, model, original, normalized
        ));
    }
    out.push('\n');

    out.push_str("🎯 BACKTEST ACCURACY (original values)\n");
    out.push_str("─────────────────────────────────────────\n");
    out.push_str(&format_accuracy(&report.accuracy_original));
    out.push_str("\n\n");

    out.push_str("🎯 BACKTEST ACCURACY (normalized values)\n");
    out.push_str("─────────────────────────────────────────\n");
    out.push_str(&format_accuracy(&report.accuracy_normalized));
    out.push('\n');

    out
}
