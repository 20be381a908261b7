use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use econ_forecast::config::AppConfig;
use econ_forecast::dashboard::{Dashboard, ForecastSelection, DEFAULT_HORIZON};
use econ_forecast::db::PgDataSource;
use econ_forecast::error::DashboardError;
use econ_forecast::forecast_client::HttpForecastClient;
use econ_forecast::models::{parse_model_selection, Variable};
use econ_forecast::output;

#[derive(Parser)]
#[command(name = "econ-forecast")]
#[command(about = "Compare remote forecasting models against economic time series with backtests")]
struct Cli {
    /// YAML configuration file (env: DASHBOARD_CONFIG_PATH)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load data from the database and show a preview
    Load {
        /// Number of rows to display
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// List the variables available for forecasting
    Variables,

    /// Generate backtest and forecast charts for one or more variables
    Forecast {
        /// Variable(s) to forecast: pce, pop, psavert, uempmed, unemploy
        #[arg(short, long, required = true, value_delimiter = ',')]
        variable: Vec<String>,

        /// Forecasting horizon in periods (1-90)
        #[arg(short = 'H', long, default_value_t = DEFAULT_HORIZON)]
        horizon: usize,

        /// Models to compare: xgboost, arima, random_forest
        #[arg(short, long, value_delimiter = ',', default_value = "xgboost")]
        models: Vec<String>,

        /// Output directory for charts and exports
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,econ_forecast=debug".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&log_filter))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let cli = Cli::parse();

    let config_path = cli
        .config
        .or_else(|| std::env::var("DASHBOARD_CONFIG_PATH").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("config/dashboard.yaml"));
    let config = AppConfig::load_with_env(&config_path).context("Failed to load configuration")?;

    match cli.command {
        Commands::Load { limit } => load(&config, limit).await?,
        Commands::Variables => list_variables(&config).await?,
        Commands::Forecast {
            variable,
            horizon,
            models,
            output_dir,
        } => {
            let output_dir = output_dir.unwrap_or_else(|| config.dashboard.output_dir.clone());
            forecast(&config, &variable, horizon, &models, output_dir).await?;
        }
    }

    Ok(())
}

fn build_dashboard(config: &AppConfig) -> Result<Dashboard<HttpForecastClient>> {
    let client = HttpForecastClient::new(&config.api).context("Failed to create forecast client")?;
    Ok(Dashboard::new(config.dashboard.clone(), client))
}

async fn load(config: &AppConfig, limit: usize) -> Result<()> {
    println!("🔌 Connecting to the database...");
    let mut dashboard = build_dashboard(config)?;
    let source = PgDataSource::new(config.database.clone());
    let data = dashboard.load_data(&source).await.context("Failed to load data")?;

    println!("✅ Data loaded: {} rows", data.len());
    println!("{}", output::format_dataset_preview(data, limit));
    Ok(())
}

async fn list_variables(config: &AppConfig) -> Result<()> {
    let mut dashboard = build_dashboard(config)?;
    let source = PgDataSource::new(config.database.clone());
    let data = dashboard.load_data(&source).await.context("Failed to load data")?;

    println!("{}", output::format_variables(data));
    Ok(())
}

async fn forecast(
    config: &AppConfig,
    variables: &[String],
    horizon: usize,
    models: &[String],
    output_dir: PathBuf,
) -> Result<()> {
    // Validate selections before touching the database or the API
    let model_names: Vec<&str> = models
        .iter()
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .collect();
    let models = parse_model_selection(&model_names)?;
    if models.is_empty() {
        return Err(DashboardError::EmptyModelList.into());
    }
    let variables = variables
        .iter()
        .map(|v| v.parse::<Variable>())
        .collect::<Result<Vec<_>, _>>()?;

    println!("🔌 Connecting to the database...");
    let mut dashboard = build_dashboard(config)?;
    let source = PgDataSource::new(config.database.clone());
    let data = dashboard.load_data(&source).await.context("Failed to load data")?;
    println!("✅ Data loaded: {} rows", data.len());

    let mut failures = 0;
    for variable in variables {
        let selection = ForecastSelection {
            variable,
            horizon,
            models: models.clone(),
        };

        println!("\n📈 Calculating forecasts for {}, please wait...", variable);
        let report = match dashboard.generate_forecast(&selection).await {
            Ok(report) => report,
            Err(e) => {
                error!(variable = %variable, "Forecast generation failed: {}", e);
                println!("❌ {}: {}", variable, e);
                failures += 1;
                continue;
            }
        };

        let files = output::export_report(&report, &output_dir)
            .with_context(|| format!("Failed to export results for {}", variable))?;
        info!(variable = %variable, charts = files.charts.len(), "Exported forecast report");

        println!("\n💾 Exported results for {}:", variable);
        for path in files.charts.iter().chain(files.csv.iter()) {
            println!("  ✅ {}", path.display());
        }
        println!("  ✅ JSON: {}", files.json.display());
        println!("  ✅ Report: {}", files.report.display());

        println!("\n{}", output::generate_report(&report));
    }

    if failures > 0 {
        anyhow::bail!("{} forecast generation(s) failed", failures);
    }

    println!("\n✅ Forecast complete!");
    Ok(())
}
