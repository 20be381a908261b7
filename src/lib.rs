//! Economic forecast dashboard
//!
//! Loads the `sales_economics` table, asks a remote forecasting API for a
//! backtest (truncated history) and a future forecast (full history), and
//! reshapes the results into per-model series for charting.

pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod forecast_client;
pub mod models;
pub mod output;
pub mod processor;
pub mod stats;
