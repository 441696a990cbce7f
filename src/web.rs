#![cfg(not(tarpaulin_include))]

use dashboard::{Config, app};
use env_logger::Env;
use std::env;

/// Main entry point for the web application
///
/// Reads the configuration from `DASHBOARD_*` environment variables, lets
/// the first command line argument override the bind address, and runs the
/// server until it is stopped.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let config = Config::from_env()?.with_args(&args)?;

    log::info!(
        "Starting dashboard with uploads in {}",
        config.media_root.display()
    );
    app::run(config).await
}
