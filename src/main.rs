use log::{error, info, warn};
use tokio::sync::mpsc;

use blue_light_meter::acquisition::Acquisition;
use blue_light_meter::bluetooth::BleLightMeter;
use blue_light_meter::config::AppConfig;
use blue_light_meter::presenter::Presenter;
use blue_light_meter::utils::format_datetime;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match AppConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    let device = match BleLightMeter::connect(&config.device).await {
        Ok(device) => device,
        Err(e) => {
            error!("Failed to connect to light meter: {}", e);
            return Err(e.into());
        }
    };

    let (telemetry_tx, telemetry_rx) = mpsc::channel(1);
    let (command_tx, command_rx) = mpsc::channel(1);

    let acquisition = Acquisition::new(device, config.acquisition.clone());
    let handle = tokio::spawn(acquisition.run(telemetry_tx, command_rx));

    let mut presenter = Presenter::new(command_tx, config.exposure.clone());
    presenter.request(config.initial_command());

    // Handle Ctrl+C gracefully
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let summary = presenter.run(telemetry_rx, shutdown).await;

    let result = match handle.await {
        Ok(Ok(())) => {
            info!("Program completed successfully");
            Ok(())
        }
        Ok(Err(e)) => {
            error!("Fatal error: {}", e);
            Err(e.into())
        }
        Err(e) => {
            error!("Acquisition task failed: {}", e);
            Err(e.into())
        }
    };

    info!(
        "Session {} - {}: {} readings, {} over range",
        format_datetime(&summary.started),
        format_datetime(&summary.finished),
        summary.readings,
        summary.over_range
    );

    result
}
