pub mod camera;
pub mod decoder;
pub mod error;
pub mod geometry;
pub mod models;
pub mod notify;
pub mod presentation;
pub mod registry;
pub mod scanner;
pub mod settings;
mod utils;

use anyhow::{bail, Context, Result};
use std::sync::Arc;

pub use error::{DecodeError, ScanError};
pub use scanner::{ScanController, ScannerStatus};
pub use settings::{ScannerSettings, SettingsStore};

use camera::{CameraBackend, ReplayCamera};
use decoder::default_decoder;
use notify::default_notifier;
use presentation::LogSink;

/// Load settings, scan the configured cameras until Ctrl-C, then print the
/// session's results most recent first.
pub fn run() -> Result<()> {
    let level = if settings::debug_enabled() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    log::info!("livescan starting up...");

    let config_path = settings::config_path();
    let store = SettingsStore::new(config_path.clone())?;
    let scanner_settings = store.scanner();
    if scanner_settings.devices.is_empty() && !cfg!(feature = "camera") {
        bail!(
            "no cameras configured; list image directories under \"devices\" in {}",
            config_path.display()
        );
    }

    // Everything user-facing runs on one thread; decoding goes to the blocking pool.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(scan_until_interrupted(scanner_settings))
}

/// Replay directories win when configured; otherwise the attached cameras.
fn camera_backend(scanner_settings: &ScannerSettings) -> Arc<dyn CameraBackend> {
    #[cfg(feature = "camera")]
    if scanner_settings.devices.is_empty() {
        log::info!("no replay directories configured; using attached cameras");
        return Arc::new(camera::NativeCamera::new());
    }
    Arc::new(ReplayCamera::from_directories(
        &scanner_settings.devices,
        scanner_settings.replay_frame_period(),
    ))
}

async fn scan_until_interrupted(scanner_settings: ScannerSettings) -> Result<()> {
    let camera = camera_backend(&scanner_settings);
    let notifier = default_notifier(&scanner_settings.notification);
    let controller = ScanController::new(
        camera,
        default_decoder(),
        Arc::new(LogSink),
        notifier,
        scanner_settings,
    );

    controller.start().await?;
    log::info!("scanning; press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    controller.stop().await?;

    let results = controller.results().await;
    println!("{} unique code(s) scanned", results.len());
    for record in &results {
        let image = match &record.cropped_image {
            Some(crop) => format!("{} byte snapshot", crop.byte_len),
            None => "no snapshot".to_string(),
        };
        println!(
            "{}  {:<8} {}  ({image})",
            record.captured_at.format("%H:%M:%S"),
            record.format.to_string(),
            record.payload
        );
    }
    Ok(())
}
