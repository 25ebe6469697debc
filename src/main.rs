//! Application entry point — pitch practice.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create the [`tokio`] runtime used by preparation jobs.
//! 4. Create the shared UI state and the session command channel.
//! 5. Spawn the session controller thread.
//! 6. Build the preparation job from the configured external tools.
//! 7. Run [`eframe::run_native`] until the window is closed, then shut the
//!    controller down and join it.

use std::sync::{mpsc, Arc};

use eframe::egui;
use pitch_practice::{
    app::PracticeApp,
    audio::CpalDevices,
    config::AppConfig,
    pipeline::{new_shared_state, PracticeSession, SessionCommand},
    prepare::{DemucsSeparator, PreparationJob, YtDlpDownloader},
};

fn native_options(config: &AppConfig) -> eframe::NativeOptions {
    let (w, h) = config.ui.window_size;
    eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Pitch Detection")
            .with_inner_size([w, h])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    }
}

fn main() -> eframe::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("pitch practice starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime (download, separation and pitch analysis jobs)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    // 4. Shared state + command channel
    let state = new_shared_state(config.clone());
    let (command_tx, command_rx) = mpsc::channel::<SessionCommand>();

    // 5. Session controller
    let session = PracticeSession::new(config.clone(), Arc::new(CpalDevices), Arc::clone(&state));
    let controller = std::thread::Builder::new()
        .name("session-controller".into())
        .spawn(move || session.run(command_rx))
        .expect("failed to spawn session controller thread");

    // 6. Preparation job
    let job = Arc::new(PreparationJob::new(
        config.clone(),
        Arc::new(YtDlpDownloader::new(config.tools.downloader.clone())),
        Arc::new(DemucsSeparator::new(config.tools.separator.clone())),
        Arc::clone(&state),
    ));

    // 7. UI (blocks until the window is closed)
    let app = PracticeApp::new(
        state,
        command_tx.clone(),
        rt.handle().clone(),
        job,
        config.clone(),
    );
    let result = eframe::run_native(
        "Pitch Detection",
        native_options(&config),
        Box::new(move |_cc| Ok(Box::new(app))),
    );

    let _ = command_tx.send(SessionCommand::Shutdown);
    if controller.join().is_err() {
        log::error!("session controller panicked");
    }
    log::info!("pitch practice stopped");
    result
}
