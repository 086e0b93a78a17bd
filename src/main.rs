//! Application entry point — EchoMate.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create [`tokio`] runtime (multi-thread, 2 workers).
//! 4. Construct and start the one [`AudioEngine`] for the process.
//! 5. Load the wake word model (falls back to a never-triggering stub).
//! 6. Build the HTTP dialogue client from config.
//! 7. Run the session supervisor until Ctrl-C, then stop the engine.

use std::sync::Arc;

use echo_mate::{
    audio::{AudioEngine, CpalDeviceBuilder},
    config::{AppConfig, AppPaths},
    display::LogDisplay,
    net::HttpDialogueClient,
    session::{SessionContext, SessionServices, SessionSupervisor},
    wake::{NoWakeDetector, RustpotterDetector, WakeWordDetector},
};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("EchoMate starting");

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Could not load settings ({e}); using defaults");
            AppConfig::default()
        }
    };

    let paths = AppPaths::new();
    if let Some(data_dir) = paths.utterance_file.parent() {
        std::fs::create_dir_all(data_dir)?;
    }

    // One engine for the process lifetime; everything else borrows it.
    let engine = Arc::new(AudioEngine::new(
        Arc::new(CpalDeviceBuilder::new()),
        config.audio.capture_channel,
    ));
    if !engine.start() {
        anyhow::bail!("audio engine failed to start");
    }

    let wake: Box<dyn WakeWordDetector> = match &config.wake.model_path {
        Some(path) => match RustpotterDetector::new(std::path::Path::new(path), config.wake.threshold)
        {
            Ok(detector) => Box::new(detector),
            Err(e) => {
                log::warn!("Wake model unavailable ({e}); wake detection disabled");
                Box::new(NoWakeDetector::new())
            }
        },
        None => Box::new(NoWakeDetector::new()),
    };

    let transport = Arc::new(HttpDialogueClient::from_config(&config.server));
    log::info!("Dialogue server: {}", config.server.base_url());

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    let mut supervisor = SessionSupervisor::new(
        SessionServices {
            engine: Arc::clone(&engine),
            wake,
            transport,
            display: Box::new(LogDisplay),
            config: config.clone(),
        },
        SessionContext::from_paths(&paths),
    );

    rt.block_on(async {
        tokio::select! {
            _ = supervisor.run() => {}
            _ = tokio::signal::ctrl_c() => {
                log::info!("Ctrl-C received; shutting down");
            }
        }
    });

    engine.stop();
    log::info!("EchoMate stopped");
    Ok(())
}
