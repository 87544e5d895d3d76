use anyhow::Result;
use lib_recorder::{pump, FeedRecorder, JsonLinesReplay};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal;

mod recorder_logic;
use recorder_logic::{config, logger, monitor};

async fn wait_for_shutdown_signal() {
    tokio::select! {
        _ = signal::ctrl_c() => {
            log::info!("Ctrl-C received, initiating shutdown.");
        }
        _ = async {
            #[cfg(unix)]
            {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut term_signal) => {
                        term_signal.recv().await;
                        log::info!("SIGTERM received, initiating shutdown.");
                    }
                    Err(e) => {
                        log::warn!("Cannot install SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                // On non-unix platforms, just wait forever.
                std::future::pending::<()>().await;
            }
        } => {}
    }
}

fn log_producer_result(result: std::result::Result<lib_recorder::Result<u64>, tokio::task::JoinError>) {
    match result {
        Ok(Ok(count)) => log::info!("Producer finished: {} records ingested.", count),
        Ok(Err(e)) => log::error!("Replay failed: {}", e),
        Err(e) => log::error!("Producer task panicked: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let (config, config_source) = config::load_config()?;
    let log_path = logger::setup_logging(&config.log_dir(), config.log_level(), config.log_keep_files())?;
    log::info!("Logging to {}", log_path.display());
    log::info!("Configuration loaded from {}", config_source);

    let recorder_config = config.recorder_config()?;
    log::info!("{}", recorder_config);

    let recorder = Arc::new(FeedRecorder::new(recorder_config)?);
    recorder.set_error_callback(|e| log::warn!("Recorder reported: {}", e))?;
    recorder.start()?;

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
    let stop_producer = Arc::new(AtomicBool::new(false));

    let monitor_handle = tokio::spawn(monitor::run(
        Arc::clone(&recorder),
        config.stats_interval(),
        shutdown_tx.subscribe(),
    ));

    // Producer: a single blocking thread calling ingest.
    let mut producer_handle = match config.replay_path.clone() {
        Some(path) => {
            let recorder = Arc::clone(&recorder);
            let stop = Arc::clone(&stop_producer);
            let pace = config.replay_pace();
            Some(tokio::task::spawn_blocking(move || -> lib_recorder::Result<u64> {
                let mut source = JsonLinesReplay::open(&path)?.with_pace(pace);
                let count = pump(&mut source, &recorder, &stop)?;
                if source.skipped() > 0 {
                    log::warn!("Replay skipped {} undecodable lines", source.skipped());
                }
                Ok(count)
            }))
        }
        None => {
            log::info!("No replay path configured; waiting for shutdown signal.");
            None
        }
    };

    let mut producer_done = false;
    match producer_handle.as_mut() {
        Some(handle) => {
            tokio::select! {
                _ = wait_for_shutdown_signal() => {}
                result = handle => {
                    log_producer_result(result);
                    producer_done = true;
                }
            }
        }
        None => wait_for_shutdown_signal().await,
    }

    // Stop the producer before the terminal flush so no record races past it.
    stop_producer.store(true, Ordering::SeqCst);
    if let Some(handle) = producer_handle {
        if !producer_done {
            log_producer_result(handle.await);
        }
    }

    let _ = shutdown_tx.send(());
    let _ = monitor_handle.await;

    if let Some(path) = &config.snapshot_path {
        match recorder.save_snapshot_csv(path) {
            Ok(count) => log::info!("Snapshot of {} records written to {}", count, path.display()),
            Err(e) => log::error!("Snapshot to {} failed: {}", path.display(), e),
        }
    }

    let flushed = recorder.stop()?;
    let stats = recorder.stats();
    log::info!(
        "Shutdown complete. Terminal flush wrote {} records; {} records in {} flushes across {} segments.",
        flushed,
        stats.records_written,
        stats.flush_count,
        stats.segment_count
    );
    Ok(())
}
