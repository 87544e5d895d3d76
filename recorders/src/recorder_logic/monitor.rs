use lib_recorder::FeedRecorder;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::interval;

/// Polling consumer: drains the pending queue on every tick and reports stats.
pub async fn run(recorder: Arc<FeedRecorder>, every: Duration, mut shutdown: broadcast::Receiver<()>) {
    let mut tick = interval(every);
    let mut drained_total: u64 = 0;

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                log::info!("Monitor received shutdown signal after draining {} records.", drained_total);
                break;
            }
            _ = tick.tick() => {
                // drain_pending can wait on a flush holding the data lock.
                let rec = Arc::clone(&recorder);
                let drained = match tokio::task::spawn_blocking(move || {
                    let batch = rec.drain_pending();
                    (batch.len(), rec.stats())
                })
                .await
                {
                    Ok(result) => result,
                    Err(e) => {
                        log::error!("Monitor drain task failed: {}", e);
                        continue;
                    }
                };

                let (count, stats) = drained;
                drained_total += count as u64;
                match serde_json::to_string(&stats) {
                    Ok(json) => log::info!("Drained {} records; stats {}", count, json),
                    Err(_) => log::info!("Drained {} records; {:?}", count, stats),
                }
            }
        }
    }
}
