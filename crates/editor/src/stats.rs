// Periodic metrics refresh for the stats panel.

use std::time::Duration;

use idox_common::metrics::{calculate_metrics, DocumentMetrics};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

/// Recompute metrics from the latest content every `interval` and publish
/// them. Returns the metrics receiver and a handle that stops the task.
pub fn spawn_stats_refresher(
    content: watch::Receiver<String>,
    interval: Duration,
) -> (watch::Receiver<DocumentMetrics>, StatsHandle) {
    let initial = calculate_metrics(&content.borrow());
    let (metrics_tx, metrics_rx) = watch::channel(initial);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(refresh_loop(content, metrics_tx, shutdown_rx, interval));
    (metrics_rx, StatsHandle { task, shutdown_tx })
}

pub struct StatsHandle {
    task: tokio::task::JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl StatsHandle {
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        let _ = (&mut self.task).await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for StatsHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn refresh_loop(
    content: watch::Receiver<String>,
    metrics_tx: watch::Sender<DocumentMetrics>,
    mut shutdown_rx: watch::Receiver<bool>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; initial metrics are already published.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let metrics = calculate_metrics(&content.borrow());
                let changed = metrics_tx.send_if_modified(|current| {
                    if *current == metrics {
                        false
                    } else {
                        *current = metrics;
                        true
                    }
                });
                if changed {
                    trace!(words = metrics.word_count, "stats refreshed");
                }
            }
            _ = shutdown_rx.changed() => {
                debug!("stats refresher stopped");
                break;
            }
        }
    }
}
