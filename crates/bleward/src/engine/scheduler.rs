use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::Notify;
use tracing::error;
use tracing::info;

use super::monitor::CycleError;
use super::monitor::CycleReport;
use super::monitor::Monitor;
use crate::config::ScheduleConfig;
use crate::store::TIMESTAMP_FORMAT;

/// Delay before the next cycle given the outcome of the previous one.
pub fn next_delay(
    outcome: &Result<CycleReport, CycleError>,
    schedule: &ScheduleConfig,
) -> Duration {
    match outcome {
        Ok(_) => schedule.scan_interval(),
        Err(_) => schedule.recovery_delay(),
    }
}

/// Start waiting for `signal` right away and return a future that resolves once it fired.
///
/// The listener runs on its own task, so a signal raised while a cycle is in progress is held
/// until the scheduler next checks for shutdown. If listening fails the returned future never
/// resolves.
pub fn listen_for_shutdown<F>(signal: F) -> impl Future<Output = ()>
where
    F: Future<Output = std::io::Result<()>> + Send + 'static,
{
    let notify = Arc::new(Notify::new());
    let fired = notify.clone();
    tokio::spawn(async move {
        match signal.await {
            Ok(()) => fired.notify_one(),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    async move { notify.notified().await }
}

/// Run cycles until `shutdown` resolves.
///
/// Failed cycles are logged and retried after the recovery delay; they never end the loop.
/// Shutdown is only observed between cycles, so a running cycle always completes.
pub async fn run(
    monitor: &mut Monitor,
    schedule: &ScheduleConfig,
    shutdown: impl Future<Output = ()>,
) {
    tokio::pin!(shutdown);

    info!(
        "Scheduler started: scan every {}s, retry after {}s on failure",
        schedule.scan_interval_secs, schedule.recovery_delay_secs
    );

    loop {
        let outcome = monitor.run_cycle().await;
        if let Err(e) = &outcome {
            error!(
                "[{}] Cycle {} failed: {}",
                Local::now().format(TIMESTAMP_FORMAT),
                monitor.cycles(),
                e
            );
        }

        let delay = next_delay(&outcome, schedule);
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Received shutdown signal, stopping scheduler");
                break;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
