//! Timed refresh triggers: once shortly after startup, then on a fixed interval.

use std::time::Duration;

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

use crate::event_finder::{EventFinder, RefreshOutcome};

/// Register the startup and recurring refresh jobs and start the scheduler.
///
/// # Arguments
/// * `finder` - Pipeline to refresh; each job runs on its own clone
/// * `startup_delay` - Delay before the first refresh
/// * `interval` - Period of the recurring refresh, counted from scheduler start
///
/// # Returns
/// * `Result<JobScheduler>` - The running scheduler; keep it alive for the jobs to fire
pub async fn start(finder: EventFinder, startup_delay: Duration, interval: Duration) -> Result<JobScheduler> {
    let sched = JobScheduler::new().await?;

    let startup_finder = finder.clone();
    sched
        .add(Job::new_one_shot_async(startup_delay, move |_uuid, _l| {
            let finder = startup_finder.clone();
            Box::pin(async move {
                info!("Running startup refresh");
                log_outcome(finder.refresh_now().await);
            })
        })?)
        .await?;

    let interval_finder = finder;
    sched
        .add(Job::new_repeated_async(interval, move |_uuid, _l| {
            let finder = interval_finder.clone();
            Box::pin(async move {
                info!("Running scheduled refresh");
                log_outcome(finder.refresh_now().await);
            })
        })?)
        .await?;

    sched.start().await?;
    info!(
        "Scheduler started - first refresh in {:?}, then every {:?}",
        startup_delay, interval
    );

    Ok(sched)
}

fn log_outcome(outcome: RefreshOutcome) {
    match outcome {
        RefreshOutcome::Published(snapshot) => {
            info!("Refresh published {} events", snapshot.events.len());
        }
        // Already logged with its cause by the pipeline
        RefreshOutcome::Failed(_) => info!("Refresh failed; keeping previous events"),
    }
}
